//! Common imports for typical client usage.
pub use crate::{
    AgentClient, CancelHandle, ClientConfig, ClientError, DisplayMessage, RunBuilder, RunStats,
    RunTarget, SessionObserver, SessionState, SessionStream, StreamEvent, StreamFailure,
};
