//! Incremental parser and session driver for concatenated-JSON agent event streams.
//!
//! A backend streams run events as JSON objects written back-to-back with no separators,
//! split at arbitrary byte boundaries. This crate reassembles the objects, decodes and
//! classifies them into display messages, correlates them with the backend session id
//! and aggregates run statistics.
//!
//! ```no_run
//! use agent_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = AgentClient::from_env()?;
//!
//! let mut stream = client
//!     .run(RunTarget::agent("support"))
//!     .message("Where is my order?")
//!     .user_id("user-42")
//!     .start_stream()
//!     .await?;
//!
//! while let Some(event) = stream.next_event().await {
//!     if let StreamEvent::Message(message) = event {
//!         print!("{}", message.content);
//!     }
//! }
//!
//! let stats = stream.finish().await?;
//! println!("\n{} tool calls", stats.tool_calls);
//! # Ok(())
//! # }
//! ```

/// Event classification into display messages.
pub mod classify;
/// Client entry point and builder.
pub mod client;
/// Client and per-run configuration.
pub mod config;
/// Run builder, session stream, cancellation and observer hooks.
pub mod controller;
/// Session id latching.
pub mod correlate;
/// Public error types.
pub mod errors;
/// Event decoding and the discriminator catalog.
pub mod event;
/// Frame reconstruction from raw byte chunks.
pub mod frame;
/// Display message type.
pub mod message;
/// Logging setup.
pub mod observability;
/// Synchronous per-session processing pipeline.
pub mod pipeline;
/// Common imports for typical usage.
pub mod prelude;
/// Event source contract and request types.
pub mod source;
/// Run statistics.
pub mod stats;
/// Session stream events.
pub mod stream;
/// Byte sources backed by real transports.
pub mod transport;

pub use classify::{ClassifierConfig, EventClassifier, MessageFormat};
pub use client::{AgentClient, AgentClientBuilder};
pub use config::{ClientConfig, RunOptions};
pub use controller::{CancelHandle, RunBuilder, SessionObserver, SessionState, SessionStream};
pub use correlate::SessionCorrelator;
pub use errors::{ClientError, StreamFailure, TransportError};
pub use event::{EventCatalog, EventDecoder, EventKind, EventPayload, ParsedEvent};
pub use frame::FrameReconstructor;
pub use message::DisplayMessage;
pub use observability::init_observability;
pub use pipeline::SessionPipeline;
pub use source::{AgentRequest, ByteStream, EventSource, RunTarget};
pub use stats::{RunStats, StatsAggregator, ToolMetric};
pub use stream::StreamEvent;
pub use transport::HttpEventSource;
