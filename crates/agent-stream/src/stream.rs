use crate::errors::StreamFailure;
use crate::message::DisplayMessage;
use crate::stats::RunStats;

/// Ordered events delivered for one session.
///
/// A session yields any number of `Message` events and then either a message with
/// `done = true` followed by `Completed`, or a single `Failed`. A cancelled session stops
/// without a terminal event.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// One display message, in reconstruction order.
    Message(DisplayMessage),
    /// Final statistics, sent right after the terminal message.
    Completed { stats: RunStats },
    /// Terminal failure. No terminal message is sent for this session.
    Failed { error: StreamFailure },
}

impl StreamEvent {
    /// Returns `true` for the event that closes a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}
