//! Synchronous per-session core: bytes in, ordered [`StreamEvent`]s out.
//!
//! The async controller only moves chunks from the transport into this type and events
//! out of it. Everything that decides what a caller sees lives here.

use tracing::{debug, warn};

use crate::classify::{ClassifierConfig, EventClassifier};
use crate::correlate::SessionCorrelator;
use crate::errors::{TransportError, stream_failure_from_transport_error};
use crate::event::EventDecoder;
use crate::frame::FrameReconstructor;
use crate::message::DisplayMessage;
use crate::stats::{RunStats, StatsAggregator};
use crate::stream::StreamEvent;

/// Chunk-driven processing for one session.
///
/// Once a terminal event has been produced, or [`cancel`](Self::cancel) was called, every
/// method returns no events.
pub struct SessionPipeline {
    frames: FrameReconstructor,
    decoder: EventDecoder,
    classifier: EventClassifier,
    correlator: SessionCorrelator,
    stats: StatsAggregator,
    delivered_content: bool,
    finished: bool,
}

impl SessionPipeline {
    /// Creates a pipeline. `session_id` is used until the stream supplies its own.
    pub fn new(config: &ClassifierConfig, session_id: Option<String>) -> Self {
        Self {
            frames: FrameReconstructor::new(),
            decoder: EventDecoder::new(config.catalog.clone()),
            classifier: EventClassifier::new(config.format.clone(), config.result_preview_chars),
            correlator: SessionCorrelator::new(session_id),
            stats: StatsAggregator::new(),
            delivered_content: false,
            finished: false,
        }
    }

    /// Caps the bytes buffered for one unterminated event.
    pub fn with_max_partial_bytes(mut self, limit: usize) -> Self {
        self.frames = FrameReconstructor::new().with_max_partial_bytes(limit);
        self
    }

    /// Processes one transport chunk.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }

        for text in self.frames.feed(chunk) {
            let event = match self.decoder.decode(&text) {
                Ok(event) => event,
                Err(failure) => {
                    warn!(
                        reason = %failure.reason,
                        bytes = failure.raw.len(),
                        "dropping malformed event fragment"
                    );
                    continue;
                }
            };
            let session_id = self.correlator.correlate(&event);
            debug!(event = ?event.event, session_id = ?session_id, "decoded event");
            self.stats.update(&event);

            let Some(message) = self.classifier.classify(&event) else {
                continue;
            };
            let message = message.with_session_id(session_id);
            if message.done {
                self.complete_with(message, &mut out);
                break;
            }
            if !message.content.is_empty() {
                self.delivered_content = true;
            }
            out.push(StreamEvent::Message(message));
        }
        out
    }

    /// The transport ended cleanly. Synthesizes a terminal message if none was seen.
    pub fn end_of_stream(&mut self) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        if self.frames.has_partial() {
            warn!(bytes = self.frames.partial_len(), "discarding truncated event at end of stream");
        }
        let message = DisplayMessage::terminal()
            .with_metadata("synthetic", true)
            .with_session_id(self.correlator.current());
        self.complete_with(message, &mut out);
        out
    }

    /// The transport failed mid-session.
    ///
    /// Timeouts and aborts after some content was delivered close the session as
    /// completed with an advisory message. Everything else is a terminal failure.
    pub fn transport_failed(&mut self, err: &TransportError) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        if err.is_abort_or_timeout() && self.delivered_content {
            warn!(error = %err, "transport interrupted after partial output; completing session");
            let message = self
                .classifier
                .interrupted(err.message())
                .with_session_id(self.correlator.current());
            self.complete_with(message, &mut out);
            return out;
        }

        warn!(error = %err, "session failed");
        self.frames.reset();
        self.finished = true;
        out.push(StreamEvent::Failed {
            error: stream_failure_from_transport_error(err),
        });
        out
    }

    /// Stops the session silently. Buffered partial text is discarded.
    pub fn cancel(&mut self) {
        if !self.finished {
            debug!(bytes = self.frames.partial_len(), "session cancelled");
        }
        self.frames.reset();
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Id currently stamped on messages.
    pub fn session_id(&self) -> Option<String> {
        self.correlator.current()
    }

    /// Whether any non-empty, non-terminal message has been produced.
    pub fn delivered_content(&self) -> bool {
        self.delivered_content
    }

    pub fn stats(&self) -> &RunStats {
        self.stats.snapshot()
    }

    fn complete_with(&mut self, message: DisplayMessage, out: &mut Vec<StreamEvent>) {
        let stats = self.stats.finalize();
        self.frames.reset();
        self.finished = true;
        out.push(StreamEvent::Message(message));
        out.push(StreamEvent::Completed { stats });
    }
}
