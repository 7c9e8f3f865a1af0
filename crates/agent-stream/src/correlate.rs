use crate::event::ParsedEvent;

/// Tracks the session id every message of a run is stamped with.
///
/// The first event that carries a non-empty `session_id` wins; later ids are ignored.
#[derive(Clone, Debug, Default)]
pub struct SessionCorrelator {
    fallback: Option<String>,
    latched: Option<String>,
}

impl SessionCorrelator {
    /// Creates a correlator that reports `fallback` until an event supplies an id.
    pub fn new(fallback: Option<String>) -> Self {
        Self {
            fallback: fallback.filter(|id| !id.is_empty()),
            latched: None,
        }
    }

    /// Observes `event` and returns the id to stamp on its message.
    pub fn correlate(&mut self, event: &ParsedEvent) -> Option<String> {
        if self.latched.is_none()
            && let Some(id) = event.session_id.as_ref().filter(|id| !id.is_empty())
        {
            self.latched = Some(id.clone());
        }
        self.current()
    }

    /// Latched id, else the caller-supplied one.
    pub fn current(&self) -> Option<String> {
        self.latched.clone().or_else(|| self.fallback.clone())
    }

    pub fn is_latched(&self) -> bool {
        self.latched.is_some()
    }
}
