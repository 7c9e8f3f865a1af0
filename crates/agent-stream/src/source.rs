use std::fmt;
use std::pin::Pin;

use crate::errors::TransportError;

/// Raw response body as a stream of byte chunks.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, TransportError>> + Send + 'static>>;

/// What a run is addressed to.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RunTarget {
    Agent(String),
    Team(String),
}

impl RunTarget {
    pub fn agent(id: impl Into<String>) -> Self {
        Self::Agent(id.into())
    }

    pub fn team(id: impl Into<String>) -> Self {
        Self::Team(id.into())
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Agent(id) | Self::Team(id) => id,
        }
    }
}

impl fmt::Display for RunTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent(id) => write!(f, "agent:{id}"),
            Self::Team(id) => write!(f, "team:{id}"),
        }
    }
}

/// Outbound request for one streamed run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentRequest {
    pub run_id: uuid::Uuid,
    pub target: RunTarget,
    pub message: String,
    /// Ask the backend to record the run in its monitoring store.
    pub monitor: bool,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub phone_number: Option<String>,
    pub cpf: Option<String>,
}

/// Opens the streaming response body for a request.
///
/// Implementations only move bytes; they never interpret them.
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    async fn open(&self, request: &AgentRequest) -> Result<ByteStream, TransportError>;
}
