use std::sync::Arc;

use crate::classify::ClassifierConfig;
use crate::config::ClientConfig;
use crate::controller::RunBuilder;
use crate::errors::ClientError;
use crate::source::{EventSource, RunTarget};
use crate::transport::HttpEventSource;

pub(crate) struct ClientInner {
    pub(crate) source: Arc<dyn EventSource>,
    pub(crate) classifier: ClassifierConfig,
}

/// Entry point for starting streamed runs.
///
/// Cheap to clone; clones share the event source (and its connection pool) but every run
/// gets its own parser state.
#[derive(Clone)]
pub struct AgentClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl AgentClient {
    /// Starts a builder for configuring the source and classifier tables.
    pub fn builder() -> AgentClientBuilder {
        AgentClientBuilder::default()
    }

    /// Creates a client backed by the HTTP source configured from the environment.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::builder().http(ClientConfig::from_env()?)?.build()
    }

    /// Starts building a run for `target`.
    pub fn run(&self, target: RunTarget) -> RunBuilder {
        RunBuilder::new(self.inner.clone(), target)
    }
}

/// Builder used to configure an [`AgentClient`].
#[derive(Default)]
pub struct AgentClientBuilder {
    source: Option<Arc<dyn EventSource>>,
    classifier: ClassifierConfig,
}

impl AgentClientBuilder {
    /// Uses a custom event source.
    pub fn source(mut self, source: Arc<dyn EventSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Uses the HTTP event source with `config`.
    pub fn http(self, config: ClientConfig) -> Result<Self, ClientError> {
        Ok(self.source(Arc::new(HttpEventSource::new(config)?)))
    }

    /// Replaces the discriminator catalog and banner strings.
    pub fn classifier_config(mut self, config: ClassifierConfig) -> Self {
        self.classifier = config;
        self
    }

    /// Builds the client. An event source is required.
    pub fn build(self) -> Result<AgentClient, ClientError> {
        let source = self
            .source
            .ok_or_else(|| ClientError::Config("an event source is required".into()))?;
        Ok(AgentClient {
            inner: Arc::new(ClientInner {
                source,
                classifier: self.classifier,
            }),
        })
    }
}
