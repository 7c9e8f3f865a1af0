use futures::StreamExt as _;
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::{ClientError, TransportError};
use crate::source::{AgentRequest, ByteStream, EventSource, RunTarget};

/// Streams runs from an agent backend over HTTP.
///
/// Each run is a multipart `POST` to `/agents/{id}/runs` or `/teams/{id}/runs` with
/// streaming enabled; the response body is handed back untouched.
pub struct HttpEventSource {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpEventSource {
    /// Creates a source from explicit configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.base_url.trim().is_empty() {
            return Err(ClientError::Config("base_url must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a source from `AGENT_STREAM_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl EventSource for HttpEventSource {
    async fn open(&self, request: &AgentRequest) -> Result<ByteStream, TransportError> {
        let url = run_url(&self.config.base_url, &request.target);
        debug!(run_id = %request.run_id, target = %request.target, %url, "opening run stream");

        let mut form = reqwest::multipart::Form::new();
        for (name, value) in form_fields(request) {
            form = form.text(name, value);
        }
        let mut http_req = self.client.post(&url).multipart(form);
        if let Some(api_key) = &self.config.api_key {
            http_req = http_req.bearer_auth(api_key);
        }

        let response = http_req.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::status(
                status.as_u16(),
                format!("run request to {url} failed with status {status}: {body}"),
            ));
        }

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(transport_error)),
        ))
    }
}

pub(crate) fn run_url(base_url: &str, target: &RunTarget) -> String {
    let base = base_url.trim_end_matches('/');
    match target {
        RunTarget::Agent(id) => format!("{base}/agents/{id}/runs"),
        RunTarget::Team(id) => format!("{base}/teams/{id}/runs"),
    }
}

pub(crate) fn form_fields(request: &AgentRequest) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("message", request.message.clone()),
        ("stream", "true".to_string()),
        ("monitor", request.monitor.to_string()),
    ];
    let optional = [
        ("session_id", &request.session_id),
        ("user_id", &request.user_id),
        ("user_name", &request.user_name),
        ("phone_number", &request.phone_number),
        ("cpf", &request.cpf),
    ];
    for (name, value) in optional {
        if let Some(value) = value.as_ref().filter(|v| !v.trim().is_empty()) {
            fields.push((name, value.clone()));
        }
    }
    fields
}

fn transport_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::timeout(err.to_string())
    } else if err.is_body() || err.is_decode() {
        TransportError::aborted(err.to_string())
    } else {
        TransportError::other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AgentRequest {
        AgentRequest {
            run_id: uuid::Uuid::new_v4(),
            target: RunTarget::agent("support"),
            message: "hello".into(),
            monitor: true,
            session_id: Some("s1".into()),
            user_id: None,
            user_name: Some("Ana".into()),
            phone_number: Some("  ".into()),
            cpf: None,
        }
    }

    #[test]
    fn run_url_targets_agents_and_teams() {
        assert_eq!(
            run_url("http://localhost:7777/", &RunTarget::agent("a1")),
            "http://localhost:7777/agents/a1/runs"
        );
        assert_eq!(
            run_url("https://x.example", &RunTarget::team("t1")),
            "https://x.example/teams/t1/runs"
        );
    }

    #[test]
    fn form_always_requests_streaming_and_skips_blank_optionals() {
        let fields = form_fields(&request());
        assert_eq!(
            fields,
            vec![
                ("message", "hello".to_string()),
                ("stream", "true".to_string()),
                ("monitor", "true".to_string()),
                ("session_id", "s1".to_string()),
                ("user_name", "Ana".to_string()),
            ]
        );
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let err = HttpEventSource::new(ClientConfig::new(" ")).err().expect("invalid");
        assert!(matches!(err, ClientError::Config(_)));
    }
}
