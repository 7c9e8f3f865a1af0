//! Typed view of the JSON events emitted by the agent backend.
//!
//! Payloads on the wire are loosely typed: the same value may appear under several alias
//! fields and any field may be missing or carry an unexpected JSON type. Decoding resolves
//! each alias chain once, here, so the classifier and the stats aggregator agree on what a
//! tool name or a tool result is.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Recognized event families. Agent and team variants of the same family share a kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Content,
    AgentRunStarted,
    TeamRunStarted,
    ToolCallStarted,
    ToolCallCompleted,
    MemoryUpdateStarted,
    MemoryUpdateCompleted,
    ReasoningStarted,
    ReasoningCompleted,
    KnowledgeQueryStarted,
    KnowledgeQueryCompleted,
    RunCompleted,
}

const DEFAULT_DISCRIMINATORS: &[(&str, EventKind)] = &[
    ("RunContent", EventKind::Content),
    ("RunResponseContent", EventKind::Content),
    ("TeamRunContent", EventKind::Content),
    ("TeamRunResponseContent", EventKind::Content),
    ("RunStarted", EventKind::AgentRunStarted),
    ("TeamRunStarted", EventKind::TeamRunStarted),
    ("ToolCallStarted", EventKind::ToolCallStarted),
    ("TeamToolCallStarted", EventKind::ToolCallStarted),
    ("ToolCallCompleted", EventKind::ToolCallCompleted),
    ("TeamToolCallCompleted", EventKind::ToolCallCompleted),
    ("MemoryUpdateStarted", EventKind::MemoryUpdateStarted),
    ("TeamMemoryUpdateStarted", EventKind::MemoryUpdateStarted),
    ("MemoryUpdateCompleted", EventKind::MemoryUpdateCompleted),
    ("TeamMemoryUpdateCompleted", EventKind::MemoryUpdateCompleted),
    ("ReasoningStarted", EventKind::ReasoningStarted),
    ("TeamReasoningStarted", EventKind::ReasoningStarted),
    ("ReasoningCompleted", EventKind::ReasoningCompleted),
    ("TeamReasoningCompleted", EventKind::ReasoningCompleted),
    ("KnowledgeQueryStarted", EventKind::KnowledgeQueryStarted),
    ("TeamKnowledgeQueryStarted", EventKind::KnowledgeQueryStarted),
    ("KnowledgeQueryCompleted", EventKind::KnowledgeQueryCompleted),
    ("TeamKnowledgeQueryCompleted", EventKind::KnowledgeQueryCompleted),
    ("RunCompleted", EventKind::RunCompleted),
    ("TeamRunCompleted", EventKind::RunCompleted),
];

/// Lookup table from `event` discriminator strings to [`EventKind`].
#[derive(Clone, Debug)]
pub struct EventCatalog {
    kinds: HashMap<String, EventKind>,
}

impl Default for EventCatalog {
    fn default() -> Self {
        Self {
            kinds: DEFAULT_DISCRIMINATORS
                .iter()
                .map(|(name, kind)| ((*name).to_string(), *kind))
                .collect(),
        }
    }
}

impl EventCatalog {
    /// Creates a catalog with no entries.
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Maps an additional discriminator (or remaps an existing one).
    pub fn with(mut self, discriminator: impl Into<String>, kind: EventKind) -> Self {
        self.kinds.insert(discriminator.into(), kind);
        self
    }

    /// Returns the kind registered for `discriminator`.
    pub fn kind_of(&self, discriminator: &str) -> Option<EventKind> {
        self.kinds.get(discriminator).copied()
    }
}

/// Start/complete marker for two-phase status events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Started,
    Completed,
}

/// Whether a run was started by a single agent or a team.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunScope {
    Agent,
    Team,
}

/// Incremental model output.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContentDelta {
    pub content: Option<String>,
    pub thinking: Option<String>,
    pub content_type: Option<String>,
}

/// Names and ids attached to a run-start event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunIdentity {
    pub agent_id: Option<String>,
    pub agent_name: Option<String>,
    pub team_id: Option<String>,
    pub team_name: Option<String>,
}

/// Tool invocation details with alias fields already resolved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolCall {
    pub name: Option<String>,
    pub args: Option<Value>,
    pub result: Option<String>,
    /// `tool.metrics.time`, in seconds.
    pub duration_secs: Option<f64>,
}

impl ToolCall {
    /// Tool name, or `"unknown"` when the event carried none.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unknown")
    }

    /// Duration in whole milliseconds, when the event reported one.
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_secs
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| (secs * 1000.0).round() as u64)
    }
}

/// Memory update details.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryPayload {
    pub memory_type: Option<String>,
    pub content: Option<String>,
}

/// Knowledge-base query details.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RagPayload {
    pub query: Option<String>,
    pub result_count: Option<usize>,
}

/// Closed set of payload shapes, plus a passthrough for everything else.
#[derive(Clone, Debug, PartialEq)]
pub enum EventPayload {
    Content(ContentDelta),
    RunStarted { scope: RunScope, run: RunIdentity },
    ToolCallStarted(ToolCall),
    ToolCallCompleted(ToolCall),
    MemoryUpdate { phase: Phase, memory: MemoryPayload },
    Reasoning { phase: Phase },
    KnowledgeQuery { phase: Phase, rag: RagPayload },
    RunCompleted,
    /// No discriminator, or one the catalog does not know. Carries the raw object.
    Unknown(Map<String, Value>),
}

/// One decoded event.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedEvent {
    /// Raw `event` discriminator, when present.
    pub event: Option<String>,
    /// Non-empty `session_id`, when present.
    pub session_id: Option<String>,
    pub payload: EventPayload,
}

impl ParsedEvent {
    /// Returns `true` for run-completion events.
    pub fn is_terminal(&self) -> bool {
        matches!(self.payload, EventPayload::RunCompleted)
    }
}

/// A reconstructed text that is not a JSON object.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("malformed event fragment: {reason}")]
pub struct DecodeFailure {
    pub raw: String,
    pub reason: String,
}

/// Parses complete JSON texts into [`ParsedEvent`]s.
#[derive(Clone, Debug, Default)]
pub struct EventDecoder {
    catalog: EventCatalog,
}

impl EventDecoder {
    /// Creates a decoder that resolves discriminators through `catalog`.
    pub fn new(catalog: EventCatalog) -> Self {
        Self { catalog }
    }

    /// Decodes one complete JSON text.
    pub fn decode(&self, text: &str) -> Result<ParsedEvent, DecodeFailure> {
        let value: Value = serde_json::from_str(text).map_err(|e| DecodeFailure {
            raw: text.to_string(),
            reason: e.to_string(),
        })?;
        let Value::Object(obj) = value else {
            return Err(DecodeFailure {
                raw: text.to_string(),
                reason: "top-level value is not an object".into(),
            });
        };

        let event = text_field(&obj, "event");
        let session_id = text_field(&obj, "session_id");
        let kind = event.as_deref().and_then(|name| self.catalog.kind_of(name));
        let payload = match kind {
            Some(kind) => payload_for(kind, &obj),
            None => EventPayload::Unknown(obj),
        };

        Ok(ParsedEvent {
            event,
            session_id,
            payload,
        })
    }
}

fn payload_for(kind: EventKind, obj: &Map<String, Value>) -> EventPayload {
    match kind {
        EventKind::Content => EventPayload::Content(ContentDelta {
            content: obj.get("content").and_then(render_value),
            thinking: text_field(obj, "thinking"),
            content_type: text_field(obj, "content_type"),
        }),
        EventKind::AgentRunStarted => EventPayload::RunStarted {
            scope: RunScope::Agent,
            run: run_identity(obj),
        },
        EventKind::TeamRunStarted => EventPayload::RunStarted {
            scope: RunScope::Team,
            run: run_identity(obj),
        },
        EventKind::ToolCallStarted => EventPayload::ToolCallStarted(tool_call(obj)),
        EventKind::ToolCallCompleted => EventPayload::ToolCallCompleted(tool_call(obj)),
        EventKind::MemoryUpdateStarted => EventPayload::MemoryUpdate {
            phase: Phase::Started,
            memory: memory_payload(obj),
        },
        EventKind::MemoryUpdateCompleted => EventPayload::MemoryUpdate {
            phase: Phase::Completed,
            memory: memory_payload(obj),
        },
        EventKind::ReasoningStarted => EventPayload::Reasoning {
            phase: Phase::Started,
        },
        EventKind::ReasoningCompleted => EventPayload::Reasoning {
            phase: Phase::Completed,
        },
        EventKind::KnowledgeQueryStarted => EventPayload::KnowledgeQuery {
            phase: Phase::Started,
            rag: rag_payload(obj),
        },
        EventKind::KnowledgeQueryCompleted => EventPayload::KnowledgeQuery {
            phase: Phase::Completed,
            rag: rag_payload(obj),
        },
        EventKind::RunCompleted => EventPayload::RunCompleted,
    }
}

fn run_identity(obj: &Map<String, Value>) -> RunIdentity {
    RunIdentity {
        agent_id: text_field(obj, "agent_id"),
        agent_name: text_field(obj, "agent_name"),
        team_id: text_field(obj, "team_id"),
        team_name: text_field(obj, "team_name"),
    }
}

// Alias chains:
//   name:   tool.tool_name -> tool.name -> tool_name
//   args:   tool.tool_args -> tool.args -> tool_args
//   result: tool.result -> tool_result -> result
fn tool_call(obj: &Map<String, Value>) -> ToolCall {
    let nested = obj.get("tool").and_then(Value::as_object);
    let from_nested = |key: &str| nested.and_then(|tool| text_field(tool, key));

    let name = from_nested("tool_name")
        .or_else(|| from_nested("name"))
        .or_else(|| text_field(obj, "tool_name"));
    let args = nested
        .and_then(|tool| present(tool, "tool_args").or_else(|| present(tool, "args")))
        .or_else(|| present(obj, "tool_args"))
        .cloned();
    let result = nested
        .and_then(|tool| tool.get("result"))
        .and_then(render_value)
        .or_else(|| obj.get("tool_result").and_then(render_value))
        .or_else(|| obj.get("result").and_then(render_value));
    let duration_secs = nested
        .and_then(|tool| tool.get("metrics"))
        .and_then(|metrics| metrics.get("time"))
        .and_then(Value::as_f64);

    ToolCall {
        name,
        args,
        result,
        duration_secs,
    }
}

fn present<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

fn memory_payload(obj: &Map<String, Value>) -> MemoryPayload {
    let nested = obj.get("memory").and_then(Value::as_object);
    MemoryPayload {
        memory_type: nested
            .and_then(|memory| text_field(memory, "type"))
            .or_else(|| text_field(obj, "memory_type")),
        content: nested
            .and_then(|memory| memory.get("content"))
            .and_then(render_value),
    }
}

fn rag_payload(obj: &Map<String, Value>) -> RagPayload {
    let nested = obj.get("rag").and_then(Value::as_object);
    RagPayload {
        query: nested
            .and_then(|rag| text_field(rag, "query"))
            .or_else(|| text_field(obj, "query")),
        result_count: nested
            .and_then(|rag| rag.get("results"))
            .and_then(Value::as_array)
            .map(Vec::len),
    }
}

/// Non-empty string field; other JSON types count as absent.
fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

/// Strings as-is, other non-null values as compact JSON. Empty results count as absent.
fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(text: &str) -> ParsedEvent {
        EventDecoder::default().decode(text).expect("decode")
    }

    #[test]
    fn decodes_content_with_session_id() {
        let event = decode(
            r#"{"event":"RunResponseContent","content":"Hello","content_type":"str","session_id":"s1"}"#,
        );
        assert_eq!(event.event.as_deref(), Some("RunResponseContent"));
        assert_eq!(event.session_id.as_deref(), Some("s1"));
        assert_eq!(
            event.payload,
            EventPayload::Content(ContentDelta {
                content: Some("Hello".into()),
                thinking: None,
                content_type: Some("str".into()),
            })
        );
    }

    #[test]
    fn invalid_json_is_a_decode_failure_with_raw_text() {
        let err = EventDecoder::default()
            .decode(r#"{"event":"RunContent","content":"#)
            .expect_err("truncated");
        assert_eq!(err.raw, r#"{"event":"RunContent","content":"#);
    }

    #[test]
    fn non_object_json_is_a_decode_failure() {
        assert!(EventDecoder::default().decode("[1,2]").is_err());
    }

    #[test]
    fn missing_discriminator_is_unknown_passthrough() {
        let event = decode(r#"{"content":"orphan","extra":1}"#);
        assert_eq!(event.event, None);
        match event.payload {
            EventPayload::Unknown(map) => assert_eq!(map.get("extra"), Some(&Value::from(1))),
            other => panic!("expected unknown, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_discriminator_is_unknown_but_keeps_name() {
        let event = decode(r#"{"event":"RunPaused","session_id":"s9"}"#);
        assert_eq!(event.event.as_deref(), Some("RunPaused"));
        assert_eq!(event.session_id.as_deref(), Some("s9"));
        assert!(matches!(event.payload, EventPayload::Unknown(_)));
    }

    #[test]
    fn catalog_extensions_are_honoured() {
        let decoder =
            EventDecoder::new(EventCatalog::default().with("RunPaused", EventKind::RunCompleted));
        let event = decoder.decode(r#"{"event":"RunPaused"}"#).expect("decode");
        assert!(event.is_terminal());
    }

    #[test]
    fn tool_fields_follow_nested_then_flat_precedence() {
        let event = decode(
            r#"{"event":"ToolCallCompleted","tool_name":"flat","tool_result":"flat-result","result":"generic",
                "tool":{"tool_name":"search","tool_args":{"q":"rust"},"result":"","metrics":{"time":0.25}}}"#,
        );
        let EventPayload::ToolCallCompleted(tool) = event.payload else {
            panic!("expected tool completion");
        };
        assert_eq!(tool.name.as_deref(), Some("search"));
        assert_eq!(tool.args, Some(serde_json::json!({"q":"rust"})));
        // Empty nested result falls through to the flat alias.
        assert_eq!(tool.result.as_deref(), Some("flat-result"));
        assert_eq!(tool.duration_ms(), Some(250));
    }

    #[test]
    fn null_args_fall_through_to_the_next_alias() {
        let event = decode(
            r#"{"event":"ToolCallStarted","tool":{"tool_name":"s","tool_args":null,"args":{"q":1}},"tool_args":{"flat":2}}"#,
        );
        let EventPayload::ToolCallStarted(tool) = event.payload else {
            panic!("expected tool start");
        };
        assert_eq!(tool.args, Some(serde_json::json!({"q":1})));

        let event = decode(
            r#"{"event":"ToolCallStarted","tool":{"tool_args":null,"args":null},"tool_args":{"flat":2}}"#,
        );
        let EventPayload::ToolCallStarted(tool) = event.payload else {
            panic!("expected tool start");
        };
        assert_eq!(tool.args, Some(serde_json::json!({"flat":2})));

        let event = decode(
            r#"{"event":"ToolCallCompleted","tool":{"result":null},"tool_result":"flat"}"#,
        );
        let EventPayload::ToolCallCompleted(tool) = event.payload else {
            panic!("expected tool completion");
        };
        assert_eq!(tool.result.as_deref(), Some("flat"));
    }

    #[test]
    fn generic_result_is_last_resort_and_may_be_structured() {
        let event = decode(r#"{"event":"ToolCallCompleted","tool_name":"calc","result":{"sum":3}}"#);
        let EventPayload::ToolCallCompleted(tool) = event.payload else {
            panic!("expected tool completion");
        };
        assert_eq!(tool.display_name(), "calc");
        assert_eq!(tool.result.as_deref(), Some(r#"{"sum":3}"#));
        assert_eq!(tool.duration_ms(), None);
    }

    #[test]
    fn mistyped_fields_are_treated_as_absent() {
        let event = decode(r#"{"event":"RunStarted","agent_name":42,"session_id":""}"#);
        assert_eq!(event.session_id, None);
        assert_eq!(
            event.payload,
            EventPayload::RunStarted {
                scope: RunScope::Agent,
                run: RunIdentity::default(),
            }
        );
    }

    #[test]
    fn memory_and_rag_payloads_are_extracted() {
        let memory = decode(
            r#"{"event":"TeamMemoryUpdateCompleted","memory":{"type":"user","content":"likes tea"}}"#,
        );
        assert_eq!(
            memory.payload,
            EventPayload::MemoryUpdate {
                phase: Phase::Completed,
                memory: MemoryPayload {
                    memory_type: Some("user".into()),
                    content: Some("likes tea".into()),
                },
            }
        );

        let rag = decode(r#"{"event":"KnowledgeQueryCompleted","rag":{"query":"fees","results":[{},{}]}}"#);
        assert_eq!(
            rag.payload,
            EventPayload::KnowledgeQuery {
                phase: Phase::Completed,
                rag: RagPayload {
                    query: Some("fees".into()),
                    result_count: Some(2),
                },
            }
        );
    }
}
