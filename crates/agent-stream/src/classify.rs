//! Turns decoded events into display messages.

use crate::event::{
    ContentDelta, EventCatalog, EventPayload, MemoryPayload, ParsedEvent, Phase, RagPayload,
    RunIdentity, RunScope, ToolCall,
};
use crate::message::DisplayMessage;

/// Banner prefixes and phrases used for status events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageFormat {
    pub agent_started: String,
    pub team_started: String,
    pub tool_started: String,
    pub tool_completed: String,
    pub memory: String,
    pub reasoning_started: String,
    pub reasoning_completed: String,
    pub knowledge_searching: String,
    pub knowledge_found: String,
    /// Shown when the transport drops after partial output.
    pub interrupted_notice: String,
    /// Used when a banner needs a name the event did not carry.
    pub unknown_name: String,
}

impl Default for MessageFormat {
    fn default() -> Self {
        Self {
            agent_started: "🤖 Agent".into(),
            team_started: "👥 Team".into(),
            tool_started: "🔧 Running tool:".into(),
            tool_completed: "✅ Tool".into(),
            memory: "🧠".into(),
            reasoning_started: "💭 Reasoning...".into(),
            reasoning_completed: "💭 Reasoning complete".into(),
            knowledge_searching: "🔎".into(),
            knowledge_found: "📚".into(),
            interrupted_notice: "⚠️ Response interrupted, output may be incomplete".into(),
            unknown_name: "unknown".into(),
        }
    }
}

/// Tables consumed by the decoder and the classifier.
#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    pub catalog: EventCatalog,
    pub format: MessageFormat,
    /// Maximum number of characters of a tool result shown in its banner.
    pub result_preview_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            catalog: EventCatalog::default(),
            format: MessageFormat::default(),
            result_preview_chars: 500,
        }
    }
}

/// Maps a [`ParsedEvent`] to at most one [`DisplayMessage`].
///
/// The returned message carries no session id; the caller stamps it.
#[derive(Clone, Debug)]
pub struct EventClassifier {
    format: MessageFormat,
    result_preview_chars: usize,
}

impl Default for EventClassifier {
    fn default() -> Self {
        Self::new(MessageFormat::default(), 500)
    }
}

impl EventClassifier {
    pub fn new(format: MessageFormat, result_preview_chars: usize) -> Self {
        Self {
            format,
            result_preview_chars,
        }
    }

    /// Returns the message for `event`, or `None` when the event is not displayed.
    pub fn classify(&self, event: &ParsedEvent) -> Option<DisplayMessage> {
        let message = match &event.payload {
            EventPayload::Content(delta) => self.content(delta)?,
            EventPayload::RunStarted { scope, run } => self.run_started(*scope, run),
            EventPayload::ToolCallStarted(tool) => self.tool_started(tool),
            EventPayload::ToolCallCompleted(tool) => self.tool_completed(tool),
            EventPayload::MemoryUpdate { phase, memory } => self.memory(*phase, memory),
            EventPayload::Reasoning { phase } => DisplayMessage::text(banner(match phase {
                Phase::Started => &self.format.reasoning_started,
                Phase::Completed => &self.format.reasoning_completed,
            })),
            EventPayload::KnowledgeQuery { phase, rag } => self.knowledge(*phase, rag),
            EventPayload::RunCompleted => DisplayMessage::terminal(),
            EventPayload::Unknown(_) => return None,
        };
        Some(match &event.event {
            Some(name) => message.with_metadata("event", name.as_str()),
            None => message,
        })
    }

    /// Terminal message closing a session whose transport failed after partial output.
    pub fn interrupted(&self, reason: &str) -> DisplayMessage {
        let mut message = DisplayMessage::terminal().with_metadata("interrupted", true);
        message.content = banner(&format!("{} ({reason})", self.format.interrupted_notice));
        message
    }

    fn content(&self, delta: &ContentDelta) -> Option<DisplayMessage> {
        if let Some(thinking) = &delta.thinking {
            return Some(DisplayMessage::text(thinking.as_str()).with_metadata("thinking", true));
        }
        let content = delta.content.as_deref()?;
        let message = DisplayMessage::text(content);
        Some(match &delta.content_type {
            Some(content_type) => message.with_metadata("content_type", content_type.as_str()),
            None => message,
        })
    }

    fn run_started(&self, scope: RunScope, run: &RunIdentity) -> DisplayMessage {
        let (prefix, name) = match scope {
            RunScope::Team => (&self.format.team_started, run.team_name.as_deref()),
            RunScope::Agent => (&self.format.agent_started, run.agent_name.as_deref()),
        };
        let name = name.unwrap_or(&self.format.unknown_name);
        DisplayMessage::text(banner(&format!("{prefix} {name} started")))
    }

    fn tool_started(&self, tool: &ToolCall) -> DisplayMessage {
        let mut text = format!("{} {}", self.format.tool_started, self.tool_name(tool));
        if let Some(args) = &tool.args {
            text.push_str(&format!("\n   args: {args}"));
        }
        DisplayMessage::text(banner(&text)).with_metadata("tool_name", self.tool_name(tool))
    }

    fn tool_completed(&self, tool: &ToolCall) -> DisplayMessage {
        let name = self.tool_name(tool);
        let mut text = format!("{} {name} completed", self.format.tool_completed);
        let duration_ms = tool.duration_ms();
        if let Some(ms) = duration_ms {
            text.push_str(&format!(" in {ms}ms"));
        }
        if let Some(result) = &tool.result {
            text.push_str("\n   result: ");
            text.push_str(&truncate_chars(result, self.result_preview_chars));
        }
        let message = DisplayMessage::text(banner(&text)).with_metadata("tool_name", name);
        match duration_ms {
            Some(ms) => message.with_metadata("duration_ms", ms),
            None => message,
        }
    }

    fn memory(&self, phase: Phase, memory: &MemoryPayload) -> DisplayMessage {
        let verb = match phase {
            Phase::Started => "Updating",
            Phase::Completed => "Updated",
        };
        let mut text = format!("{} {verb} memory", self.format.memory);
        if let Some(memory_type) = &memory.memory_type {
            text.push_str(&format!(" ({memory_type})"));
        }
        if let Some(content) = &memory.content {
            text.push_str(&format!(": {content}"));
        }
        DisplayMessage::text(banner(&text))
    }

    fn knowledge(&self, phase: Phase, rag: &RagPayload) -> DisplayMessage {
        let text = match phase {
            Phase::Started => {
                format!("{} Searching knowledge base", self.format.knowledge_searching)
            }
            Phase::Completed => match rag.result_count {
                Some(count) => format!("{} Found {count} results", self.format.knowledge_found),
                None => format!("{} Found results", self.format.knowledge_found),
            },
        };
        let text = match &rag.query {
            Some(query) => format!("{text} for: {query}"),
            None => text,
        };
        DisplayMessage::text(banner(&text))
    }

    fn tool_name<'a>(&'a self, tool: &'a ToolCall) -> &'a str {
        tool.name.as_deref().unwrap_or(&self.format.unknown_name)
    }
}

/// Status banners sit on their own line between streamed content.
fn banner(text: &str) -> String {
    format!("\n{text}\n")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
