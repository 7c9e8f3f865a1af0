use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::event::{EventPayload, ParsedEvent, Phase};

/// Duration of one completed tool call.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolMetric {
    pub name: String,
    pub duration_ms: u64,
}

/// Aggregate counters for one session.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_duration_ms: Option<u64>,
    pub agent_calls: u64,
    pub tool_calls: u64,
    pub memory_updates: u64,
    pub rag_queries: u64,
    pub tool_metrics: Vec<ToolMetric>,
    /// Number of decoded events per discriminator, including unrecognized ones.
    pub event_counts: BTreeMap<String, u64>,
}

impl RunStats {
    fn started_at(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time: None,
            total_duration_ms: None,
            agent_calls: 0,
            tool_calls: 0,
            memory_updates: 0,
            rag_queries: 0,
            tool_metrics: Vec::new(),
            event_counts: BTreeMap::new(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.end_time.is_some()
    }
}

/// Owns the [`RunStats`] of one session. Frozen after [`finalize`](Self::finalize).
#[derive(Clone, Debug)]
pub struct StatsAggregator {
    stats: RunStats,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    /// Starts a session clock now.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(start_time: DateTime<Utc>) -> Self {
        Self {
            stats: RunStats::started_at(start_time),
        }
    }

    /// Folds one decoded event into the counters.
    pub fn update(&mut self, event: &ParsedEvent) {
        if self.stats.is_finalized() {
            debug!(event = ?event.event, "ignoring event after stats were finalized");
            return;
        }
        let stats = &mut self.stats;
        if let Some(name) = &event.event {
            *stats.event_counts.entry(name.clone()).or_default() += 1;
        }
        match &event.payload {
            EventPayload::RunStarted { .. } => stats.agent_calls += 1,
            EventPayload::ToolCallCompleted(tool) => {
                stats.tool_calls += 1;
                if let Some(duration_ms) = tool.duration_ms() {
                    stats.tool_metrics.push(ToolMetric {
                        name: tool.display_name().to_string(),
                        duration_ms,
                    });
                }
            }
            EventPayload::MemoryUpdate {
                phase: Phase::Completed,
                ..
            } => stats.memory_updates += 1,
            EventPayload::KnowledgeQuery {
                phase: Phase::Completed,
                ..
            } => stats.rag_queries += 1,
            _ => {}
        }
    }

    /// Stamps the end time on first call; later calls return the same snapshot.
    pub fn finalize(&mut self) -> RunStats {
        self.finalize_at(Utc::now())
    }

    pub fn finalize_at(&mut self, end_time: DateTime<Utc>) -> RunStats {
        if !self.stats.is_finalized() {
            let elapsed = (end_time - self.stats.start_time).num_milliseconds().max(0);
            self.stats.end_time = Some(end_time);
            self.stats.total_duration_ms = Some(elapsed as u64);
        }
        self.stats.clone()
    }

    /// Current counters, finalized or not.
    pub fn snapshot(&self) -> &RunStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventDecoder;
    use chrono::TimeDelta;

    fn feed(aggregator: &mut StatsAggregator, texts: &[&str]) {
        let decoder = EventDecoder::default();
        for text in texts {
            aggregator.update(&decoder.decode(text).expect("decode"));
        }
    }

    #[test]
    fn counts_each_category() {
        let mut aggregator = StatsAggregator::new();
        feed(
            &mut aggregator,
            &[
                r#"{"event":"TeamRunStarted","team_name":"ops"}"#,
                r#"{"event":"RunStarted","agent_name":"Ana"}"#,
                r#"{"event":"ToolCallStarted","tool":{"tool_name":"search"}}"#,
                r#"{"event":"ToolCallCompleted","tool":{"tool_name":"search","metrics":{"time":0.25}}}"#,
                r#"{"event":"ToolCallCompleted","tool_name":"noop"}"#,
                r#"{"event":"MemoryUpdateStarted"}"#,
                r#"{"event":"MemoryUpdateCompleted"}"#,
                r#"{"event":"KnowledgeQueryCompleted","rag":{"query":"q"}}"#,
                r#"{"event":"RunContent","content":"a"}"#,
                r#"{"event":"RunContent","content":"b"}"#,
                r#"{"event":"SomethingNew"}"#,
                r#"{"no_event":1}"#,
            ],
        );
        let stats = aggregator.snapshot();
        assert_eq!(stats.agent_calls, 2);
        assert_eq!(stats.tool_calls, 2);
        assert_eq!(stats.memory_updates, 1);
        assert_eq!(stats.rag_queries, 1);
        assert_eq!(
            stats.tool_metrics,
            vec![ToolMetric {
                name: "search".into(),
                duration_ms: 250,
            }]
        );
        assert_eq!(stats.event_counts.get("RunContent"), Some(&2));
        assert_eq!(stats.event_counts.get("SomethingNew"), Some(&1));
        assert_eq!(stats.event_counts.values().sum::<u64>(), 11);
    }

    #[test]
    fn finalize_is_idempotent() {
        let start = Utc::now();
        let mut aggregator = StatsAggregator::starting_at(start);
        let first = aggregator.finalize_at(start + TimeDelta::milliseconds(1500));
        let second = aggregator.finalize_at(start + TimeDelta::milliseconds(9000));
        assert_eq!(first.total_duration_ms, Some(1500));
        assert_eq!(first, second);
        assert_eq!(aggregator.finalize(), first);
    }

    #[test]
    fn updates_after_finalize_are_ignored() {
        let mut aggregator = StatsAggregator::new();
        let finalized = aggregator.finalize();
        feed(&mut aggregator, &[r#"{"event":"RunStarted"}"#]);
        assert_eq!(aggregator.snapshot(), &finalized);
        assert_eq!(aggregator.snapshot().agent_calls, 0);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let mut aggregator = StatsAggregator::new();
        let value = serde_json::to_value(aggregator.finalize()).expect("serialize");
        assert!(value.get("totalDurationMs").is_some());
        assert!(value.get("eventCounts").is_some());
        assert!(value.get("toolMetrics").is_some());
    }
}
