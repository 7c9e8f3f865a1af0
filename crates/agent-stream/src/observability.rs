use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_FILE: &str = "agent-stream.logs.jsonl";

/// Logging settings resolved from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
struct LogSettings {
    enabled: bool,
    filter: Option<String>,
    json_path: Option<PathBuf>,
}

impl LogSettings {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("AGENT_STREAM_OBSERVABILITY_ENABLED")
            .map(|value| parse_bool_env(&value).unwrap_or(true))
            .unwrap_or(true);
        let filter = lookup("AGENT_STREAM_LOG_LEVEL").filter(|v| !v.trim().is_empty());
        let json_path = lookup("AGENT_STREAM_JSON_LOG_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        Self {
            enabled,
            filter,
            json_path,
        }
    }
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn resolve_env_filter(level: Option<&str>) -> tracing_subscriber::EnvFilter {
    if let Some(level) = level
        && let Ok(filter) = tracing_subscriber::EnvFilter::try_new(level)
    {
        return filter;
    }
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

fn split_log_path(path: &Path) -> (&Path, &str) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE);
    (dir, file_name)
}

/// Initialize session logging once per process.
///
/// Environment variables:
/// - `AGENT_STREAM_OBSERVABILITY_ENABLED`: optional enable/disable flag (default enabled).
/// - `AGENT_STREAM_LOG_LEVEL`: optional level/filter override (`info`, `debug`, etc.).
/// - `AGENT_STREAM_JSON_LOG_PATH`: optional log file path. If set, logs are JSONL in that file,
///   otherwise they go to stdout in a compact console format.
/// - `RUST_LOG`: fallback filter.
pub fn init_observability() {
    INIT.get_or_init(|| {
        let settings = LogSettings::from_lookup(|key| std::env::var(key).ok());
        if !settings.enabled {
            return;
        }

        let env_filter = resolve_env_filter(settings.filter.as_deref());
        if let Some(path) = settings.json_path {
            let (dir, file_name) = split_log_path(&path);
            let _ = std::fs::create_dir_all(dir);
            let writer = tracing_appender::rolling::never(dir, file_name);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(false)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init();
        } else {
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stdout);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
        }
    });
}
