use std::collections::VecDeque;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tracing::field::{Field, Visit};
use tracing_appender::rolling;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const CONSOLE_CAPACITY: usize = 1000;
const LOG_FILE_PREFIX: &str = "gpudash.log";
const LOG_DIR_ENV: &str = "GPUDASH_LOG_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

/// One captured event as the console overlay shows it.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub target: String,
    pub message: String,
}

/// Events captured for the console, drained by the UI loop.
pub type LogBuffer = Arc<Mutex<VecDeque<LogEntry>>>;

pub fn new_log_buffer(capacity: usize) -> LogBuffer {
    Arc::new(Mutex::new(VecDeque::with_capacity(capacity)))
}

/// Logging settings taken from the dashboard config.
#[derive(Debug, Clone, Copy)]
pub struct LogOptions {
    /// Days a rotated log file is kept.
    pub retention_days: u64,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self { retention_days: 7 }
    }
}

/// Where rotated log files go: `GPUDASH_LOG_DIR` when set, otherwise
/// `~/Library/Logs/gpudash` on macOS and `<data dir>/gpudash/logs` elsewhere.
pub fn log_dir() -> PathBuf {
    resolve_log_dir(std::env::var_os(LOG_DIR_ENV))
}

fn resolve_log_dir(env_override: Option<OsString>) -> PathBuf {
    if let Some(dir) = env_override.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    let platform = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|home| home.join("Library").join("Logs").join("gpudash"))
    } else {
        dirs::data_dir().map(|data| data.join("gpudash").join("logs"))
    };
    platform.unwrap_or_else(|| PathBuf::from("logs"))
}

/// Delete rotated log files last modified more than `max_age_days` ago.
/// Files without the appender prefix are left alone. Returns how many were
/// removed.
///
/// `0` removes every rotated file, the current one included. An age past
/// the start of the clock removes nothing.
fn prune_logs(dir: &Path, max_age_days: u64) -> usize {
    let Some(cutoff) = max_age_days
        .checked_mul(86_400)
        .and_then(|secs| SystemTime::now().checked_sub(Duration::from_secs(secs)))
    else {
        return 0;
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX))
        .filter(|e| {
            e.metadata()
                .and_then(|m| m.modified())
                .is_ok_and(|modified| modified <= cutoff)
        })
        .filter(|e| std::fs::remove_file(e.path()).is_ok())
        .count()
}

/// Layer that copies every event into the console's bounded buffer.
struct RingLayer {
    buffer: LogBuffer,
    capacity: usize,
}

impl RingLayer {
    fn push(&self, entry: LogEntry) {
        let Ok(mut buf) = self.buffer.lock() else {
            return;
        };
        while buf.len() >= self.capacity {
            buf.pop_front();
        }
        buf.push_back(entry);
    }
}

impl<S: tracing::Subscriber> Layer<S> for RingLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let meta = event.metadata();
        let mut fields = FieldCollector::default();
        event.record(&mut fields);
        self.push(LogEntry {
            level: LogLevel::from(*meta.level()),
            target: meta.target().to_string(),
            message: fields.into_line(),
        });
    }
}

/// Flattens an event into `message key=value key=value`.
#[derive(Default)]
struct FieldCollector {
    message: String,
    pairs: Vec<String>,
}

impl FieldCollector {
    fn into_line(self) -> String {
        std::iter::once(self.message)
            .filter(|m| !m.is_empty())
            .chain(self.pairs)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            name => self.pairs.push(format!("{name}={value:?}")),
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            name => self.pairs.push(format!("{name}={value}")),
        }
    }
}

/// Install the global subscriber and return the console buffer.
///
/// `GPUDASH_LOG`, then `RUST_LOG`, picks the filter (default `info`).
/// Events go to a daily rotated file under [`log_dir`] and to the console
/// buffer, never to the terminal, which the TUI owns.
pub fn init(opts: LogOptions) -> LogBuffer {
    let buffer = new_log_buffer(CONSOLE_CAPACITY);

    let filter = EnvFilter::try_from_env("GPUDASH_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let dir = log_dir();
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("warning: cannot create log directory {}: {e}", dir.display());
    }
    let pruned = prune_logs(&dir, opts.retention_days);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(rolling::daily(&dir, LOG_FILE_PREFIX))
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(RingLayer {
            buffer: buffer.clone(),
            capacity: CONSOLE_CAPACITY,
        })
        .init();

    if pruned > 0 {
        tracing::debug!(pruned, dir = %dir.display(), "old log files removed");
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins_unless_empty() {
        assert_eq!(
            resolve_log_dir(Some("/tmp/gpudash-logs".into())),
            PathBuf::from("/tmp/gpudash-logs")
        );
        let fallback = resolve_log_dir(Some(OsString::new()));
        assert_eq!(fallback, resolve_log_dir(None));
    }

    #[test]
    fn levels_display_padded() {
        assert_eq!(LogLevel::from(tracing::Level::WARN), LogLevel::Warn);
        assert_eq!(format!("{:5}|", LogLevel::Info), "INFO |");
        assert_eq!(LogLevel::Error.to_string(), "ERROR");
    }

    #[test]
    fn fields_follow_the_message() {
        let c = FieldCollector {
            message: "poll tick skipped".into(),
            pairs: vec!["endpoint=gpu_usage".into(), "kind=status".into()],
        };
        assert_eq!(c.into_line(), "poll tick skipped endpoint=gpu_usage kind=status");

        let c = FieldCollector {
            message: String::new(),
            pairs: vec!["pending=3".into()],
        };
        assert_eq!(c.into_line(), "pending=3");
        assert_eq!(FieldCollector::default().into_line(), "");
    }

    #[test]
    fn ring_layer_keeps_newest_events() {
        let buffer = new_log_buffer(2);
        let subscriber = tracing_subscriber::registry().with(RingLayer {
            buffer: buffer.clone(),
            capacity: 2,
        });
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("one");
            tracing::warn!(chart = "machine", "two");
            tracing::error!("three");
        });

        let buf = buffer.lock().unwrap();
        assert_eq!(buf.len(), 2);
        assert_eq!(buf[0].level, LogLevel::Warn);
        assert_eq!(buf[0].message, "two chart=machine");
        assert_eq!(buf[1].message, "three");
    }

    #[test]
    fn prune_touches_only_rotated_logs() {
        let tmp = std::env::temp_dir().join(format!("gpudash-prune-{}", std::process::id()));
        std::fs::create_dir_all(&tmp).unwrap();
        let rotated = tmp.join("gpudash.log.2025-01-01");
        let other = tmp.join("notes.txt");
        std::fs::write(&rotated, "a").unwrap();
        std::fs::write(&other, "b").unwrap();

        assert_eq!(prune_logs(&tmp, 30), 0);
        assert_eq!(prune_logs(&tmp, 300_000_000_000_000), 0);
        assert_eq!(prune_logs(&tmp, u64::MAX), 0);
        assert!(rotated.exists());
        assert_eq!(prune_logs(&tmp, 0), 1);
        assert!(!rotated.exists());
        assert!(other.exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
