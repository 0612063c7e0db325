//! Tracing setup shared by the server and bridge binaries.
//!
//! Console output always goes to stderr. When a log directory is given, a
//! second layer writes the same events to a daily-rotated file through a
//! non-blocking writer; the returned [`LogGuard`] must be kept alive until
//! the process exits or buffered lines are lost.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Keeps the file writer flushing. Drop it last.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// `RUST_LOG` if set and valid, else `default_directives`.
pub fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Install the global subscriber.
///
/// `file_prefix` names the rotated files (`<prefix>.YYYY-MM-DD`).
pub fn init_tracing(
    default_directives: &str,
    log_dir: Option<&Path>,
    file_prefix: &str,
) -> anyhow::Result<LogGuard> {
    let console = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(default_directives))
        .with(console)
        .with(file_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(LogGuard { _file: guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_accepts_default_directives() {
        let filter = env_filter("warn,porchlight_server=info");
        let rendered = filter.to_string();
        assert!(rendered.contains("porchlight_server=info") || std::env::var("RUST_LOG").is_ok());
    }

    #[test]
    fn test_init_creates_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        // A second init in the same test binary fails; only the directory matters here.
        let _ = init_tracing("info", Some(&logs), "porchlight-test");
        assert!(logs.is_dir());
    }
}
