//! Stderr logging for the calibration tools.
//!
//! [`init_with_level`] installs a small `log` backend printing
//! `[elapsed LEVEL target] message`. The `CAMCAL_LOG` environment variable
//! (`error`, `warn`, `info`, `debug`, `trace`, `off`) overrides the level
//! chosen by the caller. With the `tracing` feature, [`init_tracing`] installs a
//! `tracing-subscriber` instead and forwards `log` records into it.

use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable overriding the log level.
pub const LOG_ENV: &str = "CAMCAL_LOG";

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

/// Last path segment of a module target: `camcal::extract` → `extract`.
fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:8.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            short_target(record.target()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

fn level_from_env(default: LevelFilter) -> LevelFilter {
    std::env::var(LOG_ENV)
        .ok()
        .and_then(|v| LevelFilter::from_str(v.trim()).ok())
        .unwrap_or(default)
}

/// Install the stderr logger at `level`, unless `CAMCAL_LOG` says otherwise.
///
/// Only the first call installs the logger; later calls return `Ok(())`.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let level = level_from_env(level);
    let logger = LOGGER.get_or_init(|| StderrLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install a `tracing` subscriber and route `log` records into it.
///
/// Filtering follows `RUST_LOG`, then `CAMCAL_LOG`, and falls back to
/// `default`. `json` switches to flattened JSON events.
#[cfg(feature = "tracing")]
pub fn init_tracing(default: LevelFilter, json: bool) {
    let _ = tracing_log::LogTracer::init();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level_from_env(default))));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    if json {
        let _ = builder.json().flatten_event(true).finish().try_init();
    } else {
        let _ = builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}

/// `EnvFilter` directive for a `log` level.
#[cfg(any(feature = "tracing", test))]
fn filter_directive(level: LevelFilter) -> String {
    level.as_str().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_is_shortened_to_last_segment() {
        assert_eq!(short_target("camcal::extract"), "extract");
        assert_eq!(short_target("camcal"), "camcal");
    }

    #[test]
    fn filter_directive_follows_level() {
        assert_eq!(filter_directive(LevelFilter::Warn), "warn");
        assert_eq!(filter_directive(LevelFilter::Trace), "trace");
        assert_eq!(filter_directive(LevelFilter::Off), "off");
    }

    #[test]
    fn repeated_init_is_ok() {
        assert!(init_with_level(LevelFilter::Warn).is_ok());
        assert!(init_with_level(LevelFilter::Debug).is_ok());
    }
}
