//! Logging setup.
//!
//! The engine only emits `tracing` events; installing a subscriber is up to
//! the host. With the `tracing-subscriber` feature enabled, [`init`] installs
//! one configured from the environment:
//!
//! - `TIDEMARK_DEBUG=true|1|yes` - enable debug logging
//! - `TIDEMARK_LOG_LEVEL=trace|debug|info|warn|error` - set the level
//! - `TIDEMARK_LOG_FORMAT=json|pretty|compact` - set the output format (default: json)
//!
//! ```rust,no_run
//! tidemark_migrate::logging::init();
//! ```

use std::env;
use std::fmt;
use std::sync::Once;

static INIT: Once = Once::new();

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::Json,
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        })
    }
}

fn parse_debug(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_level(value: Option<&str>, debug: bool) -> &'static str {
    match value.map(str::to_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") => "warn",
        Some("error") => "error",
        _ if debug => "debug",
        _ => "warn",
    }
}

/// Check if `TIDEMARK_DEBUG` is set.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("TIDEMARK_DEBUG")
        .map(|v| parse_debug(&v))
        .unwrap_or(false)
}

/// Level from `TIDEMARK_LOG_LEVEL`; `debug` under `TIDEMARK_DEBUG`, else `warn`.
pub fn log_level() -> &'static str {
    parse_level(
        env::var("TIDEMARK_LOG_LEVEL").ok().as_deref(),
        is_debug_enabled(),
    )
}

/// Format from `TIDEMARK_LOG_FORMAT`.
pub fn log_format() -> LogFormat {
    env::var("TIDEMARK_LOG_FORMAT")
        .map(|f| LogFormat::parse(&f))
        .unwrap_or(LogFormat::Json)
}

/// Install a subscriber configured from the environment.
///
/// Does nothing unless `TIDEMARK_DEBUG` or `TIDEMARK_LOG_LEVEL` is set.
/// Subsequent calls are no-ops.
pub fn init() {
    if !is_debug_enabled() && env::var("TIDEMARK_LOG_LEVEL").is_err() {
        return;
    }
    init_with(log_level(), log_format());
}

/// Install a subscriber with an explicit level and format.
///
/// Subsequent calls are no-ops.
pub fn init_with(level: &str, format: LogFormat) {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::try_new(format!("tidemark={level},tidemark_migrate={level}"))
                .unwrap_or_else(|_| EnvFilter::new("warn"));

            let installed = match format {
                LogFormat::Json => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json())
                    .try_init(),
                LogFormat::Compact => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().compact())
                    .try_init(),
                LogFormat::Pretty => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().pretty())
                    .try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level, format = %format, "Tidemark logging initialized");
            }
        }

        #[cfg(not(feature = "tracing-subscriber"))]
        {
            let _ = (level, format);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_flag_values() {
        assert!(parse_debug("true"));
        assert!(parse_debug("YES"));
        assert!(parse_debug("1"));
        assert!(!parse_debug("0"));
        assert!(!parse_debug(""));
    }

    #[test]
    fn test_level_fallbacks() {
        assert_eq!(parse_level(None, false), "warn");
        assert_eq!(parse_level(None, true), "debug");
        assert_eq!(parse_level(Some("INFO"), true), "info");
        assert_eq!(parse_level(Some("loud"), false), "warn");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("Compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("xml"), LogFormat::Json);
        assert_eq!(LogFormat::Json.to_string(), "json");
    }
}
