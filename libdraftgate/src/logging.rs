//! Logging setup shared by the Draftgate binaries
//!
//! Each binary calls [`init`] once at startup. The output format comes
//! from `DRAFTGATE_LOG_FORMAT` (text, json, pretty); the filter comes
//! from `RUST_LOG`, then `DRAFTGATE_LOG_LEVEL`, then the binary's
//! default. `--verbose` overrides the filter with `debug`.

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Plain text, no colors, suitable for piping.
    Text,
    /// One JSON object per line.
    Json,
    /// Colored multi-line output for development.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// Install the global subscriber for a binary, writing to stderr.
/// `default_level` applies when neither `RUST_LOG` nor
/// `DRAFTGATE_LOG_LEVEL` is set; an unparseable `DRAFTGATE_LOG_FORMAT`
/// falls back to text.
pub fn init(default_level: &str, verbose: bool) {
    let format = pick_format(std::env::var("DRAFTGATE_LOG_FORMAT").ok().as_deref());
    let level = pick_level(
        std::env::var("DRAFTGATE_LOG_LEVEL").ok(),
        default_level,
        verbose,
    );
    init_with(format, &level);
}

/// Install the global subscriber with explicit settings.
///
/// # Panics
///
/// Panics if a subscriber is already installed.
pub fn init_with(format: LogFormat, level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .flatten_event(true)
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
    }
}

fn pick_format(raw: Option<&str>) -> LogFormat {
    raw.and_then(|s| s.parse().ok()).unwrap_or(LogFormat::Text)
}

fn pick_level(env_level: Option<String>, default_level: &str, verbose: bool) -> String {
    if verbose {
        return "debug".to_string();
    }
    env_level.unwrap_or_else(|| default_level.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);

        // Case insensitive
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("Json".parse::<LogFormat>().unwrap(), LogFormat::Json);
    }

    #[test]
    fn test_log_format_from_str_invalid() {
        let result = "invalid".parse::<LogFormat>();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Invalid log format: 'invalid'"));
    }

    #[test]
    fn test_log_format_display() {
        assert_eq!(LogFormat::Text.to_string(), "text");
        assert_eq!(LogFormat::Json.to_string(), "json");
        assert_eq!(LogFormat::Pretty.to_string(), "pretty");
    }

    #[test]
    fn test_pick_format_env_wins_over_default() {
        assert_eq!(pick_format(Some("json")), LogFormat::Json);
        assert_eq!(pick_format(Some("garbage")), LogFormat::Text);
        assert_eq!(pick_format(None), LogFormat::Text);
    }

    #[test]
    fn test_pick_level_precedence() {
        // verbose beats everything
        assert_eq!(pick_level(Some("warn".to_string()), "error", true), "debug");
        // env beats the binary default
        assert_eq!(pick_level(Some("warn".to_string()), "error", false), "warn");
        // binary default as last resort
        assert_eq!(pick_level(None, "error", false), "error");
    }
}
