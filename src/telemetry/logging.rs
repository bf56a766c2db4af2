//! Logging setup
//!
//! `RUST_LOG` wins when set. Otherwise the `[logging]` section of the probe
//! config picks the level and the output format (pretty, compact, json).

use serde::Deserialize;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// The `[logging]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// error, warn, info, debug or trace
    pub level: String,
    /// pretty, compact or json
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber; later calls are ignored
pub fn init_logging(config: Option<&LogConfig>) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::new(level_for(config).as_str()),
    };

    let _ = tracing_subscriber::registry()
        .with(output_layer(config))
        .with(filter)
        .try_init();
}

fn output_layer(config: Option<&LogConfig>) -> BoxedLayer {
    match config.map(|c| c.format.as_str()) {
        Some("json") => fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        Some("compact") => fmt::layer().compact().boxed(),
        _ => fmt::layer().boxed(),
    }
}

fn level_for(config: Option<&LogConfig>) -> Level {
    config.map_or(Level::INFO, |c| parse_level(&c.level))
}

/// Unknown names fall back to info
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("Debug"), Level::DEBUG);
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("loud"), Level::INFO);
    }

    #[test]
    fn test_level_without_config_is_info() {
        assert_eq!(level_for(None), Level::INFO);

        let config = LogConfig {
            level: "warn".into(),
            ..LogConfig::default()
        };
        assert_eq!(level_for(Some(&config)), Level::WARN);
    }

    #[test]
    fn test_log_config_partial_section() {
        let config: LogConfig = toml::from_str("level = \"debug\"").unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, "pretty");
    }
}
