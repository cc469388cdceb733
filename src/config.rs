//! Application configuration
//!
//! Loaded once at startup from a TOML file. The stream and timing groups are
//! required; runtime, enrichment and notification groups fall back to
//! defaults.
//!
//! ```toml
//! [control_consumer]
//! stream = "nba-control"
//! region = "us-east-1"
//!
//! [mention_consumer]
//! streams = ["nba-mentions"]
//! region = "us-east-1"
//!
//! [producer]
//! stream = "nba-tampering"
//! late_stream = "nba-tampering-late"
//! audit_stream = "nba-tampering-audit"
//! region = "us-east-1"
//!
//! [application]
//! window.seconds = 60
//! watermark.seconds = 5
//! idle.seconds = 60
//! lateness.seconds = 30
//! ```

use crate::stream::pipeline::EngineSettings;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV_VAR: &str = "TAMPERING_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "tampering.toml";

/// Upper bound for any duration setting.
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub control_consumer: ControlConsumerConfig,
    pub mention_consumer: MentionConsumerConfig,
    pub producer: ProducerConfig,
    pub application: ApplicationConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConsumerConfig {
    pub stream: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentionConsumerConfig {
    /// Each stream is one watermark source
    pub streams: Vec<String>,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Primary results
    pub stream: String,
    pub late_stream: String,
    pub audit_stream: String,
    pub region: String,
}

/// `<name>.seconds = N`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondsSetting {
    pub seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub window: SecondsSetting,
    pub watermark: SecondsSetting,
    pub idle: SecondsSetting,
    pub lateness: SecondsSetting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Gate and window lanes (team-hash partitions)
    #[serde(default = "default_lanes")]
    pub lanes: usize,

    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_lanes() -> usize {
    4
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            lanes: default_lanes(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// JSON roster `[{account, name, team}]`
    #[serde(default)]
    pub roster_path: Option<PathBuf>,

    /// SQLite player directory; takes precedence over the roster
    #[serde(default)]
    pub directory_db: Option<String>,

    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,

    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
}

fn default_lookup_timeout_ms() -> u64 {
    2000
}

fn default_max_in_flight() -> usize {
    32
}

fn default_dedup_capacity() -> usize {
    100_000
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            roster_path: None,
            directory_db: None,
            lookup_timeout_ms: default_lookup_timeout_ms(),
            max_in_flight: default_max_in_flight(),
            dedup_capacity: default_dedup_capacity(),
        }
    }
}

impl EnrichmentConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_subject")]
    pub subject: String,
}

fn default_subject() -> String {
    crate::sinks::notifier::DEFAULT_SUBJECT.to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            subject: default_subject(),
        }
    }
}

fn require_name(group: &str, key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("[{}] {} must not be empty", group, key);
    }
    Ok(())
}

fn require_duration(key: &str, setting: SecondsSetting, allow_zero: bool) -> Result<()> {
    if !allow_zero && setting.seconds == 0 {
        bail!("[application] {}.seconds must be greater than zero", key);
    }
    if setting.seconds > MAX_DURATION_SECS {
        bail!(
            "[application] {}.seconds = {} exceeds the {}s limit",
            key,
            setting.seconds,
            MAX_DURATION_SECS
        );
    }
    Ok(())
}

impl AppConfig {
    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Path from `TAMPERING_CONFIG`, else `tampering.toml` in the working dir.
    pub fn from_env() -> Result<Self> {
        let path =
            std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(&path)
    }

    pub fn validate(&self) -> Result<()> {
        require_name("control_consumer", "stream", &self.control_consumer.stream)?;
        require_name("control_consumer", "region", &self.control_consumer.region)?;

        if self.mention_consumer.streams.is_empty() {
            bail!("[mention_consumer] streams must list at least one stream");
        }
        for stream in &self.mention_consumer.streams {
            require_name("mention_consumer", "streams", stream)?;
        }
        require_name("mention_consumer", "region", &self.mention_consumer.region)?;

        require_name("producer", "stream", &self.producer.stream)?;
        require_name("producer", "late_stream", &self.producer.late_stream)?;
        require_name("producer", "audit_stream", &self.producer.audit_stream)?;
        require_name("producer", "region", &self.producer.region)?;

        let app = &self.application;
        require_duration("window", app.window, false)?;
        require_duration("watermark", app.watermark, true)?;
        require_duration("idle", app.idle, false)?;
        require_duration("lateness", app.lateness, true)?;

        if self.runtime.lanes == 0 {
            bail!("[runtime] lanes must be greater than zero");
        }
        if self.runtime.channel_capacity == 0 {
            bail!("[runtime] channel_capacity must be greater than zero");
        }
        if self.enrichment.max_in_flight == 0 {
            bail!("[enrichment] max_in_flight must be greater than zero");
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let app = &self.application;
        EngineSettings::from_secs(
            app.window.seconds,
            app.watermark.seconds,
            app.idle.seconds,
            app.lateness.seconds,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
[control_consumer]
stream = "nba-control"
region = "us-east-1"

[mention_consumer]
streams = ["nba-mentions-a", "nba-mentions-b"]
region = "us-east-1"

[producer]
stream = "nba-tampering"
late_stream = "nba-tampering-late"
audit_stream = "nba-tampering-audit"
region = "us-east-1"

[application]
window.seconds = 60
watermark.seconds = 5
idle.seconds = 60
lateness.seconds = 30
"#;

    #[test]
    fn test_parse_valid_config_with_defaults() {
        let config = AppConfig::parse(VALID).unwrap();
        assert_eq!(config.mention_consumer.streams.len(), 2);
        assert_eq!(config.application.window.seconds, 60);
        assert_eq!(config.runtime.lanes, 4);
        assert_eq!(config.enrichment.dedup_capacity, 100_000);
        assert_eq!(config.notify.subject, "NBA Tampering Detect");

        let settings = config.engine_settings();
        assert_eq!(settings.window_size, 60_000);
        assert_eq!(settings.bounded_delay, 5_000);
        assert_eq!(settings.allowed_lateness, 30_000);
    }

    #[test]
    fn test_missing_required_key_is_fatal() {
        let without_idle = VALID.replace("idle.seconds = 60\n", "");
        assert!(AppConfig::parse(&without_idle).is_err());

        let without_producer = VALID.replace("late_stream = \"nba-tampering-late\"\n", "");
        assert!(AppConfig::parse(&without_producer).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero_window = VALID.replace("window.seconds = 60", "window.seconds = 0");
        let err = AppConfig::parse(&zero_window).unwrap_err();
        assert!(err.to_string().contains("window.seconds"));

        let zero_idle = VALID.replace("idle.seconds = 60", "idle.seconds = 0");
        assert!(AppConfig::parse(&zero_idle).is_err());

        let non_numeric = VALID.replace("lateness.seconds = 30", "lateness.seconds = \"soon\"");
        assert!(AppConfig::parse(&non_numeric).is_err());

        let negative = VALID.replace("watermark.seconds = 5", "watermark.seconds = -5");
        assert!(AppConfig::parse(&negative).is_err());

        let huge = VALID.replace("window.seconds = 60", "window.seconds = 604801");
        assert!(AppConfig::parse(&huge).is_err());

        let no_streams = VALID.replace(
            "streams = [\"nba-mentions-a\", \"nba-mentions-b\"]",
            "streams = []",
        );
        assert!(AppConfig::parse(&no_streams).is_err());
    }

    #[test]
    fn test_zero_lateness_and_delay_allowed() {
        let config = AppConfig::parse(
            &VALID
                .replace("lateness.seconds = 30", "lateness.seconds = 0")
                .replace("watermark.seconds = 5", "watermark.seconds = 0"),
        )
        .unwrap();
        assert_eq!(config.engine_settings().allowed_lateness, 0);
    }

    #[test]
    fn test_load_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), VALID).unwrap();
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.producer.stream, "nba-tampering");

        assert!(AppConfig::load(file.path().with_extension("missing")).is_err());
    }
}
