//! Client configuration, loaded from TOML.
//!
//! ```toml
//! [handshake]
//! expected_origins = ["https://host.example.com"]
//! fallback_delay_ms = 2000
//! reply_timeout_ms = 10000
//!
//! [feedback]
//! endpoint = "https://api.example.com/feedback"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokenbridge_core::{DEV_PLACEHOLDER, Origin, OriginPolicy};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub handshake: HandshakeConfig,
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandshakeConfig {
    /// Hosts allowed to deliver credentials. Empty accepts any sender.
    pub expected_origins: Vec<Origin>,
    /// How long standalone mode waits before installing the placeholder.
    pub fallback_delay_ms: u64,
    /// Placeholder credential for standalone mode.
    pub placeholder: String,
    /// Give up on the host after this long. Absent waits forever.
    pub reply_timeout_ms: Option<u64>,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            expected_origins: Vec::new(),
            fallback_delay_ms: 2000,
            placeholder: DEV_PLACEHOLDER.to_string(),
            reply_timeout_ms: None,
        }
    }
}

impl HandshakeConfig {
    pub fn origin_policy(&self) -> OriginPolicy {
        OriginPolicy::from_expected(self.expected_origins.clone())
    }

    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_ms.map(Duration::from_millis)
    }

    /// Restrict credential delivery to `origin`.
    pub fn expect_origin(mut self, origin: Origin) -> Self {
        self.expected_origins.push(origin);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedbackConfig {
    pub endpoint: String,
    /// Maximum content length, in characters.
    pub max_length: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.example.com/feedback".to_string(),
            max_length: 1000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ClientConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.handshake.fallback_delay(), Duration::from_secs(2));
        assert_eq!(config.handshake.placeholder, DEV_PLACEHOLDER);
        assert_eq!(config.handshake.reply_timeout(), None);
        assert!(config.handshake.origin_policy().is_unrestricted());
        assert_eq!(config.feedback.max_length, 1000);
    }

    #[test]
    fn parses_full_file() {
        let config = ClientConfig::from_toml_str(
            r#"
            [handshake]
            expected_origins = ["https://Host.Example.com"]
            fallback_delay_ms = 500
            reply_timeout_ms = 10000

            [feedback]
            endpoint = "http://127.0.0.1:9000/feedback"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.handshake.expected_origins[0].to_string(),
            "https://host.example.com"
        );
        assert_eq!(config.handshake.fallback_delay(), Duration::from_millis(500));
        assert_eq!(
            config.handshake.reply_timeout(),
            Some(Duration::from_secs(10))
        );
        assert!(!config.handshake.origin_policy().is_unrestricted());
        assert_eq!(config.feedback.endpoint, "http://127.0.0.1:9000/feedback");
        assert_eq!(config.feedback.max_length, 1000);
    }

    #[test]
    fn bad_origin_is_a_parse_error() {
        let err = ClientConfig::from_toml_str(
            r#"
            [handshake]
            expected_origins = ["host.example.com"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ClientConfig::from_toml_str("[handshake]\ntarget = \"*\"\n").is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ClientConfig::load("/nonexistent/tokenbridge.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tokenbridge.toml"));
    }
}
