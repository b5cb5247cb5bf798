//! Configuration loading for chatprobe.
//!
//! Settings come from `chatprobe.yml`, then environment variables, then CLI
//! flags (applied by the binary). Every section is optional.
//!
//! ```yaml
//! channel:
//!   url: ws://localhost:3001/ws
//!   identity: "551126509993@c.us"
//!   self_address: "5518981851760@c.us"
//! run:
//!   settle_delay_ms: 2000
//!   response_timeout_secs: 30
//! context_reset:
//!   endpoint: https://bot.example.com/api/v1/context/reset
//!   phone: "5518981851760@c.us"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::driver::RunSettings;

/// Pause between the last matched response of a turn and the next user message.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(2000);

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "chatprobe.yml";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatprobeConfig {
    pub channel: ChannelConfig,
    pub run: RunConfig,
    pub context_reset: ContextResetConfig,
}

/// Where the realtime channel lives and who we talk to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Websocket URL of the messaging gateway.
    pub url: String,
    /// Address of the bot conversation messages are sent to.
    pub identity: String,
    /// Our own address. Inbound messages from it are echoes and get dropped.
    pub self_address: Option<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3001/ws".to_string(),
            identity: String::new(),
            self_address: None,
        }
    }
}

/// Pacing of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub settle_delay_ms: u64,
    /// Fail the run when the bot stays silent this long. Unset waits forever.
    pub response_timeout_secs: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: DEFAULT_SETTLE_DELAY.as_millis() as u64,
            response_timeout_secs: None,
        }
    }
}

/// Optional endpoint that clears server-side conversation context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextResetConfig {
    pub endpoint: Option<String>,
    /// Tester phone sent along with the reset; defaults to `channel.self_address`.
    pub phone: Option<String>,
}

impl ChatprobeConfig {
    /// Parses configuration from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Loads configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config");
        Self::from_yaml(&yaml)
    }

    /// Loads `path` if given, otherwise `chatprobe.yml` when present, otherwise defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Applies `CHATPROBE_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("CHATPROBE_CHANNEL_URL") {
            self.channel.url = url;
        }
        if let Some(identity) = lookup("CHATPROBE_IDENTITY") {
            self.channel.identity = identity;
        }
        if let Some(delay) = lookup("CHATPROBE_SETTLE_DELAY_MS") {
            self.run.settle_delay_ms = delay.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "CHATPROBE_SETTLE_DELAY_MS",
                value: delay,
            })?;
        }
        if let Some(timeout) = lookup("CHATPROBE_RESPONSE_TIMEOUT_SECS") {
            let secs = timeout.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "CHATPROBE_RESPONSE_TIMEOUT_SECS",
                value: timeout,
            })?;
            self.run.response_timeout_secs = Some(secs);
        }
        Ok(())
    }

    /// Checks the values needed to open a channel.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.channel.url.starts_with("ws://") || self.channel.url.starts_with("wss://")) {
            return Err(ConfigError::Invalid(format!(
                "channel.url must be a ws:// or wss:// URL, got '{}'",
                self.channel.url
            )));
        }
        if self.channel.identity.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "channel.identity is required (or set CHATPROBE_IDENTITY)".to_string(),
            ));
        }
        Ok(())
    }

    /// Run pacing derived from the `run` section.
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            settle_delay: Duration::from_millis(self.run.settle_delay_ms),
            response_timeout: self.run.response_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Phone reported to the context reset endpoint.
    pub fn reset_phone(&self) -> Option<&str> {
        self.context_reset
            .phone
            .as_deref()
            .or(self.channel.self_address.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_source_pacing() {
        let config = ChatprobeConfig::default();
        let settings = config.run_settings();
        assert_eq!(settings.settle_delay, Duration::from_secs(2));
        assert_eq!(settings.response_timeout, None);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = ChatprobeConfig::from_yaml(
            "channel:\n  identity: bot@c.us\nrun:\n  response_timeout_secs: 30\n",
        )
        .unwrap();

        assert_eq!(config.channel.identity, "bot@c.us");
        assert_eq!(config.channel.url, "ws://localhost:3001/ws");
        assert_eq!(config.run.settle_delay_ms, 2000);
        assert_eq!(
            config.run_settings().response_timeout,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chatprobe.yml");
        std::fs::write(
            &path,
            "channel:\n  url: wss://gw.example.com/ws\n  identity: bot\n  self_address: me\n\
             context_reset:\n  endpoint: https://reset.example.com\n",
        )
        .unwrap();

        let config = ChatprobeConfig::load(&path).unwrap();
        assert_eq!(config.channel.url, "wss://gw.example.com/ws");
        assert_eq!(config.reset_phone(), Some("me"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = ChatprobeConfig::load(Path::new("/nonexistent/chatprobe.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("CHATPROBE_CHANNEL_URL", "ws://10.0.0.5:3001"),
            ("CHATPROBE_IDENTITY", "other@c.us"),
            ("CHATPROBE_SETTLE_DELAY_MS", "500"),
        ]
        .into_iter()
        .collect();

        let mut config = ChatprobeConfig::default();
        config
            .apply_overrides(|name| env.get(name).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.channel.url, "ws://10.0.0.5:3001");
        assert_eq!(config.channel.identity, "other@c.us");
        assert_eq!(config.run_settings().settle_delay, Duration::from_millis(500));
    }

    #[test]
    fn bad_env_delay_is_rejected() {
        let mut config = ChatprobeConfig::default();
        let err = config
            .apply_overrides(|name| (name == "CHATPROBE_SETTLE_DELAY_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn env_sets_response_timeout() {
        let mut config = ChatprobeConfig::default();
        config
            .apply_overrides(|name| {
                (name == "CHATPROBE_RESPONSE_TIMEOUT_SECS").then(|| "45".to_string())
            })
            .unwrap();
        assert_eq!(
            config.run_settings().response_timeout,
            Some(Duration::from_secs(45))
        );

        let err = config
            .apply_overrides(|name| {
                (name == "CHATPROBE_RESPONSE_TIMEOUT_SECS").then(|| "-1".to_string())
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                name: "CHATPROBE_RESPONSE_TIMEOUT_SECS",
                ..
            }
        ));
    }

    #[test]
    fn validation_requires_ws_url_and_identity() {
        let mut config = ChatprobeConfig::default();
        assert!(config.validate().is_err());

        config.channel.identity = "bot@c.us".into();
        assert!(config.validate().is_ok());

        config.channel.url = "http://localhost:3001".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ws://"));
    }
}
