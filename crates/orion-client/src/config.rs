use orion_channels::ChannelConfig;
use orion_core::{OrionError, OrionResult};
use orion_voice::{VoiceConfig, VoiceIdentity};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Environment variable overriding `token`.
pub const ENV_TOKEN: &str = "ORION_TOKEN";
/// Environment variable overriding `api_url`.
pub const ENV_API_URL: &str = "ORION_API_URL";
/// Environment variable overriding `ws_url`.
pub const ENV_WS_URL: &str = "ORION_WS_URL";

/// Client configuration, read from `orion.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// REST base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// WebSocket base URL.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// WebSocket namespace appended to `ws_url`.
    #[serde(default = "default_ws_namespace")]
    pub ws_namespace: String,
    /// Bearer token.
    #[serde(default)]
    pub token: Option<String>,
    /// Display name of the signed-in user.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Voice bridge settings.
    #[serde(default)]
    pub voice: VoiceConfig,
}

fn default_api_url() -> String {
    "http://localhost:3000/api/v1".to_string()
}
fn default_ws_url() -> String {
    "ws://localhost:3000".to_string()
}
fn default_ws_namespace() -> String {
    "/voice".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: default_ws_url(),
            ws_namespace: default_ws_namespace(),
            token: None,
            user_name: None,
            voice: VoiceConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Parse a TOML document.
    pub fn from_toml(source: &str) -> OrionResult<Self> {
        toml::from_str(source).map_err(|e| OrionError::Config(e.to_string()))
    }

    /// Load `path`, falling back to defaults when the file does not exist.
    pub async fn load(path: &Path) -> OrionResult<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(source) => Self::from_toml(&source).map_err(|e| {
                OrionError::Config(format!("Failed to parse '{}': {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(OrionError::Config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))),
        }
    }

    /// Apply `ORION_*` overrides from the process environment.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `ORION_*` overrides from `lookup`. Empty values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(token) = get(ENV_TOKEN) {
            self.token = Some(token);
        }
        if let Some(api_url) = get(ENV_API_URL) {
            self.api_url = api_url;
        }
        if let Some(ws_url) = get(ENV_WS_URL) {
            self.ws_url = ws_url;
        }
        self
    }

    /// Who the voice bridge speaks for.
    pub fn voice_identity(&self) -> VoiceIdentity {
        VoiceIdentity {
            token: self.token.clone(),
            user_name: self.user_name.clone(),
        }
    }

    /// Connection Manager settings.
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig::new(self.ws_url.clone(), self.ws_namespace.clone())
    }
}
