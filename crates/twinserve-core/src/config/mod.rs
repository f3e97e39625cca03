use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::util::ensure_dir;

/// Default persona system prompt. Replaced per-deployment via config; keeping
/// a working default means a fresh checkout answers in character immediately.
pub const DEFAULT_PERSONA: &str = "You are a digital twin of a technology executive. \
Respond in first person, concise and direct. Cite specific numbers when relevant. \
If you don't know something about the person you represent, say so instead of inventing it.";

/// Root configuration for twinserve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[derive(Default)]
pub struct Config {
    pub server: ServerConfig,
    pub persona: PersonaConfig,
    pub completion: CompletionConfig,
    pub speech: SpeechConfig,
    pub avatar: AvatarConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonaConfig {
    pub system_prompt: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_PERSONA.to_string(),
        }
    }
}

/// Completion vendor (OpenAI-compatible) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompletionConfig {
    pub api_key: String,
    pub api_base: Option<String>,
    pub model: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Speech-synthesis vendor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeechConfig {
    pub api_key: String,
    pub api_base: Option<String>,
    pub voice_id: String,
    pub model_id: String,
    pub stability: f64,
    pub similarity_boost: f64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            voice_id: String::new(),
            model_id: "eleven_flash_v2_5".to_string(),
            stability: 0.35,
            similarity_boost: 0.85,
        }
    }
}

/// Video-avatar vendor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[derive(Default)]
pub struct AvatarConfig {
    pub api_key: String,
    pub api_base: Option<String>,
    /// Publicly reachable portrait image used as the talking-head source.
    pub source_url: String,
    /// Voice id passed through to the avatar vendor's speech provider.
    pub voice_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsConfig {
    pub data_file: String,
    pub admin_key: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            data_file: "analytics-data.json".to_string(),
            admin_key: String::new(),
        }
    }
}

impl Config {
    /// Expanded path to the analytics document.
    pub fn analytics_path(&self) -> PathBuf {
        let path = &self.analytics.data_file;
        if path.starts_with("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(&path[2..]);
            }
        }
        PathBuf::from(path)
    }
}

// ====== Config loading/saving ======

/// Load configuration from environment variables.
///
/// Priority:
/// 1. `TWINSERVE_CONFIG` env var — full JSON config
/// 2. Individual env vars (merged on top of the file config)
/// 3. File fallback (`~/.twinserve/config.json`)
pub fn load_config_from_env() -> Config {
    if let Ok(json) = std::env::var("TWINSERVE_CONFIG") {
        match serde_json::from_str::<Config>(&json) {
            Ok(config) => return config,
            Err(e) => {
                tracing::warn!("Failed to parse TWINSERVE_CONFIG: {}", e);
            }
        }
    }

    let mut cfg = load_config(None);

    if let Ok(v) = std::env::var("OPENAI_API_KEY") {
        cfg.completion.api_key = v;
    }
    if let Ok(v) = std::env::var("OPENAI_API_BASE") {
        cfg.completion.api_base = Some(v);
    }
    if let Ok(v) = std::env::var("TWINSERVE_MODEL") {
        cfg.completion.model = v;
    }

    if let Ok(v) = std::env::var("ELEVENLABS_API_KEY") {
        cfg.speech.api_key = v;
    }
    if let Ok(v) = std::env::var("ELEVENLABS_VOICE_ID") {
        cfg.speech.voice_id = v;
    }

    if let Ok(v) = std::env::var("DID_API_KEY") {
        cfg.avatar.api_key = v;
    }
    if let Ok(v) = std::env::var("AVATAR_SOURCE_URL") {
        cfg.avatar.source_url = v;
    }

    if let Ok(v) = std::env::var("TWINSERVE_ADMIN_KEY") {
        cfg.analytics.admin_key = v;
    }
    if let Ok(v) = std::env::var("TWINSERVE_DATA_FILE") {
        cfg.analytics.data_file = v;
    }

    if let Ok(v) = std::env::var("TWINSERVE_PERSONA") {
        cfg.persona.system_prompt = v;
    }

    cfg
}

/// Get the default configuration file path.
pub fn get_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".twinserve")
        .join("config.json")
}

/// Load configuration from file or create default.
pub fn load_config(config_path: Option<&Path>) -> Config {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if path.exists() {
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Config>(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse config from {}: {}", path.display(), e);
                    tracing::warn!("Using default configuration.");
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config from {}: {}", path.display(), e);
                tracing::warn!("Using default configuration.");
            }
        }
    }

    Config::default()
}

/// Save configuration to file.
pub fn save_config(config: &Config, config_path: Option<&Path>) -> std::result::Result<(), ConfigError> {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if let Some(parent) = path.parent() {
        ensure_dir(parent).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    }

    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.completion.model, "gpt-4o-mini");
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.speech.model_id, "eleven_flash_v2_5");
        assert!(cfg.persona.system_prompt.contains("digital twin"));
        assert!(cfg.analytics.admin_key.is_empty());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let mut cfg = Config::default();
        cfg.completion.api_key = "sk-test".to_string();
        cfg.analytics.admin_key = "secret".to_string();
        let json = serde_json::to_string(&cfg).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.completion.api_key, "sk-test");
        assert_eq!(parsed.analytics.admin_key, "secret");
    }

    #[test]
    fn test_config_camelcase_compat() {
        let json = r#"{
            "completion": {"apiKey": "k", "model": "gpt-4o"},
            "analytics": {"dataFile": "/tmp/a.json", "adminKey": "x"}
        }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.completion.api_key, "k");
        assert_eq!(cfg.completion.model, "gpt-4o");
        assert_eq!(cfg.analytics.data_file, "/tmp/a.json");
        // Omitted sections fall back to defaults
        assert_eq!(cfg.server.port, 3000);
    }

    #[test]
    fn test_save_and_load_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");

        let mut cfg = Config::default();
        cfg.speech.voice_id = "v123".to_string();
        save_config(&cfg, Some(&path)).unwrap();

        let loaded = load_config(Some(&path));
        assert_eq!(loaded.speech.voice_id, "v123");
    }

    #[test]
    fn test_load_config_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nope.json");
        let cfg = load_config(Some(&path));
        assert_eq!(cfg.completion.model, "gpt-4o-mini");
    }

    #[test]
    fn test_analytics_path_expansion() {
        let mut cfg = Config::default();
        cfg.analytics.data_file = "~/data/analytics.json".to_string();
        let path = cfg.analytics_path();
        assert!(path.ends_with("data/analytics.json"));
        assert!(!path.to_string_lossy().contains('~'));
    }
}
