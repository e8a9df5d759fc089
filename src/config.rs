use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AnalyzeError, Result};

/// Forge (GitHub-style REST) connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
   pub base_url: String,

   /// Optional bearer token (overridden by `GITHUB_TOKEN` env var)
   pub token: Option<String>,

   /// HTTP request timeout in seconds
   pub request_timeout_secs: u64,

   /// HTTP connection timeout in seconds
   pub connect_timeout_secs: u64,

   /// Stable User-Agent sent on every request
   pub user_agent: String,
}

impl Default for ForgeConfig {
   fn default() -> Self {
      Self {
         base_url:             "https://api.github.com".to_string(),
         token:                None,
         request_timeout_secs: 30,
         connect_timeout_secs: 10,
         user_agent:           concat!("repo-maint/", env!("CARGO_PKG_VERSION")).to_string(),
      }
   }
}

/// LLM review settings (chat-completion endpoint, worker pool, cache).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
   pub api_base_url: String,

   /// Optional API key (overridden by `OPENROUTER_API_KEY` env var)
   pub api_key: Option<String>,

   pub model:       String,
   pub temperature: f32,
   pub max_tokens:  u32,

   /// Provenance headers sent with every completion request
   pub referer: String,
   pub title:   String,

   /// HTTP request timeout in seconds
   pub request_timeout_secs: u64,

   /// HTTP connection timeout in seconds
   pub connect_timeout_secs: u64,

   /// Worker pool size for parallel prompt dispatch (floor of 3)
   pub workers: usize,

   /// Overall deadline across the three review prompts, in seconds
   pub deadline_secs: u64,

   /// Prompt cache capacity in entries
   pub cache_capacity: usize,

   /// Prompt cache entry time-to-live in seconds (0 disables expiry)
   pub cache_ttl_secs: u64,
}

impl Default for LlmConfig {
   fn default() -> Self {
      Self {
         api_base_url:         "https://openrouter.ai/api/v1".to_string(),
         api_key:              None,
         model:                "anthropic/claude-3.5-haiku".to_string(),
         temperature:          0.2, // Low temperature for consistent structured output
         max_tokens:           1000,
         referer:              "https://github.com/vowstar/repo-maint".to_string(),
         title:                "repo-maint".to_string(),
         request_timeout_secs: 60,
         connect_timeout_secs: 15,
         workers:              3,
         deadline_secs:        90,
         cache_capacity:       64,
         cache_ttl_secs:       1800,
      }
   }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
   pub forge: ForgeConfig,
   pub llm:   LlmConfig,
}

impl AppConfig {
   /// Load config from the default location (~/.config/repo-maint/config.toml)
   /// or `REPO_MAINT_CONFIG`. Falls back to defaults if no file exists.
   /// Environment variables override config file values:
   /// - `GITHUB_TOKEN` overrides `forge.token`
   /// - `OPENROUTER_API_KEY` overrides `llm.api_key`
   pub fn load() -> Result<Self> {
      let config_path = if let Ok(custom_path) = std::env::var("REPO_MAINT_CONFIG") {
         PathBuf::from(custom_path)
      } else {
         Self::default_config_path().unwrap_or_default()
      };

      let mut config = if config_path.exists() {
         Self::from_file(&config_path)?
      } else {
         Self::default()
      };

      Self::apply_env_overrides(&mut config);
      Ok(config)
   }

   /// Load config from a specific file, then apply env overrides.
   pub fn from_file(path: &Path) -> Result<Self> {
      let contents = std::fs::read_to_string(path)
         .map_err(|e| AnalyzeError::Other(format!("Failed to read config: {e}")))?;
      let mut config: Self = toml::from_str(&contents)
         .map_err(|e| AnalyzeError::Other(format!("Failed to parse config: {e}")))?;

      Self::apply_env_overrides(&mut config);
      Ok(config)
   }

   fn apply_env_overrides(config: &mut Self) {
      if let Ok(token) = std::env::var("GITHUB_TOKEN")
         && !token.is_empty()
      {
         config.forge.token = Some(token);
      }

      if let Ok(api_key) = std::env::var("OPENROUTER_API_KEY")
         && !api_key.is_empty()
      {
         config.llm.api_key = Some(api_key);
      }
   }

   fn default_config_path() -> Result<PathBuf> {
      let home = std::env::var("HOME")
         .map_err(|_| AnalyzeError::Other("Cannot determine home directory".to_string()))?;
      Ok(PathBuf::from(home)
         .join(".config")
         .join("repo-maint")
         .join("config.toml"))
   }
}
