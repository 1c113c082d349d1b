//! Configuration file parser for ~/.config/dramabox/config.toml.
//!
//! The config file is optional: a missing or empty file yields
//! `Config::default()`. Unknown keys are accepted but logged, since they are
//! usually typos of a real key.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::access::FREE_EPISODE_LIMIT;
use crate::pager::SHORT_PAGE_THRESHOLD;
use crate::util::MAX_SEARCH_QUERY_LENGTH;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("HOME environment variable not set")]
    NoHome,

    #[error("Invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Top-level client configuration.
///
/// Every key is optional; missing keys fall back to `Default::default()`.
/// `Debug` masks `api_token`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend origin serving `/api/proxy/*` and the account endpoints.
    pub api_base_url: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Episodes with an index below this are always playable.
    pub free_episode_limit: usize,

    /// A page with fewer items than this ends the stream.
    pub short_page_threshold: usize,

    /// Trailing debounce delay for search input.
    pub search_debounce_ms: u64,

    /// Queries shorter than this never fetch.
    pub min_search_chars: usize,

    /// Bot username used in referral links.
    pub bot_username: String,

    /// Host ids granted admin access in addition to the backend role.
    pub admin_ids: Vec<i64>,

    /// Bearer token for the backend. `DRAMABOX_API_TOKEN` takes precedence.
    pub api_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_secs: 15,
            free_episode_limit: FREE_EPISODE_LIMIT,
            short_page_threshold: SHORT_PAGE_THRESHOLD,
            search_debounce_ms: 400,
            min_search_chars: 2,
            bot_username: "DramaBoxBot".to_string(),
            admin_ids: Vec::new(),
            api_token: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("free_episode_limit", &self.free_episode_limit)
            .field("short_page_threshold", &self.short_page_threshold)
            .field("search_debounce_ms", &self.search_debounce_ms)
            .field("min_search_chars", &self.min_search_chars)
            .field("bot_username", &self.bot_username)
            .field("admin_ids", &self.admin_ids)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

const KNOWN_KEYS: &[&str] = &[
    "api_base_url",
    "request_timeout_secs",
    "free_episode_limit",
    "short_page_threshold",
    "search_debounce_ms",
    "min_search_chars",
    "bot_username",
    "admin_ids",
    "api_token",
];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Default location: `~/.config/dramabox/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = std::env::var_os("HOME").ok_or(ConfigError::NoHome)?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("dramabox")
            .join("config.toml"))
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)`
    /// - Unknown keys → accepted, logged as warning
    /// - Out-of-range numbers → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        tracing::info!(api_base_url = %config.api_base_url, "Loaded configuration");
        Ok(config)
    }

    /// Reject values that would disable a gate. `request_timeout_secs = 0`
    /// is clamped instead (see [`Config::request_timeout`]).
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_search_chars == 0 || self.min_search_chars > MAX_SEARCH_QUERY_LENGTH {
            return Err(ConfigError::Invalid {
                key: "min_search_chars",
                reason: format!(
                    "must be between 1 and {MAX_SEARCH_QUERY_LENGTH}, got {}",
                    self.min_search_chars
                ),
            });
        }
        if self.short_page_threshold == 0 {
            return Err(ConfigError::Invalid {
                key: "short_page_threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dramabox_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.free_episode_limit, 10);
        assert_eq!(config.short_page_threshold, 5);
        assert_eq!(config.search_debounce_ms, 400);
        assert_eq!(config.min_search_chars, 2);
        assert!(config.admin_ids.is_empty());
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/dramabox_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.bot_username, "DramaBoxBot");
    }

    #[test]
    fn test_whitespace_file_returns_default() {
        let dir = scratch_dir("whitespace");
        let path = dir.join("config.toml");
        std::fs::write(&path, "  \n \n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.request_timeout_secs, 15);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let config = Config::parse("api_base_url = \"https://drama.example.com\"\n").unwrap();
        assert_eq!(config.api_base_url, "https://drama.example.com");
        assert_eq!(config.free_episode_limit, 10);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
api_base_url = "https://drama.example.com"
request_timeout_secs = 30
free_episode_limit = 5
short_page_threshold = 10
search_debounce_ms = 250
min_search_chars = 3
bot_username = "ShortReelBot"
admin_ids = [1001, 1002]
api_token = "secret-token"
"#;
        let config = Config::parse(content).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.free_episode_limit, 5);
        assert_eq!(config.short_page_threshold, 10);
        assert_eq!(config.search_debounce(), Duration::from_millis(250));
        assert_eq!(config.min_search_chars, 3);
        assert_eq!(config.bot_username, "ShortReelBot");
        assert_eq!(config.admin_ids, vec![1001, 1002]);
        assert_eq!(config.api_token.as_deref(), Some("secret-token"));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::parse("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::parse("free_episode_limit = \"ten\"\n").is_err());
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::parse("bot_username = \"X\"\nthemez = \"dark\"\n").unwrap();
        assert_eq!(config.bot_username, "X");
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = scratch_dir("too_large");
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_gate_disabling_values_rejected() {
        for (content, key) in [
            ("min_search_chars = 0\n", "min_search_chars"),
            ("min_search_chars = 257\n", "min_search_chars"),
            ("short_page_threshold = 0\n", "short_page_threshold"),
        ] {
            let err = Config::parse(content).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { key: k, .. } if k == key),
                "content: {content}"
            );
            assert!(err.to_string().contains(key));
        }
        assert!(Config::parse("min_search_chars = 1\nshort_page_threshold = 1\n").is_ok());
    }

    #[test]
    fn test_zero_timeout_clamped() {
        let config = Config::parse("request_timeout_secs = 0\n").unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_debug_masks_api_token() {
        let mut config = Config::default();
        config.api_token = Some("super-secret-token".to_string());

        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-token"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
