use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::config::io::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Keys accepted by `hubchat set` / `hubchat unset`.
pub const SETTING_KEYS: &[&str] = &[
    "base-url",
    "api-key",
    "default-model",
    "web-search",
    "strict-frames",
];

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Gateway base URL, e.g. `https://api.example.com/v1`
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub default_model: Option<String>,
    /// Send the web search tool and aggregator search flags by default
    pub web_search: Option<bool>,
    /// Abort a stream on a malformed data frame instead of skipping it
    pub strict_frames: Option<bool>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl Config {
    pub fn base_url_or_default(&self) -> &str {
        non_blank(self.base_url.as_ref()).unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn model_or_default(&self) -> &str {
        non_blank(self.default_model.as_ref()).unwrap_or(DEFAULT_MODEL)
    }

    pub fn web_search_enabled(&self) -> bool {
        self.web_search.unwrap_or(false)
    }

    pub fn strict_frames_enabled(&self) -> bool {
        self.strict_frames.unwrap_or(false)
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            });
        }

        match key {
            "base-url" => self.base_url = Some(trimmed.to_string()),
            "api-key" => self.api_key = Some(trimmed.to_string()),
            "default-model" => self.default_model = Some(trimmed.to_string()),
            "web-search" => self.web_search = Some(parse_bool(key, trimmed)?),
            "strict-frames" => self.strict_frames = Some(parse_bool(key, trimmed)?),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn unset_value(&mut self, key: &str) -> Result<(), ConfigError> {
        match key {
            "base-url" => self.base_url = None,
            "api-key" => self.api_key = None,
            "default-model" => self.default_model = None,
            "web-search" => self.web_search = None,
            "strict-frames" => self.strict_frames = None,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}
