use std::fmt;
use std::sync::RwLock;

use crate::core::config::data::{Config, DEFAULT_BASE_URL};

/// Environment variables consulted for the API key, in priority order.
pub const API_KEY_ENV: &[&str] = &["HUBCHAT_API_KEY", "OPENAI_API_KEY"];
/// Environment variables consulted for the base URL, in priority order.
pub const BASE_URL_ENV: &[&str] = &["HUBCHAT_BASE_URL", "OPENAI_BASE_URL"];

/// A resolved `{ api_key, base_url }` pair.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub base_url: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &if self.has_api_key() { "<set>" } else { "<empty>" })
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Supplies credentials to the transport. Called once per request; the
/// returned value is a snapshot, so implementations may change underneath
/// in-flight calls without affecting them.
///
/// Any bypass policy (for example an implicit development key) belongs in
/// the implementation. The transport treats an empty key as fatal.
pub trait CredentialSource: Send + Sync {
    fn resolve(&self) -> Credentials;
}

impl CredentialSource for Credentials {
    fn resolve(&self) -> Credentials {
        self.clone()
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves credentials from the environment, then the config file, then
/// built-in defaults. Blank values count as missing at every layer.
pub struct ConfigCredentials {
    config: RwLock<Config>,
    env: EnvLookup,
}

impl ConfigCredentials {
    pub fn new(config: Config) -> Self {
        Self::with_env(config, |name| std::env::var(name).ok())
    }

    pub fn with_env<F>(config: Config, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            config: RwLock::new(config),
            env: Box::new(lookup),
        }
    }

    /// Replaces the config snapshot used by subsequent calls.
    pub fn update(&self, config: Config) {
        let mut guard = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = config;
    }

    fn first_env(&self, names: &[&str]) -> Option<String> {
        names
            .iter()
            .filter_map(|name| (self.env)(name))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl CredentialSource for ConfigCredentials {
    fn resolve(&self) -> Credentials {
        let config = self
            .config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let api_key = self
            .first_env(API_KEY_ENV)
            .or_else(|| non_blank(config.api_key.as_ref()))
            .unwrap_or_default();
        let base_url = self
            .first_env(BASE_URL_ENV)
            .or_else(|| non_blank(config.base_url.as_ref()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Credentials { api_key, base_url }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn env_overrides_config() {
        let config = Config {
            api_key: Some("sk-config".to_string()),
            base_url: Some("https://config.example/v1".to_string()),
            ..Default::default()
        };
        let source = ConfigCredentials::with_env(
            config,
            env_of(&[
                ("OPENAI_API_KEY", "sk-openai"),
                ("HUBCHAT_BASE_URL", "https://env.example/v1"),
            ]),
        );

        let creds = source.resolve();
        assert_eq!(creds.api_key, "sk-openai");
        assert_eq!(creds.base_url, "https://env.example/v1");
    }

    #[test]
    fn hubchat_env_beats_openai_env() {
        let source = ConfigCredentials::with_env(
            Config::default(),
            env_of(&[("HUBCHAT_API_KEY", "sk-hub"), ("OPENAI_API_KEY", "sk-openai")]),
        );
        assert_eq!(source.resolve().api_key, "sk-hub");
    }

    #[test]
    fn blank_values_fall_through_to_defaults() {
        let config = Config {
            api_key: Some("   ".to_string()),
            base_url: Some(String::new()),
            ..Default::default()
        };
        let source = ConfigCredentials::with_env(config, env_of(&[("HUBCHAT_API_KEY", " ")]));

        let creds = source.resolve();
        assert!(!creds.has_api_key());
        assert_eq!(creds.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn update_is_seen_by_next_resolve() {
        let source = ConfigCredentials::with_env(Config::default(), env_of(&[]));
        assert!(!source.resolve().has_api_key());

        source.update(Config {
            api_key: Some("sk-new".to_string()),
            ..Default::default()
        });
        assert_eq!(source.resolve().api_key, "sk-new");
    }

    #[test]
    fn debug_output_hides_key() {
        let creds = Credentials::new("sk-secret", "https://api.example/v1");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<set>"));
    }
}
