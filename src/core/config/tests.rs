use super::data::{Config, DEFAULT_BASE_URL, DEFAULT_MODEL};
use super::io::ConfigError;
use tempfile::TempDir;

#[test]
fn test_load_nonexistent_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nonexistent_config.toml");

    let config = Config::load_from_path(&config_path).expect("Failed to load config");

    assert_eq!(config, Config::default());
    assert_eq!(config.base_url_or_default(), DEFAULT_BASE_URL);
    assert_eq!(config.model_or_default(), DEFAULT_MODEL);
}

#[test]
fn test_config_persistence_lifecycle() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config
        .set_value("base-url", "https://gateway.example/v1")
        .unwrap();
    config.set_value("api-key", "sk-test").unwrap();
    config.set_value("web-search", "on").unwrap();
    config
        .save_to_path(&config_path)
        .expect("Failed to save config");

    let loaded = Config::load_from_path(&config_path).expect("Failed to load config");
    assert_eq!(loaded.base_url.as_deref(), Some("https://gateway.example/v1"));
    assert_eq!(loaded.api_key.as_deref(), Some("sk-test"));
    assert!(loaded.web_search_enabled());
    assert!(!loaded.strict_frames_enabled());

    let mut loaded = loaded;
    loaded.unset_value("api-key").unwrap();
    loaded.save_to_path(&config_path).unwrap();
    let reloaded = Config::load_from_path(&config_path).unwrap();
    assert_eq!(reloaded.api_key, None);
    assert_eq!(reloaded.base_url.as_deref(), Some("https://gateway.example/v1"));
}

#[test]
fn test_invalid_toml_reports_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "base_url = [unterminated").unwrap();

    let err = Config::load_from_path(&config_path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn test_setting_validation() {
    let mut config = Config::default();
    assert!(matches!(
        config.set_value("theme", "dark"),
        Err(ConfigError::UnknownKey(_))
    ));
    assert!(matches!(
        config.set_value("web-search", "maybe"),
        Err(ConfigError::InvalidValue { .. })
    ));
    assert!(matches!(
        config.set_value("default-model", "   "),
        Err(ConfigError::InvalidValue { .. })
    ));

    config.set_value("strict-frames", "true").unwrap();
    assert!(config.strict_frames_enabled());
    config.set_value("default-model", "model-x").unwrap();
    assert_eq!(config.model_or_default(), "model-x");
}

#[test]
fn test_blank_values_fall_back_to_defaults() {
    let config = Config {
        base_url: Some("  ".to_string()),
        default_model: Some(String::new()),
        ..Default::default()
    };
    assert_eq!(config.base_url_or_default(), DEFAULT_BASE_URL);
    assert_eq!(config.model_or_default(), DEFAULT_MODEL);
}
