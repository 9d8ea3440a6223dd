//! Integration tests for ConfigManager and settings file handling
//!
//! These tests verify:
//! - Defaults when neither a file nor the environment provide values
//! - Settings file loading, including the legacy string forms
//! - Environment variables overriding the file
//! - Template generation
//! - Seeding a new state document from settings

use camino::Utf8PathBuf;
use config::Map;
use md2image::{ConfigManager, StateStore};
use std::fs;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

fn env(pairs: &[(&str, &str)]) -> Option<Map<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
    assert_eq!(manager.settings_path(), config_path.join("md2image.yaml").as_path());
}

#[test]
fn test_config_dir_is_created() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let nested = config_path.join("etc").join("md2image");

    ConfigManager::new(&nested).unwrap();

    assert!(nested.is_dir());
}

#[test]
fn test_load_settings_from_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(
        manager.settings_path(),
        "bot_token: \"123:abc\"\nadmin_ids: [5, 6]\npublic_enabled: false\nrender_width: 800\n",
    )
    .unwrap();

    let settings = manager.load_settings_with_env(env(&[])).unwrap();

    assert_eq!(settings.bot_token, "123:abc");
    assert_eq!(settings.admin_identities(), vec![5, 6]);
    assert!(!settings.public_enabled);
    assert_eq!(settings.render_width, 800);
    assert_eq!(settings.api_port, 8000);
}

#[test]
fn test_admin_ids_as_comma_separated_string() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(manager.settings_path(), "admin_ids: \"7,8, nine ,10\"\n").unwrap();

    let settings = manager.load_settings_with_env(env(&[])).unwrap();

    // Invalid entries are skipped, not fatal
    assert_eq!(settings.admin_identities(), vec![7, 8, 10]);
    assert_eq!(settings.admin_ids.parse().skipped, vec!["nine".to_string()]);
}

#[test]
fn test_environment_overrides_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(
        manager.settings_path(),
        "public_enabled: true\napi_port: 8000\ndebug_mode: false\n",
    )
    .unwrap();

    let settings = manager
        .load_settings_with_env(env(&[
            ("PUBLIC_ENABLED", "0"),
            ("API_PORT", "8443"),
            ("DEBUG_MODE", "on"),
            ("API_TOKEN", "secret"),
        ]))
        .unwrap();

    assert!(!settings.public_enabled);
    assert_eq!(settings.api_port, 8443);
    assert!(settings.debug_mode);
    assert_eq!(settings.api_token, "secret");
}

#[test]
fn test_invalid_port_is_an_error() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let result = manager.load_settings_with_env(env(&[("API_PORT", "not-a-port")]));

    assert!(result.is_err());
}

#[test]
fn test_malformed_settings_file_is_an_error() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(manager.settings_path(), "admin_ids: [1, 2\n").unwrap();

    assert!(manager.load_settings_with_env(env(&[])).is_err());
}

#[test]
fn test_write_template_then_load() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut settings = manager.load_settings_with_env(env(&[])).unwrap();
    settings.public_enabled = false;
    settings.state_path = Utf8PathBuf::from("data/state.json");
    manager.write_template(&settings).unwrap();

    let content = fs::read_to_string(manager.settings_path()).unwrap();
    assert!(content.contains("state_path"));

    let loaded = manager.load_settings_with_env(env(&[])).unwrap();
    assert!(!loaded.public_enabled);
    assert_eq!(loaded.state_path, "data/state.json");
}

#[test]
fn test_settings_seed_only_new_documents() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    let settings = manager
        .load_settings_with_env(env(&[("PUBLIC_ENABLED", "false")]))
        .unwrap();

    let state_path = config_path.join("storage").join("state.json");
    let store = StateStore::open_seeded(&state_path, settings.public_enabled).unwrap();
    assert!(!store.load().unwrap().config.public_enabled);

    // Once the document exists, the persisted flag is authoritative
    let reopened = StateStore::open_seeded(&state_path, true).unwrap();
    assert!(!reopened.load().unwrap().config.public_enabled);
}
