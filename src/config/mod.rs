use crate::models::Settings;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat, Map};
use std::fs;

/// Name of the optional settings file inside the configuration directory.
pub const SETTINGS_FILE: &str = "md2image.yaml";

/// Configuration manager for process settings.
///
/// Settings are layered, later sources overriding earlier ones:
/// - built-in defaults ([`Settings::default`])
/// - `md2image.yaml` in the configuration directory, if present
/// - environment variables (`BOT_TOKEN`, `ADMIN_IDS`, `PUBLIC_ENABLED`,
///   `API_HOST`, `API_PORT`, `API_TOKEN`, `RENDER_WIDTH`, `STATE_PATH`,
///   `LOG_DIR`, `DEBUG_MODE`)
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// The directory is created if it doesn't exist.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join(SETTINGS_FILE),
            config_dir,
        })
    }

    /// Load settings from the settings file and the process environment.
    pub fn load_settings(&self) -> Result<Settings> {
        self.load_settings_with_env(None)
    }

    /// Load settings using `env` in place of the process environment.
    ///
    /// Passing `None` reads the real environment.
    pub fn load_settings_with_env(&self, env: Option<Map<String, String>>) -> Result<Settings> {
        if self.settings_path.exists() {
            tracing::info!("Loading settings from {}", self.settings_path);
        } else {
            tracing::debug!("No settings file at {}, using defaults and environment", self.settings_path);
        }

        let built = Config::builder()
            .add_source(
                File::new(self.settings_path.as_str(), FileFormat::Yaml).required(false),
            )
            .add_source(Environment::default().source(env))
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let settings: Settings = built
            .try_deserialize()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::debug!("Loaded settings: state={}", settings.state_path);
        Ok(settings)
    }

    /// Write `settings` as a YAML template to the settings file.
    pub fn write_template(&self, settings: &Settings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings template to {}", self.settings_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Get the settings file path.
    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}
