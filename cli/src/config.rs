use config::{Config, Environment, File};
use registry::config::RegistryConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory and the user config dir.
pub const CONFIG_FILE_NAME: &str = "themectl.toml";
/// Prefix of environment overrides, e.g. `THEMECTL_REGISTRY__THEMES_PATH`.
pub const ENV_PREFIX: &str = "THEMECTL";

/// Top-level configuration of the binary
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CliConfig {
    #[serde(default)]
    registry: RegistryConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

impl CliConfig {
    pub fn registry(&self) -> &RegistryConfig {
        &self.registry
    }

    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct LoggingConfig {
    level: Option<String>,
    file: Option<String>,
}

impl LoggingConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("info")
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }
}

/// Outcome of loading the configuration
#[derive(Debug, Clone)]
pub enum ConfigLoadResult {
    Success(Box<CliConfig>),
    LoadError(String),
    DeserializeError(String),
}

impl ConfigLoadResult {
    pub fn into_result(self) -> Result<CliConfig, String> {
        match self {
            ConfigLoadResult::Success(config) => Ok(*config),
            ConfigLoadResult::LoadError(msg) | ConfigLoadResult::DeserializeError(msg) => Err(msg),
        }
    }
}

/// Directory for user-level configuration (`~/.config/themectl` on Unix)
pub fn get_config_dir() -> Option<PathBuf> {
    if cfg!(unix) {
        if let Some(mut home_path) = dirs::home_dir() {
            home_path.push(".config");
            home_path.push("themectl");
            return Some(home_path);
        }
    }

    dirs::config_dir().map(|mut path| {
        path.push("themectl");
        path
    })
}

/// Picks the configuration file: explicit path, else `./themectl.toml`, else
/// the user config dir. `None` when nothing exists.
pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    get_config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}

/// Loads configuration from the file (when any) and environment overrides,
/// then validates the registry section.
///
/// An explicitly requested file must exist; the default locations are
/// optional.
pub fn load_config(explicit: Option<&Path>) -> ConfigLoadResult {
    dotenv::dotenv().ok();

    let env_source = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true);

    let mut builder = Config::builder();
    if let Some(path) = find_config_file(explicit) {
        log::debug!("Using configuration file {}", path.display());
        builder = builder.add_source(File::from(path).required(explicit.is_some()));
    }

    let config = match builder.add_source(env_source).build() {
        Ok(config) => config,
        Err(e) => {
            return ConfigLoadResult::LoadError(format!(
                "Configuration loading failed: {e}. Please check your {CONFIG_FILE_NAME} file and environment variables."
            ));
        }
    };

    match config.try_deserialize::<CliConfig>() {
        Ok(cli_config) => {
            if let Err(validation_errors) = cli_config.registry().validate() {
                let error_messages: Vec<String> =
                    validation_errors.iter().map(|e| e.user_message()).collect();
                return ConfigLoadResult::DeserializeError(format!(
                    "Configuration validation failed:\n{}",
                    error_messages.join("\n\n")
                ));
            }
            ConfigLoadResult::Success(Box::new(cli_config))
        }
        Err(e) => ConfigLoadResult::DeserializeError(format!("Failed to deserialize config: {e}")),
    }
}
