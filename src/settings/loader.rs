// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Settings file discovery and loading.

use std::path::{Path, PathBuf};

use crate::error::{CredentialError, Result};

use super::config::Settings;

/// Default environment variable naming a settings file.
pub const DEFAULT_ENV_VAR: &str = "IOT_CREDS_CONFIG";

const FILE_NAME: &str = "iot-creds.toml";

/// Settings file loader with discovery and precedence rules.
///
/// # Search Order
///
/// Settings files are searched in the following order (first found wins):
///
/// 1. Explicit path (if set via `with_path()`)
/// 2. Environment variable `IOT_CREDS_CONFIG`
/// 3. User config directory: `~/.config/iot-creds/config.toml` on Linux
/// 4. Current directory: `./iot-creds.toml`
///
/// An explicit path or environment variable that points at a missing file is
/// an error rather than a fall-through.
///
/// # Example
///
/// ```no_run
/// use iot_credential_provider::settings::SettingsLoader;
///
/// let settings = SettingsLoader::new()
///     .with_path("/etc/iot-creds/config.toml")
///     .load()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    explicit_path: Option<PathBuf>,
    validate: bool,
    env_var_name: String,
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsLoader {
    /// Create a loader with default settings.
    pub fn new() -> Self {
        Self {
            explicit_path: None,
            validate: true,
            env_var_name: DEFAULT_ENV_VAR.to_string(),
        }
    }

    /// Set an explicit settings file path.
    ///
    /// When set, only this path will be checked.
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.explicit_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enable or disable validation after loading.
    ///
    /// Default: `true`
    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Set the environment variable name for path override.
    ///
    /// Default: `IOT_CREDS_CONFIG`
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var_name = name.into();
        self
    }

    /// Find, read, parse and (optionally) validate the settings file.
    pub fn load(&self) -> Result<Settings> {
        let path = self.find_config_file()?;
        tracing::debug!("Loading settings from {}", path.display());

        let toml_content = std::fs::read_to_string(&path).map_err(|e| {
            CredentialError::config(format!("Failed to read {}: {e}", path.display()))
        })?;

        self.load_from_str(&toml_content)
    }

    /// Parse settings from a TOML string.
    pub fn load_from_str(&self, toml_content: &str) -> Result<Settings> {
        let settings = Settings::from_toml(toml_content)?;

        if self.validate {
            settings.validate()?;
        }

        Ok(settings)
    }

    /// Find the settings file path.
    pub fn find_config_file(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.explicit_path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(CredentialError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        if let Ok(env_path) = std::env::var(&self.env_var_name) {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Ok(path);
            }
            return Err(CredentialError::config(format!(
                "Configuration file from {} not found: {}",
                self.env_var_name, env_path
            )));
        }

        let search_paths = self.search_paths();
        for path in &search_paths {
            if path.exists() {
                return Ok(path.clone());
            }
        }

        Err(CredentialError::config(format!(
            "No configuration file found. Searched:\n  - {}",
            search_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join("\n  - ")
        )))
    }

    /// Standard locations, in search order.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("iot-creds").join("config.toml"));
        }

        paths.push(PathBuf::from(FILE_NAME));
        paths
    }
}
