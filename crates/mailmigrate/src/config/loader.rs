use std::path::{Path, PathBuf};

use crate::config::schema::{MigrationConfig, CONFIG_VERSION};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MigrationConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<MigrationConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: MigrationConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Default config file location, e.g. `~/.config/mailmigrate/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mailmigrate").join("config.json"))
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

/// Semantic checks shared by file-based and command-line configuration.
pub fn validate_config(config: &MigrationConfig) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.backup_directory.as_os_str().is_empty() {
        return Err(ConfigError::Missing("backup_directory"));
    }
    if config.accounts_file.as_os_str().is_empty() {
        return Err(ConfigError::Missing("accounts_file"));
    }
    if config.imap.host.trim().is_empty() {
        return Err(ConfigError::Missing("imap.host"));
    }
    if config.imap.folder.trim().is_empty() {
        return Err(ConfigError::Missing("imap.folder"));
    }

    if config.batch_size == 0 {
        return Err(ConfigError::Validation {
            message: "batch_size must be greater than 0".to_string(),
        });
    }
    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be greater than 0".to_string(),
        });
    }
    if config.imap.session_timeout_secs == 0 || config.imap.append_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "IMAP timeouts must be greater than 0".to_string(),
        });
    }

    if let Err(e) = glob::Pattern::new(&config.message_pattern) {
        return Err(ConfigError::InvalidPattern {
            pattern: config.message_pattern.clone(),
            reason: e.to_string(),
        });
    }

    Ok(())
}
