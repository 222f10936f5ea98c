use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Mailbox error: {0}")]
    Email(#[from] crate::email::EmailError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid message pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Failed to read accounts file '{path}': {source}")]
    ReadAccounts {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Failed to read ledger '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open ledger '{path}' for writing: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append '{entry}' to ledger '{path}': {source}")]
    Write {
        path: PathBuf,
        entry: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Ledger lock poisoned for '{0}'")]
    Poisoned(PathBuf),
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Account directory not found: {0}")]
    DirectoryNotFound(PathBuf),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Failed to build async runtime: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, MigrateError>;
