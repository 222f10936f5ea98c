use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::UploadConfig;

pub const CONFIG_VERSION: &str = "1.0";

/// Directory inside the backup root holding the default ledger files.
pub const LEDGER_DIR_NAME: &str = ".mailmigrate";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    #[serde(default = "default_version")]
    pub version: String,
    /// Root of the archive; each account lives in a sub-directory named after it.
    pub backup_directory: PathBuf,
    pub accounts_file: PathBuf,
    #[serde(default)]
    pub imap: ImapSettings,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Glob matched against file names inside an account directory.
    #[serde(default = "default_message_pattern")]
    pub message_pattern: String,
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_worker_count() -> usize {
    10
}

fn default_message_pattern() -> String {
    "*.eml".to_string()
}

impl MigrationConfig {
    pub fn new(
        backup_directory: impl Into<PathBuf>,
        accounts_file: impl Into<PathBuf>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            version: default_version(),
            backup_directory: backup_directory.into(),
            accounts_file: accounts_file.into(),
            imap: ImapSettings {
                host: host.into(),
                ..ImapSettings::default()
            },
            batch_size: default_batch_size(),
            worker_count: default_worker_count(),
            message_pattern: default_message_pattern(),
            ledger: LedgerSettings::default(),
            log_file: None,
        }
    }

    pub fn imported_ledger_path(&self) -> PathBuf {
        self.ledger
            .imported_file
            .clone()
            .unwrap_or_else(|| default_ledger_path(&self.backup_directory, "imported_messages.txt"))
    }

    pub fn migrated_ledger_path(&self) -> PathBuf {
        self.ledger
            .migrated_file
            .clone()
            .unwrap_or_else(|| default_ledger_path(&self.backup_directory, "migrated_accounts.txt"))
    }

    pub fn upload_config(&self) -> UploadConfig {
        UploadConfig {
            folder: self.imap.folder.clone(),
            batch_size: self.batch_size,
            session_timeout: Duration::from_secs(self.imap.session_timeout_secs),
            append_timeout: Duration::from_secs(self.imap.append_timeout_secs),
        }
    }
}

fn default_ledger_path(backup_directory: &Path, file_name: &str) -> PathBuf {
    backup_directory.join(LEDGER_DIR_NAME).join(file_name)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImapSettings {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub use_tls: bool,
    #[serde(default = "default_folder")]
    pub folder: String,
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,
    #[serde(default = "default_append_timeout")]
    pub append_timeout_secs: u64,
}

fn default_port() -> u16 {
    993
}

fn default_true() -> bool {
    true
}

fn default_folder() -> String {
    "INBOX".to_string()
}

fn default_session_timeout() -> u64 {
    60
}

fn default_append_timeout() -> u64 {
    120
}

impl Default for ImapSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            use_tls: true,
            folder: default_folder(),
            session_timeout_secs: default_session_timeout(),
            append_timeout_secs: default_append_timeout(),
        }
    }
}

/// Locations of the two ledger files. Unset paths live under the backup root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSettings {
    #[serde(default)]
    pub imported_file: Option<PathBuf>,
    #[serde(default)]
    pub migrated_file: Option<PathBuf>,
}
