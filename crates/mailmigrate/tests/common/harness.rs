//! Test harness for whole migration runs.
//!
//! The `MigrationHarness` owns a temporary backup tree with one directory per
//! account, an accounts file, and builds coordinators wired to a
//! `RecordingConnector`.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use mailmigrate::config::{load_accounts, Account, MigrationConfig};
use mailmigrate::coordinator::{MigrationCoordinator, MigrationSummary};
use mailmigrate::email::MailParserMetadataReader;
use mailmigrate::ledger::Ledger;
use mailmigrate::pipeline::NoopProgress;

use super::connector::RecordingConnector;

pub struct MigrationHarness {
    temp_dir: TempDir,
    pub backup_dir: PathBuf,
    pub accounts_file: PathBuf,
    pub batch_size: usize,
    pub worker_count: usize,
}

impl MigrationHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let backup_dir = temp_dir.path().join("backup");
        let accounts_file = temp_dir.path().join("accounts.txt");
        std::fs::create_dir_all(&backup_dir).expect("Failed to create backup dir");

        Self {
            temp_dir,
            backup_dir,
            accounts_file,
            batch_size: 100,
            worker_count: 4,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes an archived message with a valid Date header.
    pub fn add_message(&self, account: &str, file_name: &str) -> PathBuf {
        let content = format!(
            "Date: Mon, 15 Jan 2024 10:30:00 +0200\r\nFrom: sender@example.com\r\nSubject: {}\r\n\r\nBody of {}\r\n",
            file_name, file_name
        );
        self.write_message(account, file_name, content.as_bytes())
    }

    /// Writes an archived message without any Date header.
    pub fn add_undated_message(&self, account: &str, file_name: &str) -> PathBuf {
        let content = format!("From: sender@example.com\r\nSubject: {}\r\n\r\nNo date\r\n", file_name);
        self.write_message(account, file_name, content.as_bytes())
    }

    pub fn write_message(&self, account: &str, file_name: &str, content: &[u8]) -> PathBuf {
        let dir = self.backup_dir.join(account);
        std::fs::create_dir_all(&dir).expect("Failed to create account dir");
        let path = dir.join(file_name);
        std::fs::write(&path, content).expect("Failed to write message");
        path
    }

    /// Writes `identifier:secret` lines for the given accounts.
    pub fn write_accounts(&self, accounts: &[&str]) {
        let content: String = accounts
            .iter()
            .map(|account| format!("{}:secret-{}\n", account, account))
            .collect();
        std::fs::write(&self.accounts_file, content).expect("Failed to write accounts file");
    }

    pub fn accounts(&self) -> Vec<Account> {
        load_accounts(&self.accounts_file)
            .expect("Failed to load accounts")
            .accounts
    }

    pub fn config(&self) -> MigrationConfig {
        let mut config = MigrationConfig::new(&self.backup_dir, &self.accounts_file, "imap.example.com");
        config.batch_size = self.batch_size;
        config.worker_count = self.worker_count;
        config
    }

    pub fn coordinator(&self, connector: &RecordingConnector) -> MigrationCoordinator {
        MigrationCoordinator::new(
            self.config(),
            Arc::new(connector.clone()),
            Arc::new(MailParserMetadataReader),
            Box::new(NoopProgress),
        )
        .expect("Failed to build coordinator")
    }

    /// Runs a full migration over the accounts file with a fresh coordinator.
    pub fn run(&self, connector: &RecordingConnector) -> MigrationSummary {
        self.coordinator(connector)
            .run(self.accounts())
            .expect("Migration run failed")
    }

    /// Re-reads the ledger files from disk.
    pub fn ledger(&self) -> Ledger {
        let config = self.config();
        Ledger::open(config.imported_ledger_path(), config.migrated_ledger_path())
            .expect("Failed to open ledger")
    }

    /// Lines of the imported-message ledger file, in write order.
    pub fn imported_lines(&self) -> Vec<String> {
        let path = self.config().imported_ledger_path();
        match std::fs::read_to_string(path) {
            Ok(content) => content.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }
}
