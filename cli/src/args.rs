use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use mailmigrate::config::{default_config_path, load_config, validate_config};
use mailmigrate::{MigrationConfig, ProgressMode};

use crate::error::CliError;

#[derive(Debug, Parser)]
#[clap(version, about, long_about = None)]
#[clap(name = "mailmigrate")]
pub struct Cli {
    /// Configuration file, defaults to the user config directory
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Root of the archive, one sub-directory per account
    #[clap(short, long)]
    pub backup_dir: Option<PathBuf>,

    /// File with one `identifier:secret` line per account
    #[clap(short, long)]
    pub accounts: Option<PathBuf>,

    /// IMAP server host name
    #[clap(long)]
    pub host: Option<String>,

    /// IMAP server port
    #[clap(long)]
    pub port: Option<u16>,

    /// Destination folder
    #[clap(long)]
    pub folder: Option<String>,

    /// Messages uploaded per session
    #[clap(long)]
    pub batch_size: Option<usize>,

    /// Accounts migrated concurrently
    #[clap(short, long)]
    pub workers: Option<usize>,

    /// Glob matched against archived file names
    #[clap(long)]
    pub pattern: Option<String>,

    /// Also write the log to this file
    #[clap(long)]
    pub log_file: Option<PathBuf>,

    #[clap(value_enum, long, default_value_t = ProgressArg::Auto)]
    pub progress: ProgressArg,

    /// List pending work without uploading or touching the ledger
    #[clap(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProgressArg {
    Auto,
    Bar,
    Plain,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Auto => ProgressMode::Auto,
            ProgressArg::Bar => ProgressMode::Bar,
            ProgressArg::Plain => ProgressMode::Plain,
        }
    }
}

impl Cli {
    /// The configuration file in effect: `--config`, else the default one when it exists.
    pub fn config_file(&self) -> Option<PathBuf> {
        match &self.config {
            Some(path) => Some(path.clone()),
            None => default_config_path().filter(|path| path.is_file()),
        }
    }

    /// Loads the configuration file, if any, and applies command line overrides.
    pub fn resolve_config(&self) -> Result<MigrationConfig, CliError> {
        let mut config = match self.config_file() {
            Some(path) => load_config(&path)?,
            None => {
                let backup_dir = self
                    .backup_dir
                    .clone()
                    .ok_or(CliError::Usage("--backup-dir is required without a config file"))?;
                let accounts = self
                    .accounts
                    .clone()
                    .ok_or(CliError::Usage("--accounts is required without a config file"))?;
                let host = self
                    .host
                    .clone()
                    .ok_or(CliError::Usage("--host is required without a config file"))?;
                MigrationConfig::new(backup_dir, accounts, host)
            }
        };

        self.apply(&mut config);
        validate_config(&config)?;
        Ok(config)
    }

    fn apply(&self, config: &mut MigrationConfig) {
        if let Some(backup_dir) = &self.backup_dir {
            config.backup_directory = backup_dir.clone();
        }
        if let Some(accounts) = &self.accounts {
            config.accounts_file = accounts.clone();
        }
        if let Some(host) = &self.host {
            config.imap.host = host.clone();
        }
        if let Some(port) = self.port {
            config.imap.port = port;
        }
        if let Some(folder) = &self.folder {
            config.imap.folder = folder.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(workers) = self.workers {
            config.worker_count = workers;
        }
        if let Some(pattern) = &self.pattern {
            config.message_pattern = pattern.clone();
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = Some(log_file.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_flags_build_config() {
        let cli = Cli::parse_from([
            "mailmigrate",
            "--config",
            "/nonexistent/config.json",
        ]);
        assert!(matches!(cli.resolve_config(), Err(CliError::Config(_))));

        let cli = Cli::parse_from([
            "mailmigrate",
            "--backup-dir",
            "/srv/backup",
            "--accounts",
            "/srv/accounts.txt",
            "--host",
            "imap.example.com",
            "--batch-size",
            "25",
            "--progress",
            "plain",
        ]);
        let mut config = MigrationConfig::new("/srv/backup", "/srv/accounts.txt", "imap.example.com");
        cli.apply(&mut config);

        assert_eq!(config.batch_size, 25);
        assert_eq!(config.worker_count, 10);
        assert_eq!(cli.progress, ProgressArg::Plain);
    }

    #[test]
    fn test_explicit_config_file_is_reported() {
        let cli = Cli::parse_from(["mailmigrate", "--config", "/etc/mailmigrate.json"]);
        assert_eq!(cli.config_file(), Some(PathBuf::from("/etc/mailmigrate.json")));
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "version": "1.0",
                "backup_directory": "/srv/backup",
                "accounts_file": "/srv/accounts.txt",
                "imap": { "host": "imap.example.com" },
                "worker_count": 4
            }"#,
        )
        .unwrap();

        let cli = Cli::parse_from([
            "mailmigrate",
            "--config",
            path.to_str().unwrap(),
            "--folder",
            "Archive",
        ]);
        let config = cli.resolve_config().unwrap();

        assert_eq!(config.worker_count, 4);
        assert_eq!(config.imap.folder, "Archive");
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "version": "1.0",
                "backup_directory": "/srv/backup",
                "accounts_file": "/srv/accounts.txt",
                "imap": { "host": "imap.example.com" }
            }"#,
        )
        .unwrap();

        let cli = Cli::parse_from([
            "mailmigrate",
            "--config",
            path.to_str().unwrap(),
            "--batch-size",
            "0",
        ]);
        assert!(cli.resolve_config().is_err());
    }
}
