use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use glob::Pattern;
use log::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{ConfigError, SourceError};

/// An archived message file belonging to one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFile {
    /// `<account>/<file name>`, the key recorded in the ledger.
    pub id: String,
    pub path: PathBuf,
}

/// Enumerates archived messages below `<backup_dir>/<account>/`.
#[derive(Debug, Clone)]
pub struct MessageSource {
    backup_directory: PathBuf,
    pattern: Pattern,
}

impl MessageSource {
    pub fn new<P: AsRef<Path>>(backup_directory: P, pattern: &str) -> Result<Self, ConfigError> {
        let pattern = Pattern::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            backup_directory: backup_directory.as_ref().to_path_buf(),
            pattern,
        })
    }

    pub fn account_dir(&self, account: &str) -> PathBuf {
        self.backup_directory.join(account)
    }

    /// True when `account` names a directory directly below the backup root.
    pub fn has_account(&self, account: &str) -> bool {
        is_single_component(account) && self.account_dir(account).is_dir()
    }

    /// Messages of `account` whose identifier is not in `imported`.
    ///
    /// The sequence is produced lazily in directory listing order.
    pub fn pending<'a>(
        &'a self,
        account: &str,
        imported: &'a HashSet<String>,
    ) -> Result<impl Iterator<Item = MessageFile> + 'a, SourceError> {
        Ok(self
            .scan(account)?
            .filter(move |message| !imported.contains(&message.id)))
    }

    /// Every matching file currently present, ignoring the ledger.
    pub fn messages<'a>(
        &'a self,
        account: &str,
    ) -> Result<impl Iterator<Item = MessageFile> + 'a, SourceError> {
        self.scan(account)
    }

    fn scan<'a>(
        &'a self,
        account: &str,
    ) -> Result<impl Iterator<Item = MessageFile> + 'a, SourceError> {
        if !self.has_account(account) {
            return Err(SourceError::DirectoryNotFound(self.account_dir(account)));
        }
        let dir = self.account_dir(account);

        let account = account.to_string();
        Ok(WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1) // Only the account directory itself, no sub-folders
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable directory entry: {}", e);
                    None
                }
            })
            .filter_map(move |entry| self.to_message(&account, entry)))
    }

    fn to_message(&self, account: &str, entry: DirEntry) -> Option<MessageFile> {
        let path = entry.path();
        if !path.is_file() {
            return None;
        }

        let Some(name) = entry.file_name().to_str() else {
            warn!("Skipping message with non UTF-8 file name: {}", path.display());
            return None;
        };
        if !self.pattern.matches(name) {
            return None;
        }
        if name.contains(&['\n', '\r'][..]) {
            warn!("Skipping message with line break in its name: {}", path.display());
            return None;
        }

        debug!("Found message: {}", path.display());
        Some(MessageFile {
            id: format!("{}/{}", account, name),
            path: entry.into_path(),
        })
    }
}

/// Rejects identifiers such as `..` or `a/b` that would leave the backup root.
fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
