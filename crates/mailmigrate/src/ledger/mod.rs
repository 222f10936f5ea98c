//! Durable migration progress.
//!
//! The ledger keeps two append-only text files, one identifier per line:
//! message identifiers confirmed appended to their destination mailbox, and
//! accounts whose whole archive has been migrated. It is the only source of
//! truth for skipping work on later runs.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::error::LedgerError;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Imported-message and migrated-account sets backed by append-only files.
///
/// All writes go through a per-file mutex, so a `Ledger` can be shared by
/// `Arc` between threads without interleaving lines.
pub struct Ledger {
    imported: AppendOnlySet,
    migrated: AppendOnlySet,
}

impl Ledger {
    /// Loads both ledger files. A missing file is an empty set.
    pub fn open(imported_path: impl Into<PathBuf>, migrated_path: impl Into<PathBuf>) -> Result<Self> {
        let imported = AppendOnlySet::load(imported_path.into())?;
        let migrated = AppendOnlySet::load(migrated_path.into())?;

        info!(
            "Ledger loaded: {} imported message(s), {} migrated account(s)",
            imported.len()?,
            migrated.len()?
        );

        Ok(Self { imported, migrated })
    }

    pub fn is_imported(&self, message_id: &str) -> Result<bool> {
        self.imported.contains(message_id)
    }

    pub fn is_migrated(&self, account: &str) -> Result<bool> {
        self.migrated.contains(account)
    }

    /// Copy of the imported set, used as a worker's skip set.
    pub fn imported_snapshot(&self) -> Result<HashSet<String>> {
        self.imported.snapshot()
    }

    /// Durably records an appended message. Returns `false` if it was
    /// already present, in which case nothing is written.
    pub fn record_imported(&self, message_id: &str) -> Result<bool> {
        self.imported.insert(message_id)
    }

    /// Durably records a fully migrated account. Returns `false` if it was
    /// already present.
    pub fn record_migrated(&self, account: &str) -> Result<bool> {
        self.migrated.insert(account)
    }

    pub fn imported_path(&self) -> &Path {
        &self.imported.path
    }

    pub fn migrated_path(&self) -> &Path {
        &self.migrated.path
    }
}

struct AppendOnlySet {
    path: PathBuf,
    state: Mutex<SetState>,
}

struct SetState {
    entries: HashSet<String>,
    writer: Option<File>,
    /// The file does not end with a newline, e.g. after an interrupted write.
    unterminated: bool,
}

impl AppendOnlySet {
    fn load(path: PathBuf) -> Result<Self> {
        let (entries, unterminated) = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let entries = content
                    .lines()
                    .map(|line| line.trim_end_matches('\r'))
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect();
                (entries, !content.is_empty() && !content.ends_with('\n'))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Ledger file {} does not exist yet", path.display());
                (HashSet::new(), false)
            }
            Err(e) => return Err(LedgerError::Read { path, source: e }),
        };

        if unterminated {
            warn!(
                "Ledger file {} ends without a newline, the next entry starts a new line",
                path.display()
            );
        }

        Ok(Self {
            path,
            state: Mutex::new(SetState {
                entries,
                writer: None,
                unterminated,
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, SetState>> {
        self.state
            .lock()
            .map_err(|_| LedgerError::Poisoned(self.path.clone()))
    }

    fn contains(&self, entry: &str) -> Result<bool> {
        Ok(self.lock()?.entries.contains(entry))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.lock()?.entries.len())
    }

    fn snapshot(&self) -> Result<HashSet<String>> {
        Ok(self.lock()?.entries.clone())
    }

    fn insert(&self, entry: &str) -> Result<bool> {
        let mut state = self.lock()?;
        if state.entries.contains(entry) {
            return Ok(false);
        }

        let line = if state.unterminated {
            format!("\n{}\n", entry)
        } else {
            format!("{}\n", entry)
        };

        let writer = match state.writer.take() {
            Some(writer) => writer,
            None => self.open_writer()?,
        };
        let written = (&writer)
            .write_all(line.as_bytes())
            .and_then(|()| writer.sync_data());
        if let Err(source) = written {
            // Part of the line may have reached the file; reopen and start
            // a fresh line on the next attempt.
            state.unterminated = true;
            return Err(LedgerError::Write {
                path: self.path.clone(),
                entry: entry.to_string(),
                source,
            });
        }
        state.writer = Some(writer);
        state.unterminated = false;

        // Only remembered once it is on disk.
        state.entries.insert(entry.to_string());
        Ok(true)
    }

    fn open_writer(&self) -> Result<File> {
        let open_err = |source| LedgerError::Open {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(open_err)?;
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(open_err)
    }
}
