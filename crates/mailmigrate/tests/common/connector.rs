//! In-memory stand-in for an IMAP server.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mailmigrate::config::Account;
use mailmigrate::email::{EmailError, InternalDate, MailboxConnector, MailboxSession};

/// One accepted append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Append {
    pub account: String,
    pub folder: String,
    pub internal_date: String,
    pub content: String,
}

#[derive(Debug, Default)]
struct Recorded {
    sessions: Vec<String>,
    appends: Vec<Append>,
    logouts: usize,
}

/// Accepts everything unless told otherwise; clones share the same recording.
#[derive(Clone, Default)]
pub struct RecordingConnector {
    recorded: Arc<Mutex<Recorded>>,
    rejected_logins: Arc<HashSet<String>>,
    rejected_content: Arc<Vec<String>>,
    /// File written to disk when the first session opens.
    late_arrival: Arc<Mutex<Option<(PathBuf, Vec<u8>)>>>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logins for `account` fail with an authentication error.
    pub fn reject_login(mut self, account: &str) -> Self {
        let mut rejected = (*self.rejected_logins).clone();
        rejected.insert(account.to_string());
        self.rejected_logins = Arc::new(rejected);
        self
    }

    /// Appends whose content contains `needle` are refused by the server.
    pub fn reject_content(mut self, needle: &str) -> Self {
        let mut rejected = (*self.rejected_content).clone();
        rejected.push(needle.to_string());
        self.rejected_content = Arc::new(rejected);
        self
    }

    /// Writes `content` to `path` while the first session is being opened.
    pub fn write_on_first_connect(self, path: PathBuf, content: &[u8]) -> Self {
        *self.late_arrival.lock().unwrap() = Some((path, content.to_vec()));
        self
    }

    pub fn sessions(&self) -> Vec<String> {
        self.recorded.lock().unwrap().sessions.clone()
    }

    pub fn sessions_for(&self, account: &str) -> usize {
        self.sessions().iter().filter(|a| a.as_str() == account).count()
    }

    pub fn appends(&self) -> Vec<Append> {
        self.recorded.lock().unwrap().appends.clone()
    }

    pub fn appends_for(&self, account: &str) -> Vec<Append> {
        self.appends()
            .into_iter()
            .filter(|append| append.account == account)
            .collect()
    }

    pub fn logouts(&self) -> usize {
        self.recorded.lock().unwrap().logouts
    }
}

#[async_trait]
impl MailboxConnector for RecordingConnector {
    async fn connect(
        &self,
        account: &Account,
        _folder: &str,
    ) -> Result<Box<dyn MailboxSession>, EmailError> {
        let late = self.late_arrival.lock().unwrap().take();
        if let Some((path, content)) = late {
            std::fs::write(path, content).map_err(|e| EmailError::ProtocolError(e.to_string()))?;
        }

        self.recorded
            .lock()
            .unwrap()
            .sessions
            .push(account.identifier().to_string());

        if self.rejected_logins.contains(account.identifier()) {
            return Err(EmailError::AuthenticationFailed(format!(
                "invalid credentials for {}",
                account.identifier()
            )));
        }

        Ok(Box::new(RecordingSession {
            account: account.identifier().to_string(),
            connector: self.clone(),
        }))
    }
}

struct RecordingSession {
    account: String,
    connector: RecordingConnector,
}

#[async_trait]
impl MailboxSession for RecordingSession {
    async fn append(
        &mut self,
        folder: &str,
        _flags: Option<&str>,
        internal_date: &InternalDate,
        content: &[u8],
    ) -> Result<(), EmailError> {
        let content = String::from_utf8_lossy(content).to_string();
        if self
            .connector
            .rejected_content
            .iter()
            .any(|needle| content.contains(needle.as_str()))
        {
            return Err(EmailError::AppendRejected("NO message rejected".to_string()));
        }

        self.connector.recorded.lock().unwrap().appends.push(Append {
            account: self.account.clone(),
            folder: folder.to_string(),
            internal_date: internal_date.to_imap(),
            content,
        });
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), EmailError> {
        self.connector.recorded.lock().unwrap().logouts += 1;
        Ok(())
    }
}
