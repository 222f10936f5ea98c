use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Account;
use crate::pipeline::MessageFailure;

/// One account's upload pass, handed to a worker.
#[derive(Debug)]
pub struct AccountJob {
    pub account: Arc<Account>,
    /// Identifiers already in the ledger when the run started.
    pub imported: Arc<HashSet<String>>,
}

impl AccountJob {
    pub fn new(account: Arc<Account>, imported: Arc<HashSet<String>>) -> Self {
        Self { account, imported }
    }

    pub fn account_id(&self) -> &str {
        self.account.identifier()
    }
}

#[derive(Debug)]
pub struct FailedMessage {
    pub id: String,
    pub failure: MessageFailure,
}

/// What one batch (one mailbox session) achieved.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub account: String,
    /// 0-based position of the batch within the account's pass.
    pub index: usize,
    pub imported: Vec<String>,
    pub failed: Vec<FailedMessage>,
}

/// Result of one account's upload pass.
#[derive(Debug, Default)]
pub struct AccountOutcome {
    pub account: String,
    /// Every identifier appended during this pass, in upload order.
    pub imported: Vec<String>,
    /// Messages attempted but skipped (read, date or append failure).
    pub failed: usize,
    /// Messages never attempted because the session failed or the run aborted.
    pub not_attempted: usize,
    pub session_error: Option<String>,
    pub aborted: bool,
    /// Failure that escaped the uploader (error or panic).
    pub unexpected: Option<String>,
}

impl AccountOutcome {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            ..Self::default()
        }
    }

    pub fn unexpected(account: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            unexpected: Some(reason.into()),
            ..Self::default()
        }
    }

    /// True when every message handed to the uploader was appended.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
            && self.not_attempted == 0
            && self.session_error.is_none()
            && !self.aborted
            && self.unexpected.is_none()
    }

    pub(crate) fn absorb(&mut self, report: &BatchReport) {
        self.imported.extend(report.imported.iter().cloned());
        self.failed += report.failed.len();
    }
}

/// Messages sent from workers back to the coordinator.
#[derive(Debug)]
pub enum WorkerEvent {
    AccountStarted {
        account: String,
        pending: usize,
    },
    BatchCompleted(BatchReport),
    AccountFinished(AccountOutcome),
}
