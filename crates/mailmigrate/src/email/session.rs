//! Mailbox client seam.
//!
//! The uploader only talks to these traits; the IMAP implementation lives in
//! [`super::client`] and tests substitute in-memory fakes.

use async_trait::async_trait;

use crate::config::Account;

use super::error::Result;
use super::parser::InternalDate;

/// Opens authenticated sessions against destination mailboxes.
#[async_trait]
pub trait MailboxConnector: Send + Sync {
    /// Connects, logs in as `account` and selects `folder`.
    async fn connect(&self, account: &Account, folder: &str) -> Result<Box<dyn MailboxSession>>;
}

/// One authenticated connection with a selected folder.
#[async_trait]
pub trait MailboxSession: Send {
    async fn append(
        &mut self,
        folder: &str,
        flags: Option<&str>,
        internal_date: &InternalDate,
        content: &[u8],
    ) -> Result<()>;

    async fn logout(&mut self) -> Result<()>;
}
