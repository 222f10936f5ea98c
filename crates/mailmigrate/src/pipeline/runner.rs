use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::Account;
use crate::email::{EmailError, MailboxConnector, MailboxSession, MetadataReader};
use crate::source::MessageFile;
use crate::worker::job::{AccountOutcome, BatchReport, FailedMessage};

use super::config::UploadConfig;
use super::error::{MessageFailure, SessionError};

/// Uploads one account's remaining messages in fixed-size batches, one
/// mailbox session per batch.
pub struct BatchUploader {
    config: Arc<UploadConfig>,
    connector: Arc<dyn MailboxConnector>,
    reader: Arc<dyn MetadataReader>,
}

impl BatchUploader {
    pub fn new(
        config: Arc<UploadConfig>,
        connector: Arc<dyn MailboxConnector>,
        reader: Arc<dyn MetadataReader>,
    ) -> Self {
        Self {
            config,
            connector,
            reader,
        }
    }

    /// Uploads `messages` for `account`.
    ///
    /// `on_batch` is invoked after every batch that obtained a session, so
    /// its successes can be persisted before the next batch starts. `abort`
    /// is checked before each batch.
    pub async fn upload<F>(
        &self,
        account: &Account,
        messages: Vec<MessageFile>,
        abort: &AtomicBool,
        on_batch: F,
    ) -> AccountOutcome
    where
        F: FnMut(BatchReport),
    {
        let span = info_span!("upload", account = %account.identifier(), messages = messages.len());
        self.run(account, messages, abort, on_batch)
            .instrument(span)
            .await
    }

    async fn run<F>(
        &self,
        account: &Account,
        messages: Vec<MessageFile>,
        abort: &AtomicBool,
        mut on_batch: F,
    ) -> AccountOutcome
    where
        F: FnMut(BatchReport),
    {
        let mut outcome = AccountOutcome::new(account.identifier());
        if messages.is_empty() {
            debug!("Nothing to upload");
            return outcome;
        }

        // A zero batch size would make chunks() panic.
        let batch_size = self.config.batch_size.max(1);
        let total = messages.len();
        let mut attempted = 0;

        for (index, batch) in messages.chunks(batch_size).enumerate() {
            if abort.load(Ordering::Relaxed) {
                warn!("Run aborted, leaving {} message(s) for the next run", total - attempted);
                outcome.aborted = true;
                break;
            }

            let mut session = match self.open_session(account).await {
                Ok(session) => session,
                Err(e) => {
                    error!(
                        "{}; abandoning {} remaining message(s) in this pass",
                        e,
                        total - attempted
                    );
                    outcome.session_error = Some(e.to_string());
                    break;
                }
            };

            let report = self
                .upload_batch(account, index, batch, session.as_mut())
                .await;
            attempted += batch.len();

            if let Err(e) = session.logout().await {
                warn!("Logout after batch {} failed: {}", index + 1, e);
            }

            info!(
                "Batch {} done: {} imported, {} failed",
                index + 1,
                report.imported.len(),
                report.failed.len()
            );
            outcome.absorb(&report);
            on_batch(report);
        }

        outcome.not_attempted = total - attempted;
        outcome
    }

    async fn open_session(&self, account: &Account) -> Result<Box<dyn MailboxSession>, SessionError> {
        let connect = self.connector.connect(account, &self.config.folder);
        let result = match tokio::time::timeout(self.config.session_timeout, connect).await {
            Ok(result) => result,
            Err(_) => Err(EmailError::Timeout(format!(
                "opening session took longer than {:?}",
                self.config.session_timeout
            ))),
        };

        result.map_err(|source| SessionError {
            account: account.identifier().to_string(),
            source,
        })
    }

    async fn upload_batch(
        &self,
        account: &Account,
        index: usize,
        batch: &[MessageFile],
        session: &mut dyn MailboxSession,
    ) -> BatchReport {
        let mut report = BatchReport {
            account: account.identifier().to_string(),
            index,
            ..BatchReport::default()
        };

        for message in batch {
            match self.upload_message(message, session).await {
                Ok(()) => {
                    info!("Imported {}", message.id);
                    report.imported.push(message.id.clone());
                }
                Err(failure) => {
                    error!("Failed to import {}: {}", message.id, failure);
                    report.failed.push(FailedMessage {
                        id: message.id.clone(),
                        failure,
                    });
                }
            }
        }

        report
    }

    async fn upload_message(
        &self,
        message: &MessageFile,
        session: &mut dyn MailboxSession,
    ) -> Result<(), MessageFailure> {
        let content = tokio::fs::read(&message.path)
            .await
            .map_err(|e| MessageFailure::Read {
                path: message.path.clone(),
                source: e,
            })?;

        let internal_date = self
            .reader
            .internal_date(&content)
            .map_err(MessageFailure::DateExtraction)?;

        let append = session.append(&self.config.folder, None, &internal_date, &content);
        match tokio::time::timeout(self.config.append_timeout, append).await {
            Ok(result) => result.map_err(MessageFailure::Append),
            Err(_) => Err(MessageFailure::Append(EmailError::Timeout(format!(
                "append took longer than {:?}",
                self.config.append_timeout
            )))),
        }
    }
}
