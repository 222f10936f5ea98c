//! Run orchestration.
//!
//! The coordinator decides which accounts need work, hands one job per
//! account to the worker pool and is the only writer of the ledger. Batch
//! results are recorded as they arrive, so a crash loses at most the batches
//! still in flight.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info, info_span, warn};

use crate::config::{Account, MigrationConfig};
use crate::email::{MailboxConnector, MetadataReader};
use crate::error::{LedgerError, Result};
use crate::ledger::Ledger;
use crate::pipeline::{BatchUploader, ProgressEvent, ProgressReporter};
use crate::source::{MessageFile, MessageSource};
use crate::worker::{AccountJob, AccountOutcome, BatchReport, WorkerEvent, WorkerPool};

/// Totals reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    /// Accounts dispatched to the worker pool.
    pub accounts_attempted: usize,
    /// Accounts whose directory is missing.
    pub accounts_skipped: usize,
    /// Accounts skipped because the ledger marks them migrated.
    pub accounts_already_migrated: usize,
    /// Attempted accounts marked migrated by this run.
    pub accounts_fully_migrated: usize,
    /// Attempted accounts that hit a session or unexpected failure.
    pub accounts_failed: usize,
    pub messages_imported: usize,
    pub messages_failed: usize,
    /// Messages found pending at start that were not imported.
    pub messages_remaining: usize,
}

impl MigrationSummary {
    /// Attempted accounts still eligible for the next run.
    pub fn accounts_pending(&self) -> usize {
        self.accounts_attempted
            .saturating_sub(self.accounts_fully_migrated)
    }

    pub fn all_migrated(&self) -> bool {
        self.accounts_pending() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAccount {
    pub account: String,
    /// Matching files not yet in the imported ledger.
    pub pending: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAccount {
    pub account: String,
    pub reason: String,
}

/// Work list derived from the accounts, the ledger and the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    pub work: Vec<PlannedAccount>,
    pub skipped: Vec<SkippedAccount>,
    pub already_migrated: Vec<String>,
}

impl MigrationPlan {
    pub fn total_pending(&self) -> usize {
        self.work.iter().map(|entry| entry.pending).sum()
    }
}

pub struct MigrationCoordinator {
    config: MigrationConfig,
    ledger: Ledger,
    source: Arc<MessageSource>,
    uploader: Arc<BatchUploader>,
    progress: Box<dyn ProgressReporter>,
}

impl MigrationCoordinator {
    /// Builds a coordinator, opening the ledger files named by `config`.
    pub fn new(
        config: MigrationConfig,
        connector: Arc<dyn MailboxConnector>,
        reader: Arc<dyn MetadataReader>,
        progress: Box<dyn ProgressReporter>,
    ) -> Result<Self> {
        let ledger = Ledger::open(config.imported_ledger_path(), config.migrated_ledger_path())?;
        Self::with_ledger(config, ledger, connector, reader, progress)
    }

    pub fn with_ledger(
        config: MigrationConfig,
        ledger: Ledger,
        connector: Arc<dyn MailboxConnector>,
        reader: Arc<dyn MetadataReader>,
        progress: Box<dyn ProgressReporter>,
    ) -> Result<Self> {
        let source = MessageSource::new(&config.backup_directory, &config.message_pattern)?;
        let uploader = BatchUploader::new(Arc::new(config.upload_config()), connector, reader);

        Ok(Self {
            config,
            ledger,
            source: Arc::new(source),
            uploader: Arc::new(uploader),
            progress,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Classifies `accounts` without opening sessions or writing the ledger.
    pub fn plan(&self, accounts: &[Account]) -> Result<MigrationPlan> {
        let imported = self.ledger.imported_snapshot()?;
        let mut plan = MigrationPlan::default();

        for account in accounts {
            let id = account.identifier();

            if self.ledger.is_migrated(id)? {
                debug!("Account {} already migrated", id);
                plan.already_migrated.push(id.to_string());
                continue;
            }

            match self.source.pending(id, &imported) {
                Ok(pending) => plan.work.push(PlannedAccount {
                    account: id.to_string(),
                    pending: pending.count(),
                }),
                Err(e) => {
                    debug!("Account {} not runnable: {}", id, e);
                    plan.skipped.push(SkippedAccount {
                        account: id.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(plan)
    }

    /// Migrates every eligible account.
    ///
    /// Per-message and per-account failures are counted in the summary.
    /// Only a ledger failure aborts the run and is returned as an error.
    pub fn run(&self, accounts: Vec<Account>) -> Result<MigrationSummary> {
        let span = info_span!("migration", accounts = accounts.len());
        let _guard = span.enter();

        let plan = self.plan(&accounts)?;
        let mut summary = MigrationSummary {
            accounts_attempted: plan.work.len(),
            accounts_skipped: plan.skipped.len(),
            accounts_already_migrated: plan.already_migrated.len(),
            ..MigrationSummary::default()
        };
        let total_pending = plan.total_pending();

        self.progress.report(ProgressEvent::RunStarted {
            accounts: plan.work.len(),
            messages: total_pending,
        });
        for skipped in &plan.skipped {
            self.progress.report(ProgressEvent::AccountSkipped {
                account: skipped.account.clone(),
                reason: skipped.reason.clone(),
            });
        }
        for account in &plan.already_migrated {
            self.progress.report(ProgressEvent::AccountSkipped {
                account: account.clone(),
                reason: "already migrated".to_string(),
            });
        }

        let work: HashSet<&str> = plan.work.iter().map(|entry| entry.account.as_str()).collect();
        let imported = Arc::new(self.ledger.imported_snapshot()?);
        let jobs: Vec<AccountJob> = accounts
            .into_iter()
            .filter(|account| work.contains(account.identifier()))
            .map(|account| AccountJob::new(Arc::new(account), Arc::clone(&imported)))
            .collect();

        if !jobs.is_empty() {
            info!(
                "Migrating {} message(s) for {} account(s)",
                total_pending,
                jobs.len()
            );
            self.dispatch(jobs, &mut summary)?;
        } else {
            info!("No accounts to migrate");
        }

        summary.messages_remaining = total_pending.saturating_sub(summary.messages_imported);
        info!(
            "Migration finished: {} imported, {} failed, {} of {} account(s) fully migrated",
            summary.messages_imported,
            summary.messages_failed,
            summary.accounts_fully_migrated,
            summary.accounts_attempted
        );
        self.progress.report(ProgressEvent::RunFinished {
            summary: summary.clone(),
        });

        Ok(summary)
    }

    fn dispatch(&self, jobs: Vec<AccountJob>, summary: &mut MigrationSummary) -> Result<()> {
        let worker_count = self.config.worker_count.min(jobs.len()).max(1);
        let pool = WorkerPool::new(Arc::clone(&self.source), Arc::clone(&self.uploader), worker_count)?;
        let expected = jobs.len();
        let mut fatal: Option<LedgerError> = None;

        thread::scope(|scope| {
            let pool = &pool;
            // Feeding from a separate thread keeps events flowing while the
            // bounded job queue is full.
            scope.spawn(move || {
                for job in jobs {
                    if let Err(e) = pool.submit(job) {
                        debug!("Stopped dispatching accounts: {}", e);
                        break;
                    }
                }
            });

            let mut finished = 0;
            while finished < expected {
                let Some(event) = pool.recv_event() else {
                    break;
                };

                match event {
                    WorkerEvent::AccountStarted { account, pending } => {
                        self.progress
                            .report(ProgressEvent::AccountStarted { account, pending });
                    }
                    WorkerEvent::BatchCompleted(report) => {
                        summary.messages_failed += report.failed.len();
                        if fatal.is_none() {
                            match self.record_batch(&report) {
                                Ok(recorded) => summary.messages_imported += recorded,
                                Err(e) => {
                                    error!("Ledger write failed, aborting run: {}", e);
                                    fatal = Some(e);
                                    pool.abort();
                                }
                            }
                        }
                        self.progress.report(ProgressEvent::BatchCompleted {
                            account: report.account.clone(),
                            imported: report.imported.len(),
                            failed: report.failed.len(),
                        });
                    }
                    WorkerEvent::AccountFinished(outcome) => {
                        finished += 1;
                        match self.finish_account(&outcome, fatal.is_some()) {
                            Ok(migrated) => {
                                if migrated {
                                    summary.accounts_fully_migrated += 1;
                                }
                                if outcome.session_error.is_some() || outcome.unexpected.is_some() {
                                    summary.accounts_failed += 1;
                                }
                                self.progress.report(ProgressEvent::AccountFinished {
                                    account: outcome.account.clone(),
                                    migrated,
                                    imported: outcome.imported.len(),
                                    failed: outcome.failed,
                                });
                            }
                            Err(e) => {
                                error!("Ledger write failed, aborting run: {}", e);
                                fatal = Some(e);
                                pool.abort();
                            }
                        }
                    }
                }
            }
        });

        pool.wait();

        match fatal {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Writes the batch's successes to the ledger, returning how many were new.
    fn record_batch(&self, report: &BatchReport) -> std::result::Result<usize, LedgerError> {
        let mut recorded = 0;
        for id in &report.imported {
            if self.ledger.record_imported(id)? {
                recorded += 1;
            } else {
                warn!("{} was already in the ledger", id);
            }
        }
        Ok(recorded)
    }

    /// Marks the account migrated when every file now in its directory is in
    /// the imported ledger.
    fn finish_account(
        &self,
        outcome: &AccountOutcome,
        run_aborted: bool,
    ) -> std::result::Result<bool, LedgerError> {
        let account = outcome.account.as_str();

        if let Some(reason) = &outcome.unexpected {
            error!("Account {} failed unexpectedly: {}", account, reason);
            return Ok(false);
        }
        if run_aborted || outcome.aborted {
            return Ok(false);
        }

        let messages = match self.source.messages(account) {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Cannot recount messages for {}: {}", account, e);
                return Ok(false);
            }
        };
        let (imported, total) = self.recount(messages)?;

        if imported != total {
            info!(
                "Account {} has {} of {} message(s) imported, leaving it pending",
                account, imported, total
            );
            return Ok(false);
        }

        if self.ledger.record_migrated(account)? {
            info!("Account {} fully migrated ({} message(s))", account, total);
        }
        Ok(true)
    }

    /// Returns (imported, present) for the account's current files.
    fn recount(
        &self,
        messages: impl Iterator<Item = MessageFile>,
    ) -> std::result::Result<(usize, usize), LedgerError> {
        let mut imported = 0;
        let mut total = 0;
        for message in messages {
            total += 1;
            if self.ledger.is_imported(&message.id)? {
                imported += 1;
            }
        }
        Ok((imported, total))
    }
}
