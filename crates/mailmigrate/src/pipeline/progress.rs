use std::io::IsTerminal;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::coordinator::MigrationSummary;

/// Events emitted by the coordinator while a run progresses.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    RunStarted {
        accounts: usize,
        messages: usize,
    },
    AccountSkipped {
        account: String,
        reason: String,
    },
    AccountStarted {
        account: String,
        pending: usize,
    },
    BatchCompleted {
        account: String,
        imported: usize,
        failed: usize,
    },
    AccountFinished {
        account: String,
        migrated: bool,
        imported: usize,
        failed: usize,
    },
    RunFinished {
        summary: MigrationSummary,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// How progress is displayed; resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressMode {
    /// Progress bar when stderr is a terminal, log lines otherwise.
    #[default]
    Auto,
    Bar,
    Plain,
}

impl ProgressMode {
    /// Resolves `Auto` against the current stderr.
    pub fn resolve(self) -> ProgressMode {
        match self {
            ProgressMode::Auto if std::io::stderr().is_terminal() => ProgressMode::Bar,
            ProgressMode::Auto => ProgressMode::Plain,
            other => other,
        }
    }

    pub fn reporter(self) -> Box<dyn ProgressReporter> {
        match self.resolve() {
            ProgressMode::Bar => Box::new(InteractiveProgress::new()),
            _ => Box::new(PlainProgress),
        }
    }
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Reports progress as log lines, for non-interactive runs.
pub struct PlainProgress;

impl ProgressReporter for PlainProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { accounts, messages } => {
                info!("Migrating {} message(s) across {} account(s)", messages, accounts);
            }
            ProgressEvent::AccountSkipped { account, reason } => {
                warn!("Skipping account {}: {}", account, reason);
            }
            ProgressEvent::AccountStarted { account, pending } => {
                info!("Processing account {} ({} pending)", account, pending);
            }
            ProgressEvent::BatchCompleted {
                account,
                imported,
                failed,
            } => {
                info!("{}: batch imported {}, failed {}", account, imported, failed);
            }
            ProgressEvent::AccountFinished {
                account,
                migrated,
                imported,
                failed,
            } => {
                let state = if migrated { "fully migrated" } else { "pending" };
                info!(
                    "Account {} {} ({} imported, {} failed this run)",
                    account, state, imported, failed
                );
            }
            ProgressEvent::RunFinished { summary } => {
                info!(
                    "Run finished: {} imported, {} failed, {} account(s) still pending",
                    summary.messages_imported,
                    summary.messages_failed,
                    summary.accounts_pending()
                );
            }
        }
    }
}

/// Progress bar over the total number of messages to upload.
pub struct InteractiveProgress {
    bar: ProgressBar,
}

impl InteractiveProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar }
    }
}

impl Default for InteractiveProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for InteractiveProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { messages, .. } => {
                self.bar.set_length(messages as u64);
            }
            ProgressEvent::AccountSkipped { account, reason } => {
                self.bar.println(format!("skipped {}: {}", account, reason));
            }
            ProgressEvent::AccountStarted { account, .. } => {
                self.bar.set_message(account);
            }
            ProgressEvent::BatchCompleted {
                imported, failed, ..
            } => {
                self.bar.inc((imported + failed) as u64);
            }
            ProgressEvent::AccountFinished {
                account,
                migrated,
                imported,
                failed,
            } => {
                let state = if migrated { "done" } else { "pending" };
                self.bar.println(format!(
                    "{} {} ({} imported, {} failed)",
                    state, account, imported, failed
                ));
            }
            ProgressEvent::RunFinished { .. } => {
                self.bar.finish_and_clear();
            }
        }
    }
}
