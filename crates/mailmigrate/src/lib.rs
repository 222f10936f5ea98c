pub mod config;
pub mod coordinator;
pub mod email;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod source;
pub mod worker;

pub use config::{load_accounts, load_config, Account, AccountList, MigrationConfig};
pub use coordinator::{MigrationCoordinator, MigrationPlan, MigrationSummary};
pub use email::{ImapConnector, MailParserMetadataReader};
pub use error::{ConfigError, LedgerError, MigrateError, Result, SourceError, WorkerError};
pub use ledger::Ledger;
pub use pipeline::{ProgressMode, ProgressReporter};
pub use source::{MessageFile, MessageSource};
