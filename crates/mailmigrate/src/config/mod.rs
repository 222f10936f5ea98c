pub mod accounts;
pub mod loader;
pub mod schema;

pub use accounts::{load_accounts, parse_accounts, Account, AccountLineError, AccountList};
pub use loader::{default_config_path, load_config, load_config_from_str, validate_config};
pub use schema::{ImapSettings, LedgerSettings, MigrationConfig};
