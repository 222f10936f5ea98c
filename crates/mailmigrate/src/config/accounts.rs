//! Account credentials file.
//!
//! One account per line, `identifier:secret`. Every line is validated on its
//! own so a single malformed entry does not prevent the others from loading.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use log::{debug, warn};
use secrecy::{ExposeSecret, SecretString};

use crate::error::ConfigError;

/// A destination mailbox and the secret used to log into it.
pub struct Account {
    identifier: String,
    secret: SecretString,
}

impl Account {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: SecretString::from(secret.into()),
        }
    }

    /// Mailbox address, also the name of the account's archive directory.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn secret(&self) -> &str {
        self.secret.expose_secret()
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("identifier", &self.identifier)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// A rejected line of the accounts file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountLineError {
    /// 1-based line number.
    pub line: usize,
    pub reason: String,
}

impl fmt::Display for AccountLineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

/// Accounts that loaded successfully plus the lines that did not.
#[derive(Debug, Default)]
pub struct AccountList {
    pub accounts: Vec<Account>,
    pub errors: Vec<AccountLineError>,
}

pub fn load_accounts<P: AsRef<Path>>(path: P) -> Result<AccountList, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadAccounts {
        path: path.to_path_buf(),
        source: e,
    })?;

    let list = parse_accounts(&content);
    for error in &list.errors {
        warn!("Skipping account entry in {}: {}", path.display(), error);
    }
    debug!(
        "Loaded {} account(s) from {}",
        list.accounts.len(),
        path.display()
    );
    Ok(list)
}

pub fn parse_accounts(content: &str) -> AccountList {
    let mut list = AccountList::default();
    let mut seen = HashSet::new();

    for (index, raw) in content.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        // Only the first ':' separates the fields; secrets may contain more.
        let Some((identifier, secret)) = trimmed.split_once(':') else {
            list.errors.push(AccountLineError {
                line,
                reason: "expected 'identifier:secret'".to_string(),
            });
            continue;
        };

        let identifier = identifier.trim();
        let secret = secret.trim();
        if identifier.is_empty() {
            list.errors.push(AccountLineError {
                line,
                reason: "empty account identifier".to_string(),
            });
            continue;
        }
        if secret.is_empty() {
            list.errors.push(AccountLineError {
                line,
                reason: format!("empty secret for '{}'", identifier),
            });
            continue;
        }
        if !seen.insert(identifier.to_string()) {
            list.errors.push(AccountLineError {
                line,
                reason: format!("duplicate account '{}'", identifier),
            });
            continue;
        }

        list.accounts.push(Account::new(identifier, secret));
    }

    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_valid_lines() {
        let list = parse_accounts("a@x.com:secret\nb@x.com:pa:ss:word\n");

        assert!(list.errors.is_empty());
        assert_eq!(list.accounts.len(), 2);
        assert_eq!(list.accounts[0].identifier(), "a@x.com");
        assert_eq!(list.accounts[0].secret(), "secret");
        assert_eq!(list.accounts[1].secret(), "pa:ss:word");
    }

    #[test]
    fn test_malformed_lines_do_not_abort_loading() {
        let content = "a@x.com:one\nnot-an-entry\n:nopass\nc@x.com:\nd@x.com:four\n";
        let list = parse_accounts(content);

        let ids: Vec<&str> = list.accounts.iter().map(|a| a.identifier()).collect();
        assert_eq!(ids, vec!["a@x.com", "d@x.com"]);

        let lines: Vec<usize> = list.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![2, 3, 4]);
    }

    #[test]
    fn test_comments_blank_lines_and_duplicates() {
        let content = "# migrated from old host\n\na@x.com:one\n  \na@x.com:two\n";
        let list = parse_accounts(content);

        assert_eq!(list.accounts.len(), 1);
        assert_eq!(list.accounts[0].secret(), "one");
        assert_eq!(list.errors.len(), 1);
        assert_eq!(list.errors[0].line, 5);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let account = Account::new("a@x.com", "hunter2");
        let debug = format!("{:?}", account);
        assert!(debug.contains("a@x.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_accounts(temp_dir.path().join("nope.txt"));
        assert!(matches!(result, Err(ConfigError::ReadAccounts { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("accounts.txt");
        std::fs::write(&path, "a@x.com:one\r\nb@x.com:two\r\n").unwrap();

        let list = load_accounts(&path).unwrap();
        assert_eq!(list.accounts.len(), 2);
        assert_eq!(list.accounts[1].secret(), "two");
    }
}
