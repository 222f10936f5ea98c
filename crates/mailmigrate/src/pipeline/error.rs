use std::path::PathBuf;

use thiserror::Error;

use crate::email::EmailError;

/// Why a single message was skipped. None of these stop the batch.
#[derive(Error, Debug)]
pub enum MessageFailure {
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    DateExtraction(#[source] EmailError),

    #[error("Append failed: {0}")]
    Append(#[source] EmailError),
}

/// Failure to obtain a mailbox session; abandons the account's remaining batches.
#[derive(Error, Debug)]
#[error("Session for '{account}' failed: {source}")]
pub struct SessionError {
    pub account: String,
    #[source]
    pub source: EmailError,
}
