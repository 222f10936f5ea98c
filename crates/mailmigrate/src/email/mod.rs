//! Destination mailbox access.
//!
//! This module provides the mailbox client seam used by the uploader, its
//! IMAP implementation, and extraction of the internal date from raw messages.

pub mod client;
pub mod error;
pub mod parser;
pub mod session;

pub use client::{ImapConnector, ImapSession};
pub use error::EmailError;
pub use parser::{InternalDate, MailParserMetadataReader, MetadataReader};
pub use session::{MailboxConnector, MailboxSession};
