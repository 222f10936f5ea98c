//! Shared test utilities for mailmigrate integration tests.
//!
//! This module provides:
//! - `MigrationHarness` for building a throwaway archive and running the coordinator
//! - `RecordingConnector`, an in-memory mailbox server that records every call

pub mod connector;
pub mod harness;

pub use connector::{Append, RecordingConnector};
pub use harness::MigrationHarness;
