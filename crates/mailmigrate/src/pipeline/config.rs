use std::time::Duration;

/// Settings shared by every account's upload pass.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Destination folder selected and appended to.
    pub folder: String,
    /// Maximum number of messages uploaded over one session.
    pub batch_size: usize,
    /// Bound on opening, authenticating and selecting a session.
    pub session_timeout: Duration,
    /// Bound on a single APPEND.
    pub append_timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            folder: "INBOX".to_string(),
            batch_size: 100,
            session_timeout: Duration::from_secs(60),
            append_timeout: Duration::from_secs(120),
        }
    }
}
