pub mod config;
pub mod error;
pub mod progress;
pub mod runner;

pub use config::UploadConfig;
pub use error::{MessageFailure, SessionError};
pub use progress::{
    InteractiveProgress, NoopProgress, PlainProgress, ProgressEvent, ProgressMode,
    ProgressReporter,
};
pub use runner::BatchUploader;
