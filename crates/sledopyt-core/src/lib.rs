pub mod error;
pub mod types;

// Re-export commonly used items
pub use error::{Result, ScanError};
pub use types::{
    GameRelease, LogMetadata, LogReport, LogStatus, PluginEntry, ScanStats, UNKNOWN,
};
