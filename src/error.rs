//! Error types for the dataset loader
//!
//! Covers configuration, on-disk file, timestamp-alignment, and decode
//! errors. Everything here is fatal: nothing is retried internally.

use thiserror::Error;

/// Primary error type for all loader operations
#[derive(Debug, Error)]
pub enum LoaderError {
    // ========== Configuration Errors ==========

    /// Invalid or incompatible construction options
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    // ========== File Errors ==========

    /// Expected shard/video/side-car file is absent
    #[error("missing file: {path}")]
    MissingFile { path: String },

    /// Tabular shard failed header or checksum validation
    #[error("corrupt tabular shard {path}: {detail}")]
    ShardCorrupt { path: String, detail: String },

    // ========== Sync Errors ==========

    /// Remote sync collaborator could not produce the missing files
    #[error("remote sync failed: {detail}")]
    SyncFailed { detail: String },

    // ========== Alignment Errors ==========

    /// Cross-modality timestamp misalignment beyond tolerance
    #[error(
        "timestamp sync violation in episode {episode_index} at row {row}: \
         expected step {expected:.6}s, got {actual:.6}s"
    )]
    TimestampSync {
        episode_index: u32,
        row: u32,
        expected: f64,
        actual: f64,
    },

    // ========== Decode Errors ==========

    /// Frame requested past the episode's frame count
    #[error("decoder exhausted for episode {episode_index} at local frame {frame}")]
    DecodeExhausted { episode_index: u32, frame: u32 },

    /// Decode collaborator reported a failure
    #[error("video decode failed: {detail}")]
    Decode { detail: String },
}

impl LoaderError {
    /// Shorthand for a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        LoaderError::Config {
            reason: reason.into(),
        }
    }

    /// Shorthand for a missing-file error
    pub fn missing(path: &std::path::Path) -> Self {
        LoaderError::MissingFile {
            path: path.display().to_string(),
        }
    }

    /// Returns true if this error was detected during construction validation
    pub fn is_config(&self) -> bool {
        matches!(self, LoaderError::Config { .. })
    }

    /// Returns true if this error can be resolved by fetching files
    pub fn is_missing_file(&self) -> bool {
        matches!(self, LoaderError::MissingFile { .. })
    }
}

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;
