//! Remote dataset synchronization collaborator
//!
//! Selective download, decryption, and license gating live outside this
//! crate. The loader only ever asks the collaborator to materialize a list
//! of missing files, at most once per construction.

use std::path::{Path, PathBuf};

use crate::error::{LoaderError, Result};

/// External sync collaborator interface
pub trait RemoteSync {
    /// Fetch the given files (absolute paths under `root`) so they exist
    /// locally, or fail. The loader re-checks existence afterwards and
    /// never calls this twice per construction.
    fn fetch(&self, root: &Path, missing: &[PathBuf]) -> Result<()>;
}

/// Collaborator for strictly local datasets: any fetch attempt fails
pub struct NoRemote;

impl RemoteSync for NoRemote {
    fn fetch(&self, _root: &Path, missing: &[PathBuf]) -> Result<()> {
        Err(LoaderError::SyncFailed {
            detail: format!(
                "no remote configured, {} file(s) missing locally",
                missing.len()
            ),
        })
    }
}
