//! Construction configuration for [`EpisodeDataset`](crate::EpisodeDataset)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::{LoaderError, Result};
use crate::meta::layout::Modality;
use crate::{DEFAULT_CHUNK_SIZE, DEFAULT_SEED, DEFAULT_TIMESTAMP_TOLERANCE_S};

/// Dataset construction options
///
/// Validation happens before any file I/O: incompatible combinations fail
/// with a configuration error, never with a partially constructed dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Task names to load. `None` loads every task in the registry.
    pub tasks: Option<Vec<String>>,
    /// Modalities to decode
    pub modalities: Vec<Modality>,
    /// Camera names to decode. `None` loads every declared camera.
    pub cameras: Option<Vec<String>>,
    /// Per-task local episode indices (applied after sorting each task's
    /// episodes ascending by id). `None` loads every episode of each task.
    pub episodes_per_task: Option<Vec<usize>>,
    /// Stream records in GOP-aligned chunks instead of random access
    pub chunk_streaming: bool,
    /// Chunk size in frames; must equal the GOP size of the video data
    pub chunk_size: u32,
    /// Shuffle chunk order per worker (chunk-streaming mode only)
    pub shuffle: bool,
    /// Base shuffle seed; the worker id is folded in at seeding time
    pub seed: u64,
    /// Named temporal-offset groups in seconds, converted to frame offsets
    /// at the dataset frame rate during construction
    pub delta_windows: BTreeMap<String, Vec<f64>>,
    /// Tolerance for timestamp alignment checks, in seconds
    pub timestamp_tolerance_s: f64,
    /// Verify per-episode timestamp spacing against the frame rate
    pub check_timestamp_sync: bool,
    /// Never invoke the remote sync collaborator, even for missing files
    pub local_only: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            tasks: None,
            modalities: Modality::ALL.to_vec(),
            cameras: None,
            episodes_per_task: None,
            chunk_streaming: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            shuffle: true,
            seed: DEFAULT_SEED,
            delta_windows: BTreeMap::new(),
            timestamp_tolerance_s: DEFAULT_TIMESTAMP_TOLERANCE_S,
            check_timestamp_sync: true,
            local_only: false,
        }
    }
}

impl DatasetConfig {
    /// Validate option compatibility. Called first during dataset
    /// construction, before any file is touched.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(LoaderError::config("chunk_size must be non-zero"));
        }
        if self.timestamp_tolerance_s <= 0.0 {
            return Err(LoaderError::config(
                "timestamp_tolerance_s must be positive",
            ));
        }
        for (i, m) in self.modalities.iter().enumerate() {
            if self.modalities[..i].contains(m) {
                return Err(LoaderError::config(format!("duplicate modality {m}")));
            }
            if m.requires_chunk_streaming() && !self.chunk_streaming {
                return Err(LoaderError::config(format!(
                    "modality {m} is only decodable from keyframe boundaries \
                     and requires chunk_streaming"
                )));
            }
        }
        if let Some(cameras) = &self.cameras {
            for (i, c) in cameras.iter().enumerate() {
                if cameras[..i].contains(c) {
                    return Err(LoaderError::config(format!("duplicate camera {c:?}")));
                }
            }
        }
        for (name, offsets) in &self.delta_windows {
            if offsets.is_empty() {
                return Err(LoaderError::config(format!(
                    "delta window group {name:?} has no offsets"
                )));
            }
        }
        if self.chunk_streaming && !self.shuffle {
            warn!("chunk streaming without shuffle: chunks will replay in planner order");
        }
        Ok(())
    }
}
