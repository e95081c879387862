//! GOP-aligned chunk planning
//!
//! Partitions each selected episode into fixed-size chunks so sequential
//! streaming always decodes from a keyframe boundary.

use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, Result};

/// A keyframe-aligned contiguous sub-range of one episode's rows
///
/// `global_start..global_end` is half-open in the dataset-wide row
/// numbering; `local_start` is the offset of the first row within its
/// episode, used to seed per-episode decoders at the right frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub global_start: u32,
    pub global_end: u32,
    pub local_start: u32,
}

impl Chunk {
    /// Number of rows in the chunk
    pub fn len(&self) -> u32 {
        self.global_end - self.global_start
    }

    /// True only for degenerate chunks, which the planner never emits
    pub fn is_empty(&self) -> bool {
        self.global_start == self.global_end
    }
}

/// Plans chunks over the selected episodes in index order
pub struct ChunkPlanner {
    episode_lengths: Vec<u32>,
}

impl ChunkPlanner {
    /// Create a planner from episode lengths in selection order
    pub fn new(episode_lengths: Vec<u32>) -> Self {
        Self { episode_lengths }
    }

    /// Partition every episode into chunks of `chunk_size` rows
    ///
    /// Within an episode, chunks are contiguous, non-overlapping, and cover
    /// the full row range; only the final chunk of an episode may be
    /// shorter than `chunk_size`.
    pub fn plan(&self, chunk_size: u32) -> Result<Vec<Chunk>> {
        if chunk_size == 0 {
            return Err(LoaderError::config("chunk_size must be non-zero"));
        }
        let mut chunks = Vec::new();
        let mut offset = 0u32;
        for &length in &self.episode_lengths {
            let mut local_start = 0u32;
            while local_start < length {
                let local_end = (local_start + chunk_size).min(length);
                chunks.push(Chunk {
                    global_start: offset + local_start,
                    global_end: offset + local_end,
                    local_start,
                });
                local_start = local_end;
            }
            offset += length;
        }
        Ok(chunks)
    }
}
