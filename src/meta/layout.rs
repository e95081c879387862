//! On-disk layout of an episodic demonstration dataset
//!
//! Path scheme:
//! - `meta/tasks.jsonl`, `meta/episodes.jsonl`, `meta/info.json`
//! - `meta/episodes/task-{task:04}/episode_{episode:08}.json` (side-car)
//! - `data/task-{task:04}/episode_{episode:08}.bin` (tabular shard)
//! - `videos/task-{task:04}/observation.images.{modality}.{camera}/episode_{episode:08}.mp4`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{LoaderError, Result};
use crate::EPISODES_PER_TASK_STRIDE;

/// Observation modality. The set is closed: every decoder variant the pool
/// can own corresponds to exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// RGB camera stream
    Rgb,
    /// Metric depth stream
    Depth,
    /// Per-pixel instance-segmentation id stream
    SegInstanceId,
}

impl Modality {
    /// All modalities, in canonical order
    pub const ALL: [Modality; 3] = [Modality::Rgb, Modality::Depth, Modality::SegInstanceId];

    /// Name as it appears in video directory names
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Rgb => "rgb",
            Modality::Depth => "depth",
            Modality::SegInstanceId => "seg_instance_id",
        }
    }

    /// Segmentation-id streams are only decodable efficiently from keyframe
    /// boundaries, so they require chunk-aligned streaming.
    pub fn requires_chunk_streaming(&self) -> bool {
        matches!(self, Modality::SegInstanceId)
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rgb" => Ok(Modality::Rgb),
            "depth" => Ok(Modality::Depth),
            "seg_instance_id" => Ok(Modality::SegInstanceId),
            other => Err(LoaderError::config(format!(
                "unknown modality {other:?}, expected one of rgb/depth/seg_instance_id"
            ))),
        }
    }
}

/// Task id derived from an episode id (high digits of the padded id)
pub fn task_of_episode(episode_index: u32) -> u32 {
    episode_index / EPISODES_PER_TASK_STRIDE
}

/// Relative path of an episode's tabular shard
pub fn data_path(episode_index: u32) -> PathBuf {
    PathBuf::from(format!(
        "data/task-{:04}/episode_{:08}.bin",
        task_of_episode(episode_index),
        episode_index
    ))
}

/// Relative path of an episode's video file for one modality/camera pair
pub fn video_path(episode_index: u32, modality: Modality, camera: &str) -> PathBuf {
    PathBuf::from(format!(
        "videos/task-{:04}/observation.images.{}.{}/episode_{:08}.mp4",
        task_of_episode(episode_index),
        modality,
        camera,
        episode_index
    ))
}

/// Relative path of an episode's JSON side-car
pub fn sidecar_path(episode_index: u32) -> PathBuf {
    PathBuf::from(format!(
        "meta/episodes/task-{:04}/episode_{:08}.json",
        task_of_episode(episode_index),
        episode_index
    ))
}

/// Feature key under which a decoded frame appears in a record
pub fn video_key(modality: Modality, camera: &str) -> String {
    format!("observation.images.{modality}.{camera}")
}

/// Per-episode side-car metadata. Holds modality-specific auxiliary data,
/// currently the per-camera instance-id lists needed by segmentation decoders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeSidecar {
    entries: BTreeMap<String, serde_json::Value>,
}

impl EpisodeSidecar {
    /// Load a side-car file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|_| LoaderError::missing(path))?;
        serde_json::from_str(&raw).map_err(|e| {
            LoaderError::config(format!("malformed side-car {}: {e}", path.display()))
        })
    }

    /// Unique instance ids present in one camera's segmentation stream
    pub fn instance_ids(&self, camera: &str) -> Result<Vec<i64>> {
        let key = format!("{camera}::unique_ins_ids");
        let value = self.entries.get(&key).ok_or_else(|| {
            LoaderError::config(format!("side-car has no instance-id list under {key:?}"))
        })?;
        serde_json::from_value(value.clone()).map_err(|e| {
            LoaderError::config(format!("side-car entry {key:?} is not an integer list: {e}"))
        })
    }

    /// Insert an instance-id list, used when packing fixture datasets
    pub fn set_instance_ids(&mut self, camera: &str, ids: Vec<i64>) {
        self.entries.insert(
            format!("{camera}::unique_ins_ids"),
            serde_json::json!(ids),
        );
    }
}
