//! Task/episode/feature registries
//!
//! Loads the JSON-lines task and episode tables plus `info.json`, filters
//! them to the requested tasks, and resolves per-episode file paths.
//! Immutable after construction; workers duplicate it freely.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::DatasetConfig;
use crate::error::{LoaderError, Result};
use crate::meta::layout::{self, Modality};

/// Dataset-wide properties from `meta/info.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// Recording frame rate shared by all modalities
    pub fps: u32,
    /// Robot embodiment name
    pub robot: String,
    /// Declared camera set
    pub cameras: Vec<String>,
    /// Proprioceptive state dimension
    pub state_dim: u32,
    /// Action dimension
    pub action_dim: u32,
    /// GOP size of the encoded videos
    pub gop_size: u32,
}

/// One row of `meta/tasks.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaskEntry {
    task_index: u32,
    name: String,
}

/// One row of `meta/episodes.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EpisodeEntry {
    episode_index: u32,
    length: u32,
}

/// Resolved file paths for one episode
#[derive(Debug, Clone)]
pub struct EpisodeFiles {
    /// Tabular shard
    pub data: PathBuf,
    /// JSON side-car with modality-specific auxiliary data
    pub sidecar: PathBuf,
    /// One video file per enabled (modality, camera) pair
    pub videos: Vec<VideoFile>,
}

/// One video file of an episode
#[derive(Debug, Clone)]
pub struct VideoFile {
    pub modality: Modality,
    pub camera: String,
    pub path: PathBuf,
}

/// Filtered view of the dataset registries
pub struct MetadataCatalog {
    root: PathBuf,
    info: DatasetInfo,
    /// Selected tasks, `task_index -> name`
    tasks: BTreeMap<u32, String>,
    /// Selected episodes, `episode_index -> length`
    episodes: BTreeMap<u32, u32>,
    modalities: Vec<Modality>,
    cameras: Vec<String>,
}

impl MetadataCatalog {
    /// Load and filter the registries under `root`
    ///
    /// Fails with a configuration error when a requested task, modality, or
    /// camera is not declared by the dataset.
    pub fn load(root: &Path, config: &DatasetConfig) -> Result<Self> {
        let info: DatasetInfo = read_json(&root.join("meta/info.json"))?;

        let cameras = match &config.cameras {
            Some(requested) => {
                for camera in requested {
                    if !info.cameras.contains(camera) {
                        return Err(LoaderError::config(format!(
                            "camera {camera:?} is not declared by the dataset \
                             (declared: {:?})",
                            info.cameras
                        )));
                    }
                }
                requested.clone()
            }
            None => info.cameras.clone(),
        };

        let all_tasks: Vec<TaskEntry> = read_jsonlines(&root.join("meta/tasks.jsonl"))?;
        let tasks: BTreeMap<u32, String> = match &config.tasks {
            Some(requested) => {
                let mut selected = BTreeMap::new();
                for name in requested {
                    let entry = all_tasks
                        .iter()
                        .find(|t| &t.name == name)
                        .ok_or_else(|| {
                            LoaderError::config(format!("unknown task {name:?}"))
                        })?;
                    selected.insert(entry.task_index, entry.name.clone());
                }
                selected
            }
            None => all_tasks
                .into_iter()
                .map(|t| (t.task_index, t.name))
                .collect(),
        };

        let all_episodes: Vec<EpisodeEntry> = read_jsonlines(&root.join("meta/episodes.jsonl"))?;
        let episodes: BTreeMap<u32, u32> = all_episodes
            .into_iter()
            .filter(|e| tasks.contains_key(&layout::task_of_episode(e.episode_index)))
            .map(|e| (e.episode_index, e.length))
            .collect();

        info!(
            tasks = tasks.len(),
            episodes = episodes.len(),
            cameras = cameras.len(),
            modalities = config.modalities.len(),
            "loaded dataset metadata"
        );

        Ok(Self {
            root: root.to_path_buf(),
            info,
            tasks,
            episodes,
            modalities: config.modalities.clone(),
            cameras,
        })
    }

    /// Dataset root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Dataset-wide properties
    pub fn info(&self) -> &DatasetInfo {
        &self.info
    }

    /// Recording frame rate
    pub fn fps(&self) -> u32 {
        self.info.fps
    }

    /// Enabled modalities, in request order
    pub fn modalities(&self) -> &[Modality] {
        &self.modalities
    }

    /// Enabled cameras, in request order
    pub fn cameras(&self) -> &[String] {
        &self.cameras
    }

    /// Name of a selected task
    pub fn task_name(&self, task_index: u32) -> Option<&str> {
        self.tasks.get(&task_index).map(String::as_str)
    }

    /// Selected episodes with their lengths, ordered by episode id
    pub fn episodes(&self) -> &BTreeMap<u32, u32> {
        &self.episodes
    }

    /// Row count of one selected episode
    pub fn episode_length(&self, episode_index: u32) -> Result<u32> {
        self.episodes.get(&episode_index).copied().ok_or_else(|| {
            LoaderError::config(format!("episode {episode_index} is not in the selection"))
        })
    }

    /// Absolute file paths for one selected episode
    pub fn feature_paths(&self, episode_index: u32) -> Result<EpisodeFiles> {
        self.episode_length(episode_index)?;
        let videos = self
            .modalities
            .iter()
            .flat_map(|&modality| {
                self.cameras.iter().map(move |camera| VideoFile {
                    modality,
                    camera: camera.clone(),
                    path: self
                        .root
                        .join(layout::video_path(episode_index, modality, camera)),
                })
            })
            .collect();
        Ok(EpisodeFiles {
            data: self.root.join(layout::data_path(episode_index)),
            sidecar: self.root.join(layout::sidecar_path(episode_index)),
            videos,
        })
    }
}

/// Read a whole-file JSON value
fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).map_err(|_| LoaderError::missing(path))?;
    serde_json::from_str(&raw).map_err(|e| {
        LoaderError::config(format!("malformed {}: {e}", path.display()))
    })
}

/// Read a JSON-lines table, one record per non-empty line
fn read_jsonlines<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = std::fs::File::open(path).map_err(|_| LoaderError::missing(path))?;
    let mut records = Vec::new();
    for (line_no, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| {
            LoaderError::config(format!("failed reading {}: {e}", path.display()))
        })?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line).map_err(|e| {
            LoaderError::config(format!(
                "malformed {} line {}: {e}",
                path.display(),
                line_no + 1
            ))
        })?);
    }
    Ok(records)
}
