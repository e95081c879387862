//! demoset-core - Frame-accurate episodic demonstration data loading
//!
//! This crate provides the loading core for robot-demonstration datasets:
//! - Task/episode metadata registries and file-path resolution
//! - GOP-aligned chunk planning for keyframe-efficient video streaming
//! - Temporal context windows with episode-boundary padding masks
//! - Worker-safe deterministic shuffling and streaming cursors
//! - Per-episode video decoder pools behind a pluggable backend

pub mod config;
pub mod data;
pub mod error;
pub mod meta;
pub mod obs;
pub mod sync;

pub use config::DatasetConfig;
pub use data::dataset::{EpisodeDataset, Record};
pub use error::{LoaderError, Result};
pub use meta::layout::Modality;

/// Default chunk size in frames, matching the GOP size of the demo videos
pub const DEFAULT_CHUNK_SIZE: u32 = 250;

/// Default shuffle seed
pub const DEFAULT_SEED: u64 = 42;

/// Default timestamp tolerance in seconds
pub const DEFAULT_TIMESTAMP_TOLERANCE_S: f64 = 1e-4;

/// Episode ids are partitioned by task: `task_index = episode_index / 10_000`
pub const EPISODES_PER_TASK_STRIDE: u32 = 10_000;
