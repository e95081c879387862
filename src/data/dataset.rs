//! Episodic demonstration dataset
//!
//! Ties the catalog, index, planner, cursor, record store, and loader pool
//! together. The catalog/index/plan are immutable after construction and
//! safe to duplicate per worker; the cursor and pool are per-worker mutable
//! state and are never shared.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::DatasetConfig;
use crate::data::chunks::ChunkPlanner;
use crate::data::cursor::{CursorState, StreamingCursor};
use crate::data::delta::DeltaWindowResolver;
use crate::data::episode_index::EpisodeIndex;
use crate::data::records::{TabularRecordStore, TabularRow};
use crate::error::{LoaderError, Result};
use crate::meta::catalog::MetadataCatalog;
use crate::meta::layout::{self, Modality};
use crate::obs::decoder::{Frame, VideoDecodeBackend};
use crate::obs::pool::ObservationLoaderPool;
use crate::sync::RemoteSync;

/// One training sample
#[derive(Debug, Clone)]
pub struct Record {
    /// Global row this record was assembled from
    pub global_row: u32,
    pub timestamp: f64,
    pub task_index: u32,
    pub task_name: String,
    pub episode_index: u32,
    pub reward: f32,
    pub state: Vec<f32>,
    pub action: Vec<f32>,
    /// Decoded frames keyed by `observation.images.{modality}.{camera}`
    pub frames: BTreeMap<String, Frame>,
    /// Delta-window rows per group, aligned with the group's offsets
    pub windows: BTreeMap<String, Vec<TabularRow>>,
    /// `{group}_is_pad` masks, true where a window entry was clamped
    pub pad_masks: BTreeMap<String, Vec<bool>>,
}

/// Frame-accurate loader over one filtered view of a demonstration dataset
pub struct EpisodeDataset<B: VideoDecodeBackend> {
    config: DatasetConfig,
    catalog: MetadataCatalog,
    index: EpisodeIndex,
    store: TabularRecordStore,
    resolver: DeltaWindowResolver,
    cursor: Option<StreamingCursor>,
    pool: ObservationLoaderPool<B>,
}

impl<B: VideoDecodeBackend> std::fmt::Debug for EpisodeDataset<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpisodeDataset").finish_non_exhaustive()
    }
}

impl<B: VideoDecodeBackend> EpisodeDataset<B> {
    /// Construct a dataset rooted at `root`
    ///
    /// All validation happens here: incompatible options, undeclared
    /// tasks/cameras, missing files (after the at-most-once remote
    /// fallback), corrupt shards, and timestamp misalignment all fail
    /// construction. There is no partially constructed state.
    pub fn open(
        root: &Path,
        config: DatasetConfig,
        backend: B,
        remote: Option<&dyn RemoteSync>,
    ) -> Result<Self> {
        config.validate()?;
        for &modality in &config.modalities {
            if !backend.supports(modality) {
                return Err(LoaderError::config(format!(
                    "backend {:?} cannot decode modality {modality}",
                    backend.name()
                )));
            }
        }

        let catalog = MetadataCatalog::load(root, &config)?;
        let selected =
            EpisodeIndex::select_episodes(&catalog, config.episodes_per_task.as_deref());
        if selected.is_empty() {
            return Err(LoaderError::config(
                "episode selection matched no episodes",
            ));
        }
        let index = EpisodeIndex::build(&catalog, &selected)?;

        Self::ensure_files_present(&catalog, &selected, &config, remote)?;

        let info = catalog.info();
        let shards: Vec<(u32, PathBuf, u32)> = selected
            .iter()
            .map(|&ep| {
                let length = catalog.episode_length(ep)?;
                Ok((ep, root.join(layout::data_path(ep)), length))
            })
            .collect::<Result<_>>()?;
        let store = TabularRecordStore::load(&shards, info.state_dim, info.action_dim)?;

        if config.check_timestamp_sync {
            verify_timestamp_sync(&store, &index, catalog.fps(), config.timestamp_tolerance_s)?;
        }

        let resolver = DeltaWindowResolver::from_seconds(
            &config.delta_windows,
            catalog.fps(),
            config.timestamp_tolerance_s,
        )?;

        let cursor = if config.chunk_streaming {
            let chunks =
                ChunkPlanner::new(index.episode_lengths()).plan(config.chunk_size)?;
            Some(StreamingCursor::new(chunks, config.seed, config.shuffle)?)
        } else {
            None
        };

        info!(
            episodes = index.len(),
            rows = index.total_rows(),
            chunk_streaming = config.chunk_streaming,
            "constructed episode dataset"
        );

        Ok(Self {
            config,
            catalog,
            index,
            store,
            resolver,
            cursor,
            pool: ObservationLoaderPool::new(backend),
        })
    }

    /// Verify every required file exists, with one remote fallback
    fn ensure_files_present(
        catalog: &MetadataCatalog,
        selected: &[u32],
        config: &DatasetConfig,
        remote: Option<&dyn RemoteSync>,
    ) -> Result<()> {
        let missing = Self::missing_files(catalog, selected)?;
        if missing.is_empty() {
            return Ok(());
        }
        let remote = match remote {
            Some(remote) if !config.local_only => remote,
            _ => return Err(LoaderError::missing(&missing[0])),
        };
        info!(missing = missing.len(), "fetching missing files from remote");
        remote.fetch(catalog.root(), &missing)?;
        let still_missing = Self::missing_files(catalog, selected)?;
        match still_missing.first() {
            Some(path) => Err(LoaderError::missing(path)),
            None => Ok(()),
        }
    }

    fn missing_files(catalog: &MetadataCatalog, selected: &[u32]) -> Result<Vec<PathBuf>> {
        // Side-cars carry segmentation id lists and are only read for that
        // modality; rgb/depth datasets need not ship them
        let wants_seg = catalog.modalities().contains(&Modality::SegInstanceId);
        let mut missing = Vec::new();
        for &ep in selected {
            let files = catalog.feature_paths(ep)?;
            let mut required = vec![files.data];
            if wants_seg {
                required.push(files.sidecar);
            }
            required.extend(files.videos.into_iter().map(|v| v.path));
            missing.extend(required.into_iter().filter(|p| !p.is_file()));
        }
        Ok(missing)
    }

    /// Fold a data-loading worker id into the shuffle seed
    ///
    /// Worker 0 is the default when no worker partitioning is active.
    /// Must be called before the first record is fetched.
    pub fn for_worker(mut self, worker_id: u32) -> Result<Self> {
        if let Some(cursor) = &mut self.cursor {
            cursor.set_worker_id(worker_id)?;
        }
        Ok(self)
    }

    /// Total rows across the selected episodes
    pub fn total_rows(&self) -> u32 {
        self.index.total_rows()
    }

    /// Number of selected episodes
    pub fn num_episodes(&self) -> usize {
        self.index.len()
    }

    /// True when constructed in chunk-streaming mode
    pub fn is_chunk_streaming(&self) -> bool {
        self.cursor.is_some()
    }

    /// Metadata view this dataset was built from
    pub fn catalog(&self) -> &MetadataCatalog {
        &self.catalog
    }

    /// Row index of the selected episodes
    pub fn index(&self) -> &EpisodeIndex {
        &self.index
    }

    /// Streaming cursor position, `None` in random-access mode
    pub fn cursor_state(&self) -> Option<CursorState> {
        self.cursor.as_ref().map(|c| c.state())
    }

    /// Next record in chunk-streaming order
    ///
    /// Advances the cursor, repositions the loader pool to the cursor's
    /// frame (a no-op while the pool is already aligned, a reopen
    /// otherwise), and never terminates: after the last chunk the cursor
    /// wraps back to the first.
    pub fn next_record(&mut self) -> Result<Record> {
        let cursor = self.cursor.as_mut().ok_or_else(|| {
            LoaderError::config("next_record requires chunk_streaming; use record_at instead")
        })?;
        let step = cursor.next_step();
        let row = self.store.row(step.global_row)?.clone();
        let (ep_start, _) = self.index.row_range(row.episode_index).ok_or_else(|| {
            LoaderError::config(format!(
                "row {} maps to unselected episode {}",
                step.global_row, row.episode_index
            ))
        })?;
        if step.reload {
            debug!(
                global_row = step.global_row,
                episode_index = row.episode_index,
                local_start = step.local_start,
                "chunk boundary, reloading observation loaders"
            );
        }
        // Position on every step, not just chunk boundaries: interleaved
        // random access may have moved the pool off the cursor's frame.
        self.pool
            .ensure_episode(&self.catalog, row.episode_index, step.global_row - ep_start)?;
        self.assemble(step.global_row, row)
    }

    /// Record at an absolute global row (random access)
    ///
    /// Bypasses the streaming state machine. The pool is reopened whenever
    /// the requested episode or frame position differs from its current
    /// state.
    pub fn record_at(&mut self, global_row: u32) -> Result<Record> {
        let row = self.store.row(global_row)?.clone();
        let (ep_start, _) = self.index.row_range(row.episode_index).ok_or_else(|| {
            LoaderError::config(format!(
                "row {global_row} maps to unselected episode {}",
                row.episode_index
            ))
        })?;
        self.pool
            .ensure_episode(&self.catalog, row.episode_index, global_row - ep_start)?;
        self.assemble(global_row, row)
    }

    /// Combine the tabular row, delta windows, and decoded frames
    fn assemble(&mut self, global_row: u32, row: TabularRow) -> Result<Record> {
        let (ep_start, ep_end) = self.index.row_range(row.episode_index).ok_or_else(|| {
            LoaderError::config(format!(
                "episode {} vanished from the index",
                row.episode_index
            ))
        })?;

        let mut windows = BTreeMap::new();
        let mut pad_masks = BTreeMap::new();
        for resolved in self.resolver.resolve(global_row, ep_start, ep_end) {
            let rows = self
                .store
                .rows(&resolved.query_rows)?
                .into_iter()
                .cloned()
                .collect();
            windows.insert(resolved.name.clone(), rows);
            pad_masks.insert(resolved.name, resolved.is_pad);
        }

        let mut frames = BTreeMap::new();
        for &modality in self.catalog.modalities() {
            for camera in self.catalog.cameras() {
                let frame = self.pool.next_frame(modality, camera)?;
                frames.insert(layout::video_key(modality, camera), frame);
            }
        }

        let task_name = self
            .catalog
            .task_name(row.task_index)
            .map(str::to_owned)
            .unwrap_or_default();

        Ok(Record {
            global_row,
            timestamp: row.timestamp,
            task_index: row.task_index,
            task_name,
            episode_index: row.episode_index,
            reward: row.reward,
            state: row.state,
            action: row.action,
            frames,
            windows,
            pad_masks,
        })
    }
}

/// Check that per-episode timestamps advance by one frame period
///
/// Training on silently misaligned modalities is worse than failing fast,
/// so any step outside tolerance aborts construction.
fn verify_timestamp_sync(
    store: &TabularRecordStore,
    index: &EpisodeIndex,
    fps: u32,
    tolerance_s: f64,
) -> Result<()> {
    let expected = 1.0 / fps as f64;
    for &ep in index.episodes() {
        let (start, end) = match index.row_range(ep) {
            Some(range) => range,
            None => continue,
        };
        for row in start..end.saturating_sub(1) {
            let actual = store.row(row + 1)?.timestamp - store.row(row)?.timestamp;
            if (actual - expected).abs() > tolerance_s {
                return Err(LoaderError::TimestampSync {
                    episode_index: ep,
                    row: row + 1,
                    expected,
                    actual,
                });
            }
        }
    }
    Ok(())
}
