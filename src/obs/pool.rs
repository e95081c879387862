//! Per-episode observation loader pool
//!
//! Owns one live decode stream per enabled (modality, camera) pair, scoped
//! to the currently active episode. Streams are closed in order before any
//! replacement opens, and the pool is owned exclusively by one worker
//! process; pool state never crosses a process boundary.

use tracing::debug;

use crate::error::{LoaderError, Result};
use crate::meta::catalog::MetadataCatalog;
use crate::meta::layout::{self, EpisodeSidecar, Modality};
use crate::obs::decoder::{Frame, FrameStream, VideoDecodeBackend};

struct PoolEntry {
    modality: Modality,
    camera: String,
    stream: Box<dyn FrameStream>,
    /// Next episode-local frame this stream will yield
    local_frame: u32,
}

/// Pool of decode streams for the current episode
pub struct ObservationLoaderPool<B: VideoDecodeBackend> {
    backend: B,
    entries: Vec<PoolEntry>,
    current_episode: Option<u32>,
    episode_length: u32,
}

impl<B: VideoDecodeBackend> ObservationLoaderPool<B> {
    /// Create an empty pool around a decode backend
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            entries: Vec::new(),
            current_episode: None,
            episode_length: 0,
        }
    }

    /// Decode backend in use
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Episode the pool currently has open, if any
    pub fn current_episode(&self) -> Option<u32> {
        self.current_episode
    }

    /// Next local frame, when every stream agrees on it
    fn local_position(&self) -> Option<u32> {
        let first = self.entries.first()?.local_frame;
        self.entries
            .iter()
            .all(|e| e.local_frame == first)
            .then_some(first)
    }

    /// Make the pool serve `episode_index` starting at `local_start`
    ///
    /// No-op when that episode is already open with every stream positioned
    /// at `local_start`. Otherwise closes all handles (ordered,
    /// close-before-open) and opens one stream per enabled pair.
    ///
    /// The no-op also covers a chunk transition that continues the same
    /// episode at the very next frame, so open/close counts track position
    /// jumps rather than chunk boundaries.
    pub fn ensure_episode(
        &mut self,
        catalog: &MetadataCatalog,
        episode_index: u32,
        local_start: u32,
    ) -> Result<()> {
        if self.current_episode == Some(episode_index)
            && !self.entries.is_empty()
            && self.local_position() == Some(local_start)
        {
            return Ok(());
        }

        self.close_all();

        let files = catalog.feature_paths(episode_index)?;
        let wants_seg = catalog
            .modalities()
            .contains(&Modality::SegInstanceId);
        let sidecar = if wants_seg {
            Some(EpisodeSidecar::load(&files.sidecar)?)
        } else {
            None
        };

        for video in &files.videos {
            let instance_ids = match (&sidecar, video.modality) {
                (Some(sidecar), Modality::SegInstanceId) => {
                    Some(sidecar.instance_ids(&video.camera)?)
                }
                _ => None,
            };
            let stream = self.backend.open(
                &video.path,
                video.modality,
                local_start,
                instance_ids.as_deref(),
            )?;
            self.entries.push(PoolEntry {
                modality: video.modality,
                camera: video.camera.clone(),
                stream,
                local_frame: local_start,
            });
        }

        self.current_episode = Some(episode_index);
        self.episode_length = catalog.episode_length(episode_index)?;
        debug!(
            episode_index,
            local_start,
            streams = self.entries.len(),
            backend = self.backend.name(),
            "opened observation loaders"
        );
        Ok(())
    }

    /// Advance one stream by exactly one logical frame
    pub fn next_frame(&mut self, modality: Modality, camera: &str) -> Result<Frame> {
        let episode_index = self.current_episode.ok_or_else(|| {
            LoaderError::config("no episode is open in the observation loader pool")
        })?;
        let episode_length = self.episode_length;
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.modality == modality && e.camera == camera)
            .ok_or_else(|| {
                LoaderError::config(format!(
                    "no open stream for {}",
                    layout::video_key(modality, camera)
                ))
            })?;
        if entry.local_frame >= episode_length {
            return Err(LoaderError::DecodeExhausted {
                episode_index,
                frame: entry.local_frame,
            });
        }
        let frame = entry.stream.next_frame()?;
        entry.local_frame += 1;
        Ok(frame)
    }

    /// Close every handle, in open order
    pub fn close_all(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        for entry in &mut self.entries {
            entry.stream.close();
        }
        debug!(
            episode = ?self.current_episode,
            streams = self.entries.len(),
            "closed observation loaders"
        );
        self.entries.clear();
        self.current_episode = None;
        self.episode_length = 0;
    }
}

impl<B: VideoDecodeBackend> Drop for ObservationLoaderPool<B> {
    fn drop(&mut self) {
        self.close_all();
    }
}
