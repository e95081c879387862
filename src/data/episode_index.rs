//! Global row numbering over the selected episodes
//!
//! Concatenates episode lengths in selection order into one contiguous row
//! space. The index is the single source of truth for episode row ranges.

use std::collections::HashMap;

use crate::error::{LoaderError, Result};
use crate::meta::catalog::MetadataCatalog;
use crate::meta::layout;

/// Immutable map from episode ids to contiguous global row ranges
pub struct EpisodeIndex {
    /// Ordered selected episode ids
    episodes: Vec<u32>,
    /// Parallel half-open `[start, end)` global row ranges
    ranges: Vec<(u32, u32)>,
    /// Position of each episode id within the selection
    positions: HashMap<u32, usize>,
}

impl EpisodeIndex {
    /// Build the index for an ordered episode selection
    pub fn build(catalog: &MetadataCatalog, episodes: &[u32]) -> Result<Self> {
        let mut ranges = Vec::with_capacity(episodes.len());
        let mut positions = HashMap::with_capacity(episodes.len());
        let mut offset = 0u32;
        for (pos, &ep) in episodes.iter().enumerate() {
            let length = catalog.episode_length(ep)?;
            if length == 0 {
                return Err(LoaderError::config(format!("episode {ep} has zero length")));
            }
            ranges.push((offset, offset + length));
            positions.insert(ep, pos);
            offset += length;
        }
        Ok(Self {
            episodes: episodes.to_vec(),
            ranges,
            positions,
        })
    }

    /// Select episodes from the catalog, optionally truncated per task
    ///
    /// `episodes_per_task` holds local indices into each task's episode list
    /// after sorting that list ascending by id, so the selection does not
    /// depend on the on-disk enumeration order. Out-of-range local indices
    /// are skipped.
    pub fn select_episodes(
        catalog: &MetadataCatalog,
        episodes_per_task: Option<&[usize]>,
    ) -> Vec<u32> {
        // BTreeMap iteration is already ascending by episode id
        let mut by_task: Vec<(u32, Vec<u32>)> = Vec::new();
        for &ep in catalog.episodes().keys() {
            let task = layout::task_of_episode(ep);
            match by_task.last_mut() {
                Some((t, eps)) if *t == task => eps.push(ep),
                _ => by_task.push((task, vec![ep])),
            }
        }

        let mut selected = Vec::new();
        for (_, eps) in by_task {
            match episodes_per_task {
                Some(local_indices) => {
                    selected.extend(local_indices.iter().filter_map(|&i| eps.get(i).copied()))
                }
                None => selected.extend(eps),
            }
        }
        selected.sort_unstable();
        selected
    }

    /// Ordered selected episode ids
    pub fn episodes(&self) -> &[u32] {
        &self.episodes
    }

    /// Number of selected episodes
    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    /// True when no episode is selected
    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    /// Total rows across all selected episodes
    pub fn total_rows(&self) -> u32 {
        self.ranges.last().map_or(0, |&(_, end)| end)
    }

    /// Position of an episode within the selection
    pub fn position_of(&self, episode_index: u32) -> Option<usize> {
        self.positions.get(&episode_index).copied()
    }

    /// Global `[start, end)` row range of an episode
    pub fn row_range(&self, episode_index: u32) -> Option<(u32, u32)> {
        self.position_of(episode_index).map(|pos| self.ranges[pos])
    }

    /// Episode owning a global row
    pub fn episode_at_row(&self, global_row: u32) -> Option<u32> {
        let pos = self
            .ranges
            .partition_point(|&(_, end)| end <= global_row);
        match self.ranges.get(pos) {
            Some(&(start, _)) if start <= global_row => Some(self.episodes[pos]),
            _ => None,
        }
    }

    /// Episode lengths in selection order
    pub fn episode_lengths(&self) -> Vec<u32> {
        self.ranges.iter().map(|&(s, e)| e - s).collect()
    }
}
