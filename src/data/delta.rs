//! Temporal context windows
//!
//! Named groups of relative frame offsets around a query row, clamped to
//! episode bounds with explicit padding flags. Consumers mask padded
//! entries instead of silently reading rows from a neighboring episode.

use std::collections::BTreeMap;

use crate::error::{LoaderError, Result};

/// A named group of relative frame offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaWindowSpec {
    pub name: String,
    pub offsets: Vec<i64>,
}

/// Resolved window for one group at one query row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub name: String,
    /// Query rows clamped to the episode's row range
    pub query_rows: Vec<u32>,
    /// True where the unclamped row fell outside the episode
    pub is_pad: Vec<bool>,
}

/// Resolves temporal windows from episode bounds and a query row
///
/// Pure lookup math; never touches decoders or files.
#[derive(Debug)]
pub struct DeltaWindowResolver {
    groups: Vec<DeltaWindowSpec>,
}

impl DeltaWindowResolver {
    /// Convert per-group time offsets in seconds to frame offsets
    ///
    /// Each offset must land on a frame boundary within `tolerance_s`,
    /// otherwise the requested window cannot be represented at this frame
    /// rate and construction fails.
    pub fn from_seconds(
        windows: &BTreeMap<String, Vec<f64>>,
        fps: u32,
        tolerance_s: f64,
    ) -> Result<Self> {
        let mut groups = Vec::with_capacity(windows.len());
        for (name, seconds) in windows {
            let mut offsets = Vec::with_capacity(seconds.len());
            for &s in seconds {
                let frames = s * fps as f64;
                let rounded = frames.round();
                if (frames - rounded).abs() / fps as f64 > tolerance_s {
                    return Err(LoaderError::config(format!(
                        "delta window {name:?} offset {s}s is not a multiple \
                         of the frame period at {fps} fps"
                    )));
                }
                offsets.push(rounded as i64);
            }
            groups.push(DeltaWindowSpec {
                name: name.clone(),
                offsets,
            });
        }
        Ok(Self { groups })
    }

    /// Resolver groups, in name order
    pub fn groups(&self) -> &[DeltaWindowSpec] {
        &self.groups
    }

    /// True when no window group is configured
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Resolve every group for a query row within `[ep_start, ep_end)`
    pub fn resolve(&self, global_row: u32, ep_start: u32, ep_end: u32) -> Vec<ResolvedWindow> {
        self.groups
            .iter()
            .map(|group| {
                let mut query_rows = Vec::with_capacity(group.offsets.len());
                let mut is_pad = Vec::with_capacity(group.offsets.len());
                for &offset in &group.offsets {
                    let target = global_row as i64 + offset;
                    let clamped = target.clamp(ep_start as i64, ep_end as i64 - 1);
                    query_rows.push(clamped as u32);
                    is_pad.push(target < ep_start as i64 || target >= ep_end as i64);
                }
                ResolvedWindow {
                    name: group.name.clone(),
                    query_rows,
                    is_pad,
                }
            })
            .collect()
    }
}
