//! Read-only columnar store of per-row scalar/tensor fields
//!
//! One checksummed binary shard per episode, concatenated into one global
//! row space at load time. Shard layout (little-endian):
//! `magic, version, row_count, state_dim, action_dim, payload_crc32c`
//! followed by packed rows of
//! `timestamp f64, task_index u32, episode_index u32, reward f32,
//!  state [f32; state_dim], action [f32; action_dim]`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{LoaderError, Result};

/// Shard file magic, "EPT1"
pub const SHARD_MAGIC: u32 = 0x4550_5431;

/// Current shard format version
pub const SHARD_VERSION: u32 = 1;

const HEADER_BYTES: usize = 24;

/// One tabular row of an episode
#[derive(Debug, Clone, PartialEq)]
pub struct TabularRow {
    pub timestamp: f64,
    pub task_index: u32,
    pub episode_index: u32,
    pub reward: f32,
    pub state: Vec<f32>,
    pub action: Vec<f32>,
}

/// Read-only row accessor over the selected episodes' shards
#[derive(Debug)]
pub struct TabularRecordStore {
    rows: Vec<TabularRow>,
    state_dim: u32,
    action_dim: u32,
}

impl TabularRecordStore {
    /// Load shards in selection order
    ///
    /// `shards` pairs each episode id with its shard path and the row count
    /// declared by the episode table; any absent or inconsistent shard
    /// fails the whole load. No partial-episode skipping.
    pub fn load(
        shards: &[(u32, PathBuf, u32)],
        state_dim: u32,
        action_dim: u32,
    ) -> Result<Self> {
        let mut rows = Vec::new();
        for &(episode_index, ref path, expected_rows) in shards {
            let data = std::fs::read(path).map_err(|_| LoaderError::missing(path))?;
            let shard_rows = decode_shard(path, Bytes::from(data), state_dim, action_dim)?;
            if shard_rows.len() as u32 != expected_rows {
                return Err(LoaderError::config(format!(
                    "shard {} has {} rows but the episode table declares {}",
                    path.display(),
                    shard_rows.len(),
                    expected_rows
                )));
            }
            if let Some(bad) = shard_rows.iter().find(|r| r.episode_index != episode_index) {
                return Err(LoaderError::ShardCorrupt {
                    path: path.display().to_string(),
                    detail: format!(
                        "row claims episode {} but the shard belongs to episode {}",
                        bad.episode_index, episode_index
                    ),
                });
            }
            rows.extend(shard_rows);
        }
        debug!(rows = rows.len(), shards = shards.len(), "loaded tabular shards");
        Ok(Self {
            rows,
            state_dim,
            action_dim,
        })
    }

    /// Total row count
    pub fn len(&self) -> u32 {
        self.rows.len() as u32
    }

    /// True when no rows are loaded
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// State vector dimension
    pub fn state_dim(&self) -> u32 {
        self.state_dim
    }

    /// Action vector dimension
    pub fn action_dim(&self) -> u32 {
        self.action_dim
    }

    /// Row at a global index
    pub fn row(&self, global_row: u32) -> Result<&TabularRow> {
        self.rows.get(global_row as usize).ok_or_else(|| {
            LoaderError::config(format!(
                "row {global_row} is out of range (total {})",
                self.rows.len()
            ))
        })
    }

    /// Batch accessor for resolved delta-window index lists
    pub fn rows(&self, global_rows: &[u32]) -> Result<Vec<&TabularRow>> {
        global_rows.iter().map(|&i| self.row(i)).collect()
    }
}

fn corrupt(path: &Path, detail: impl Into<String>) -> LoaderError {
    LoaderError::ShardCorrupt {
        path: path.display().to_string(),
        detail: detail.into(),
    }
}

fn row_bytes(state_dim: u32, action_dim: u32) -> usize {
    8 + 4 + 4 + 4 + 4 * (state_dim + action_dim) as usize
}

/// Decode and checksum-verify one shard
fn decode_shard(
    path: &Path,
    data: Bytes,
    state_dim: u32,
    action_dim: u32,
) -> Result<Vec<TabularRow>> {
    let mut buf = data;
    if buf.len() < HEADER_BYTES {
        return Err(corrupt(path, "truncated header"));
    }
    let magic = buf.get_u32_le();
    if magic != SHARD_MAGIC {
        return Err(corrupt(path, format!("bad magic {magic:#010x}")));
    }
    let version = buf.get_u32_le();
    if version != SHARD_VERSION {
        return Err(corrupt(path, format!("unsupported shard version {version}")));
    }
    let row_count = buf.get_u32_le();
    let shard_state_dim = buf.get_u32_le();
    let shard_action_dim = buf.get_u32_le();
    let expected_crc = buf.get_u32_le();

    if shard_state_dim != state_dim || shard_action_dim != action_dim {
        return Err(LoaderError::config(format!(
            "shard {} has dims state={shard_state_dim}/action={shard_action_dim}, \
             dataset declares state={state_dim}/action={action_dim}",
            path.display()
        )));
    }

    let expected_len = row_count as usize * row_bytes(state_dim, action_dim);
    if buf.remaining() != expected_len {
        return Err(corrupt(
            path,
            format!("payload is {} bytes, expected {expected_len}", buf.remaining()),
        ));
    }
    let actual_crc = crc32c::crc32c(&buf);
    if actual_crc != expected_crc {
        return Err(corrupt(
            path,
            format!("checksum mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"),
        ));
    }

    let mut rows = Vec::with_capacity(row_count as usize);
    for _ in 0..row_count {
        let timestamp = buf.get_f64_le();
        let task_index = buf.get_u32_le();
        let episode_index = buf.get_u32_le();
        let reward = buf.get_f32_le();
        let state = (0..state_dim).map(|_| buf.get_f32_le()).collect();
        let action = (0..action_dim).map(|_| buf.get_f32_le()).collect();
        rows.push(TabularRow {
            timestamp,
            task_index,
            episode_index,
            reward,
            state,
            action,
        });
    }
    Ok(rows)
}

/// Encode rows into the shard wire format
///
/// Packing-side helper, used by dataset packers and test fixtures; the
/// loader itself never writes shards.
pub fn encode_shard(rows: &[TabularRow], state_dim: u32, action_dim: u32) -> Result<Bytes> {
    let mut payload = BytesMut::with_capacity(rows.len() * row_bytes(state_dim, action_dim));
    for row in rows {
        if row.state.len() as u32 != state_dim || row.action.len() as u32 != action_dim {
            return Err(LoaderError::config(format!(
                "row dims state={}/action={} do not match declared \
                 state={state_dim}/action={action_dim}",
                row.state.len(),
                row.action.len()
            )));
        }
        payload.put_f64_le(row.timestamp);
        payload.put_u32_le(row.task_index);
        payload.put_u32_le(row.episode_index);
        payload.put_f32_le(row.reward);
        for &v in &row.state {
            payload.put_f32_le(v);
        }
        for &v in &row.action {
            payload.put_f32_le(v);
        }
    }

    let mut out = BytesMut::with_capacity(HEADER_BYTES + payload.len());
    out.put_u32_le(SHARD_MAGIC);
    out.put_u32_le(SHARD_VERSION);
    out.put_u32_le(rows.len() as u32);
    out.put_u32_le(state_dim);
    out.put_u32_le(action_dim);
    out.put_u32_le(crc32c::crc32c(&payload));
    out.extend_from_slice(&payload);
    Ok(out.freeze())
}

/// Write one episode's shard file, creating parent directories
pub fn write_shard(
    path: &Path,
    rows: &[TabularRow],
    state_dim: u32,
    action_dim: u32,
) -> Result<()> {
    let encoded = encode_shard(rows, state_dim, action_dim)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|_| LoaderError::missing(parent))?;
    }
    std::fs::write(path, &encoded).map_err(|_| LoaderError::missing(path))
}
