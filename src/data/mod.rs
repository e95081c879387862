//! Data loading core
//!
//! Episode row indexing, chunk planning, delta windows, tabular records,
//! streaming cursor, and record assembly.

pub mod chunks;
pub mod cursor;
pub mod dataset;
pub mod delta;
pub mod episode_index;
pub mod records;

pub use chunks::{Chunk, ChunkPlanner};
pub use cursor::{CursorStep, StreamingCursor};
pub use dataset::{EpisodeDataset, Record};
pub use delta::{DeltaWindowResolver, ResolvedWindow};
pub use episode_index::EpisodeIndex;
pub use records::{TabularRecordStore, TabularRow};
