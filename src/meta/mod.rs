//! Dataset metadata
//!
//! Registry loading, filtering, and on-disk path layout.

pub mod catalog;
pub mod layout;

pub use catalog::{DatasetInfo, EpisodeFiles, MetadataCatalog};
pub use layout::{EpisodeSidecar, Modality};
