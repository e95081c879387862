//! Visual observation loading
//!
//! The decode collaborator seam and the per-episode loader pool.

pub mod decoder;
pub mod pool;

pub use decoder::{Frame, FrameStream, VideoDecodeBackend};
pub use pool::ObservationLoaderPool;
