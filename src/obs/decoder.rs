//! Video decode collaborator interface
//!
//! Codec internals live outside this crate. A backend opens one decode
//! stream per video file, seeded at an episode-local frame; streams yield
//! frames strictly in decode order. Stream handles hold raw decoder state
//! and must never cross a process boundary.

use bytes::Bytes;
use std::path::Path;

use crate::error::Result;
use crate::meta::layout::Modality;

/// One decoded frame buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Channel count: 3 for rgb, 1 for depth and segmentation ids
    pub channels: u32,
    /// Packed pixel data as produced by the backend
    pub data: Bytes,
}

/// Sequential frame stream over one open video file
pub trait FrameStream {
    /// Decode and return the next frame
    fn next_frame(&mut self) -> Result<Frame>;

    /// Release the underlying decoder. Called before a replacement stream
    /// is opened and again (idempotently) on drop.
    fn close(&mut self);
}

/// Decode backend collaborator
///
/// Implementations wrap an actual codec library. The loader only requires
/// keyframe-seeded sequential decoding; whether a backend can decode a
/// given modality at all is declared up front so incompatible requests
/// fail at construction instead of at first use.
pub trait VideoDecodeBackend {
    /// Backend name for diagnostics
    fn name(&self) -> &'static str;

    /// True when this backend can decode the given modality
    fn supports(&self, modality: Modality) -> bool;

    /// Open a stream positioned at `start_frame` (episode-local)
    ///
    /// Segmentation-id streams receive the episode's instance-id list from
    /// the side-car; other modalities get `None`.
    fn open(
        &self,
        path: &Path,
        modality: Modality,
        start_frame: u32,
        instance_ids: Option<&[i64]>,
    ) -> Result<Box<dyn FrameStream>>;
}
