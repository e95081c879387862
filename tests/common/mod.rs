//! Shared fixtures: an on-disk dataset builder and a counting mock decode
//! backend that encodes the episode-local frame index into each frame.

#![allow(dead_code)]

use bytes::Bytes;
use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use demoset_core::data::records::{write_shard, TabularRow};
use demoset_core::error::Result;
use demoset_core::meta::layout::{self, EpisodeSidecar, Modality};
use demoset_core::obs::decoder::{Frame, FrameStream, VideoDecodeBackend};

pub const FPS: u32 = 30;
pub const STATE_DIM: u32 = 2;
pub const ACTION_DIM: u32 = 2;

/// Install the test log subscriber once per test binary, so failing
/// assertions come with the loader's tracing output
pub fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Write a complete dataset under `root`: registries, shards, side-cars,
/// and (empty stand-in) video files for all modalities and cameras.
pub fn write_fixture(root: &Path, episodes: &[(u32, u32)], cameras: &[&str]) {
    init_logging();
    std::fs::create_dir_all(root.join("meta")).unwrap();

    let camera_list: Vec<String> = cameras.iter().map(|c| format!("{c:?}")).collect();
    std::fs::write(
        root.join("meta/info.json"),
        format!(
            r#"{{"fps": {FPS}, "robot": "r1_pro", "cameras": [{}], "state_dim": {STATE_DIM}, "action_dim": {ACTION_DIM}, "gop_size": 250}}"#,
            camera_list.join(", ")
        ),
    )
    .unwrap();

    let task_ids: std::collections::BTreeSet<u32> = episodes
        .iter()
        .map(|&(ep, _)| layout::task_of_episode(ep))
        .collect();
    let tasks: String = task_ids
        .iter()
        .map(|t| format!(r#"{{"task_index": {t}, "name": "task_{t}"}}"#) + "\n")
        .collect();
    std::fs::write(root.join("meta/tasks.jsonl"), tasks).unwrap();

    let table: String = episodes
        .iter()
        .map(|&(ep, len)| format!(r#"{{"episode_index": {ep}, "length": {len}}}"#) + "\n")
        .collect();
    std::fs::write(root.join("meta/episodes.jsonl"), table).unwrap();

    for &(ep, len) in episodes {
        write_shard(
            &root.join(layout::data_path(ep)),
            &fixture_rows(ep, len),
            STATE_DIM,
            ACTION_DIM,
        )
        .unwrap();

        let mut sidecar = EpisodeSidecar::default();
        for camera in cameras {
            sidecar.set_instance_ids(camera, vec![1, 2, 3]);
        }
        let sidecar_path = root.join(layout::sidecar_path(ep));
        std::fs::create_dir_all(sidecar_path.parent().unwrap()).unwrap();
        std::fs::write(&sidecar_path, serde_json::to_string(&sidecar).unwrap()).unwrap();

        for modality in Modality::ALL {
            for camera in cameras {
                let video = root.join(layout::video_path(ep, modality, camera));
                std::fs::create_dir_all(video.parent().unwrap()).unwrap();
                std::fs::write(&video, b"").unwrap();
            }
        }
    }
}

/// Deterministic tabular rows for one episode
pub fn fixture_rows(episode_index: u32, length: u32) -> Vec<TabularRow> {
    (0..length)
        .map(|i| TabularRow {
            timestamp: i as f64 / FPS as f64,
            task_index: layout::task_of_episode(episode_index),
            episode_index,
            reward: 0.0,
            state: vec![episode_index as f32, i as f32],
            action: vec![i as f32, -(i as f32)],
        })
        .collect()
}

/// Decode-call counters shared between a backend and the test body
#[derive(Default)]
pub struct DecodeCounters {
    pub opens: Cell<usize>,
    pub closes: Cell<usize>,
    pub seg_opens_with_ids: Cell<usize>,
}

/// Mock decode backend: streams yield 4-byte frames holding the
/// episode-local frame index, so tests can assert frame accuracy.
pub struct MockBackend {
    counters: Rc<DecodeCounters>,
    supports_depth: bool,
}

impl MockBackend {
    pub fn new() -> (Self, Rc<DecodeCounters>) {
        let counters = Rc::new(DecodeCounters::default());
        (
            Self {
                counters: Rc::clone(&counters),
                supports_depth: true,
            },
            counters,
        )
    }

    pub fn without_depth() -> Self {
        Self {
            counters: Rc::new(DecodeCounters::default()),
            supports_depth: false,
        }
    }
}

impl VideoDecodeBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn supports(&self, modality: Modality) -> bool {
        modality != Modality::Depth || self.supports_depth
    }

    fn open(
        &self,
        _path: &Path,
        modality: Modality,
        start_frame: u32,
        instance_ids: Option<&[i64]>,
    ) -> Result<Box<dyn FrameStream>> {
        self.counters.opens.set(self.counters.opens.get() + 1);
        if modality == Modality::SegInstanceId && instance_ids.is_some() {
            self.counters
                .seg_opens_with_ids
                .set(self.counters.seg_opens_with_ids.get() + 1);
        }
        Ok(Box::new(MockStream {
            next: start_frame,
            closed: false,
            counters: Rc::clone(&self.counters),
        }))
    }
}

pub struct MockStream {
    next: u32,
    closed: bool,
    counters: Rc<DecodeCounters>,
}

impl FrameStream for MockStream {
    fn next_frame(&mut self) -> Result<Frame> {
        let frame = Frame {
            width: 1,
            height: 1,
            channels: 1,
            data: Bytes::copy_from_slice(&self.next.to_le_bytes()),
        };
        self.next += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counters.closes.set(self.counters.closes.get() + 1);
        }
    }
}

/// Episode-local frame index a mock frame was decoded at
pub fn frame_local_index(frame: &Frame) -> u32 {
    u32::from_le_bytes(frame.data[..4].try_into().unwrap())
}
