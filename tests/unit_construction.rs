//! Construction-time validation and failure-path tests
//!
//! Every error here must surface as a specific named kind, with no
//! partially constructed dataset left behind.

mod common;

use std::cell::Cell;
use std::path::{Path, PathBuf};

use common::{write_fixture, MockBackend};
use demoset_core::error::{LoaderError, Result};
use demoset_core::meta::layout::{self, Modality};
use demoset_core::sync::RemoteSync;
use demoset_core::{DatasetConfig, EpisodeDataset};

fn rgb_config() -> DatasetConfig {
    DatasetConfig {
        modalities: vec![Modality::Rgb],
        cameras: Some(vec!["head".into()]),
        chunk_size: 10,
        ..DatasetConfig::default()
    }
}

#[test]
fn test_seg_without_chunk_streaming_fails_before_io() {
    // Nonexistent root: reaching file I/O would yield MissingFile instead
    let config = DatasetConfig {
        modalities: vec![Modality::SegInstanceId],
        chunk_streaming: false,
        ..DatasetConfig::default()
    };
    let err = EpisodeDataset::open(
        Path::new("/nonexistent/dataset"),
        config,
        MockBackend::new().0,
        None,
    )
    .unwrap_err();
    assert!(err.is_config(), "{err:?}");
}

#[test]
fn test_depth_requires_capable_backend() {
    let config = DatasetConfig {
        modalities: vec![Modality::Depth],
        ..DatasetConfig::default()
    };
    let err = EpisodeDataset::open(
        Path::new("/nonexistent/dataset"),
        config,
        MockBackend::without_depth(),
        None,
    )
    .unwrap_err();
    assert!(err.is_config(), "{err:?}");
}

#[test]
fn test_unknown_task_and_camera_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), &[(0, 12)], &["head"]);

    let config = DatasetConfig {
        tasks: Some(vec!["no_such_task".into()]),
        ..rgb_config()
    };
    let err =
        EpisodeDataset::open(dir.path(), config, MockBackend::new().0, None).unwrap_err();
    assert!(err.is_config(), "{err:?}");

    let config = DatasetConfig {
        cameras: Some(vec!["tail".into()]),
        ..rgb_config()
    };
    let err =
        EpisodeDataset::open(dir.path(), config, MockBackend::new().0, None).unwrap_err();
    assert!(err.is_config(), "{err:?}");
}

#[test]
fn test_missing_video_is_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), &[(0, 12)], &["head"]);
    let video = dir
        .path()
        .join(layout::video_path(0, Modality::Rgb, "head"));
    std::fs::remove_file(&video).unwrap();

    let err = EpisodeDataset::open(dir.path(), rgb_config(), MockBackend::new().0, None)
        .unwrap_err();
    assert!(err.is_missing_file(), "{err:?}");
}

#[test]
fn test_local_only_never_invokes_remote() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), &[(0, 12)], &["head"]);
    std::fs::remove_file(dir.path().join(layout::data_path(0))).unwrap();

    let remote = CountingRemote::default();
    let config = DatasetConfig {
        local_only: true,
        ..rgb_config()
    };
    let err =
        EpisodeDataset::open(dir.path(), config, MockBackend::new().0, Some(&remote))
            .unwrap_err();
    assert!(err.is_missing_file(), "{err:?}");
    assert_eq!(remote.calls.get(), 0, "local_only must never fetch");
}

#[test]
fn test_remote_fallback_invoked_at_most_once() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), &[(0, 12)], &["head"]);
    let video = dir
        .path()
        .join(layout::video_path(0, Modality::Rgb, "head"));
    std::fs::remove_file(&video).unwrap();

    // A remote that actually materializes the missing files
    let remote = CountingRemote::default();
    let dataset =
        EpisodeDataset::open(dir.path(), rgb_config(), MockBackend::new().0, Some(&remote))
            .unwrap();
    assert_eq!(remote.calls.get(), 1);
    assert_eq!(dataset.total_rows(), 12);

    // A remote that fetches nothing: still exactly one call, then failure
    std::fs::remove_file(&video).unwrap();
    let remote = CountingRemote::broken();
    let err =
        EpisodeDataset::open(dir.path(), rgb_config(), MockBackend::new().0, Some(&remote))
            .unwrap_err();
    assert!(err.is_missing_file(), "{err:?}");
    assert_eq!(remote.calls.get(), 1, "fetch is attempted at most once");
}

#[test]
fn test_sidecar_only_required_for_segmentation() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), &[(0, 12)], &["head"]);
    std::fs::remove_file(dir.path().join(layout::sidecar_path(0))).unwrap();

    // rgb/depth never read the side-car, so it is not required on disk
    let dataset =
        EpisodeDataset::open(dir.path(), rgb_config(), MockBackend::new().0, None).unwrap();
    assert_eq!(dataset.total_rows(), 12);

    let config = DatasetConfig {
        modalities: vec![Modality::Rgb, Modality::SegInstanceId],
        ..rgb_config()
    };
    let err =
        EpisodeDataset::open(dir.path(), config, MockBackend::new().0, None).unwrap_err();
    assert!(err.is_missing_file(), "{err:?}");
}

#[test]
fn test_failing_remote_propagates() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), &[(0, 12)], &["head"]);
    std::fs::remove_file(dir.path().join(layout::data_path(0))).unwrap();

    let err = EpisodeDataset::open(
        dir.path(),
        rgb_config(),
        MockBackend::new().0,
        Some(&demoset_core::sync::NoRemote),
    )
    .unwrap_err();
    assert!(matches!(err, LoaderError::SyncFailed { .. }), "{err:?}");
}

#[test]
fn test_corrupt_shard_detected() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), &[(0, 12)], &["head"]);
    let shard = dir.path().join(layout::data_path(0));
    let mut raw = std::fs::read(&shard).unwrap();
    let last = raw.len() - 1;
    raw[last] ^= 0xff;
    std::fs::write(&shard, raw).unwrap();

    let err = EpisodeDataset::open(dir.path(), rgb_config(), MockBackend::new().0, None)
        .unwrap_err();
    assert!(matches!(err, LoaderError::ShardCorrupt { .. }), "{err:?}");
}

#[test]
fn test_misaligned_timestamps_fail_fast() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), &[(0, 12)], &["head"]);

    // Rewrite the shard with one timestamp off the frame grid
    let mut rows = common::fixture_rows(0, 12);
    rows[7].timestamp += 0.01;
    demoset_core::data::records::write_shard(
        &dir.path().join(layout::data_path(0)),
        &rows,
        common::STATE_DIM,
        common::ACTION_DIM,
    )
    .unwrap();

    let err = EpisodeDataset::open(dir.path(), rgb_config(), MockBackend::new().0, None)
        .unwrap_err();
    assert!(matches!(err, LoaderError::TimestampSync { row: 7, .. }), "{err:?}");

    // The same dataset loads when the check is disabled
    let config = DatasetConfig {
        check_timestamp_sync: false,
        ..rgb_config()
    };
    assert!(EpisodeDataset::open(dir.path(), config, MockBackend::new().0, None).is_ok());
}

#[test]
fn test_episodes_per_task_truncation() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(
        dir.path(),
        &[(0, 12), (1, 12), (2, 12), (10_000, 12), (10_001, 12)],
        &["head"],
    );

    let config = DatasetConfig {
        episodes_per_task: Some(vec![0]),
        ..rgb_config()
    };
    let dataset =
        EpisodeDataset::open(dir.path(), config, MockBackend::new().0, None).unwrap();
    assert_eq!(dataset.num_episodes(), 2, "first episode of each task");
    assert_eq!(dataset.index().episodes(), &[0, 10_000]);
}

#[test]
fn test_task_filtering() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), &[(0, 12), (10_000, 12)], &["head"]);

    let config = DatasetConfig {
        tasks: Some(vec!["task_1".into()]),
        ..rgb_config()
    };
    let dataset =
        EpisodeDataset::open(dir.path(), config, MockBackend::new().0, None).unwrap();
    assert_eq!(dataset.index().episodes(), &[10_000]);
    assert_eq!(dataset.total_rows(), 12);
}

/// Remote stub that counts fetches; the default variant creates every
/// requested file, the broken variant does nothing.
#[derive(Default)]
struct CountingRemote {
    calls: Cell<usize>,
    broken: bool,
}

impl CountingRemote {
    fn broken() -> Self {
        Self {
            calls: Cell::new(0),
            broken: true,
        }
    }
}

impl RemoteSync for CountingRemote {
    fn fetch(&self, _root: &Path, missing: &[PathBuf]) -> Result<()> {
        self.calls.set(self.calls.get() + 1);
        if !self.broken {
            for path in missing {
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, b"").unwrap();
            }
        }
        Ok(())
    }
}
