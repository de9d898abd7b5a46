//! Task state machine integration tests.
//!
//! These drive the runner through `run_from_source` with synthetic frame
//! sources, so every lifecycle path is covered without media fixtures.

use std::{path::PathBuf, sync::Arc};

use image::{DynamicImage, Rgb, RgbImage};
use stillcut::{
    FrameSource, ObjectStore, StillcutError, TaskRegistry, TaskRunner, TaskStatus,
};

/// A deterministic in-memory frame source.
struct SyntheticSource {
    declared: u64,
    remaining: u64,
    /// Fail with a decode error once `remaining` reaches this value.
    fail_at_remaining: Option<u64>,
}

impl SyntheticSource {
    fn with_frames(count: u64) -> Self {
        Self {
            declared: count,
            remaining: count,
            fail_at_remaining: None,
        }
    }

    fn declaring(mut self, declared: u64) -> Self {
        self.declared = declared;
        self
    }

    fn failing_after(mut self, yielded: u64) -> Self {
        self.fail_at_remaining = Some(self.remaining.saturating_sub(yielded));
        self
    }

    fn frame() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([40, 80, 120])))
    }
}

impl FrameSource for SyntheticSource {
    fn declared_frames(&self) -> u64 {
        self.declared
    }

    fn next_frame(&mut self) -> Result<Option<DynamicImage>, StillcutError> {
        if Some(self.remaining) == self.fail_at_remaining {
            return Err(StillcutError::Decode("synthetic decode failure".into()));
        }
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(Self::frame()))
    }
}

struct Harness {
    registry: Arc<TaskRegistry>,
    runner: TaskRunner,
    _output_root: tempfile::TempDir,
    output_path: PathBuf,
}

fn harness() -> Harness {
    let registry = Arc::new(TaskRegistry::new());
    let store = Arc::new(ObjectStore::disabled().expect("build store"));
    let output_root = tempfile::tempdir().expect("tempdir");
    let output_path = output_root.path().to_path_buf();
    let runner = TaskRunner::new(registry.clone(), store, output_path.clone());
    Harness {
        registry,
        runner,
        _output_root: output_root,
        output_path,
    }
}

#[tokio::test]
async fn ten_frame_video_completes_with_contiguous_descriptors() {
    let h = harness();
    let task_id = h.registry.create();

    h.runner
        .run_from_source(task_id, "clip".to_string(), None, || {
            Ok(Box::new(SyntheticSource::with_frames(10)) as Box<dyn FrameSource>)
        })
        .await;

    let snapshot = h.registry.get(task_id).expect("task vanished");
    assert_eq!(snapshot.status, TaskStatus::Completed);
    assert_eq!(snapshot.progress, 1.0);
    assert!(snapshot.error.is_none());

    let result = snapshot.result.expect("completed task has no result");
    assert_eq!(result.total_frames, 10);
    assert_eq!(result.frames.len(), 10);

    for (index, frame) in result.frames.iter().enumerate() {
        assert_eq!(frame.sequence_number, index as u64);
        assert_eq!(frame.display_name, format!("clip-{index:04}.jpg"));
        assert_eq!(frame.source_video_name, "clip");
        // Store is disabled: locators are local paths that must resolve.
        assert!(
            std::path::Path::new(&frame.locator).exists(),
            "locator {} does not exist",
            frame.locator,
        );
    }

    // All ids are distinct.
    let ids: std::collections::HashSet<_> = result.frames.iter().map(|f| f.id).collect();
    assert_eq!(ids.len(), 10);
}

#[tokio::test]
async fn open_failure_goes_straight_from_queued_to_failed() {
    let h = harness();
    let task_id = h.registry.create();

    h.runner
        .run_from_source(task_id, "broken".to_string(), None, || {
            Err(StillcutError::MediaOpen {
                path: PathBuf::from("broken.mp4"),
                reason: "not a container".to_string(),
            })
        })
        .await;

    let snapshot = h.registry.get(task_id).expect("task vanished");
    assert_eq!(snapshot.status, TaskStatus::Failed);
    // Processing was never reached, so no progress update ever landed.
    assert_eq!(snapshot.progress, 0.0);
    assert!(snapshot.result.is_none());
    let error = snapshot.error.expect("failed task has no error");
    assert!(error.contains("broken.mp4"), "unexpected error: {error}");
}

#[tokio::test]
async fn mid_stream_decode_failure_freezes_progress() {
    let h = harness();
    let task_id = h.registry.create();

    h.runner
        .run_from_source(task_id, "clip".to_string(), None, || {
            Ok(Box::new(SyntheticSource::with_frames(10).failing_after(4))
                as Box<dyn FrameSource>)
        })
        .await;

    let snapshot = h.registry.get(task_id).expect("task vanished");
    assert_eq!(snapshot.status, TaskStatus::Failed);
    assert!(snapshot.error.is_some());
    assert!(snapshot.progress < 1.0);
    let frozen = snapshot.progress;

    // Terminal state: later updates must not move anything.
    h.registry.update_progress(task_id, 0.95);
    let after = h.registry.get(task_id).expect("task vanished");
    assert_eq!(after.status, TaskStatus::Failed);
    assert_eq!(after.progress, frozen);

    // Failure cleans up the task's output directory.
    assert!(!h.output_path.join(task_id.to_string()).exists());
}

#[tokio::test]
async fn zero_declared_frames_is_fatal() {
    let h = harness();
    let task_id = h.registry.create();

    h.runner
        .run_from_source(task_id, "empty".to_string(), None, || {
            Ok(Box::new(SyntheticSource::with_frames(0)) as Box<dyn FrameSource>)
        })
        .await;

    let snapshot = h.registry.get(task_id).expect("task vanished");
    assert_eq!(snapshot.status, TaskStatus::Failed);
    assert!(snapshot.error.is_some());
}

#[tokio::test]
async fn declared_frames_without_decodable_output_completes_empty() {
    let h = harness();
    let task_id = h.registry.create();

    // Container claims 25 frames but the decode loop drains immediately.
    h.runner
        .run_from_source(task_id, "stub".to_string(), None, || {
            Ok(Box::new(SyntheticSource::with_frames(0).declaring(25)) as Box<dyn FrameSource>)
        })
        .await;

    let snapshot = h.registry.get(task_id).expect("task vanished");
    assert_eq!(snapshot.status, TaskStatus::Completed);
    assert_eq!(snapshot.progress, 1.0);
    let result = snapshot.result.expect("completed task has no result");
    assert!(result.frames.is_empty());
    assert_eq!(result.total_frames, 0);
}

#[tokio::test]
async fn source_video_is_deleted_on_every_exit_path() {
    let h = harness();

    // Success path.
    let ok_video = h.output_path.join("ok-source.mp4");
    std::fs::write(&ok_video, b"fake video").expect("write");
    let ok_id = h.registry.create();
    h.runner
        .run_from_source(ok_id, "clip".to_string(), Some(ok_video.clone()), || {
            Ok(Box::new(SyntheticSource::with_frames(2)) as Box<dyn FrameSource>)
        })
        .await;
    assert!(!ok_video.exists());

    // Failure path.
    let bad_video = h.output_path.join("bad-source.mp4");
    std::fs::write(&bad_video, b"fake video").expect("write");
    let bad_id = h.registry.create();
    h.runner
        .run_from_source(bad_id, "clip".to_string(), Some(bad_video.clone()), || {
            Err(StillcutError::MediaOpen {
                path: PathBuf::from("bad-source.mp4"),
                reason: "unreadable".to_string(),
            })
        })
        .await;
    assert!(!bad_video.exists());
}

#[tokio::test]
async fn unwritable_frame_is_skipped_and_extraction_continues() {
    let h = harness();
    let task_id = h.registry.create();

    // Occupy the third frame's save path with a directory so the write
    // fails; every later frame collides with the same path, since sequence
    // numbers only advance for frames that actually land.
    let task_dir = h.output_path.join(task_id.to_string());
    std::fs::create_dir_all(task_dir.join("clip-0002.jpg")).expect("create collision dir");

    h.runner
        .run_from_source(task_id, "clip".to_string(), None, || {
            Ok(Box::new(SyntheticSource::with_frames(10)) as Box<dyn FrameSource>)
        })
        .await;

    let snapshot = h.registry.get(task_id).expect("task vanished");
    assert_eq!(snapshot.status, TaskStatus::Completed);
    assert_eq!(snapshot.progress, 1.0);
    assert!(snapshot.error.is_none());

    // Only the writable frames made it, with contiguous sequence numbers.
    let result = snapshot.result.expect("completed task has no result");
    assert_eq!(result.frames.len(), 2);
    for (index, frame) in result.frames.iter().enumerate() {
        assert_eq!(frame.sequence_number, index as u64);
        assert!(std::path::Path::new(&frame.locator).exists());
    }
}

#[tokio::test]
async fn progress_is_capped_below_one_while_processing() {
    let h = harness();
    let task_id = h.registry.create();

    // Declared count is far too low: consumed/declared would exceed 1.0
    // long before the stream drains.
    h.runner
        .run_from_source(task_id, "clip".to_string(), None, || {
            Ok(Box::new(SyntheticSource::with_frames(6).declaring(2)) as Box<dyn FrameSource>)
        })
        .await;

    let snapshot = h.registry.get(task_id).expect("task vanished");
    // The run still completes; 1.0 only ever comes from the completed
    // transition, which this exercises end to end.
    assert_eq!(snapshot.status, TaskStatus::Completed);
    assert_eq!(snapshot.progress, 1.0);
    assert_eq!(snapshot.result.expect("no result").frames.len(), 6);
}

// ── registry-level properties ──────────────────────────────────────

#[tokio::test]
async fn registry_progress_is_monotone_and_capped() {
    let registry = TaskRegistry::new();
    let id = registry.create();

    registry.update_progress(id, 0.5);
    assert_eq!(registry.get(id).unwrap().progress, 0.5);
    assert_eq!(registry.get(id).unwrap().status, TaskStatus::Processing);

    // Regressions are ignored.
    registry.update_progress(id, 0.3);
    assert_eq!(registry.get(id).unwrap().progress, 0.5);

    // Overshoot is capped below 1.0.
    registry.update_progress(id, 5.0);
    assert_eq!(registry.get(id).unwrap().progress, 0.99);
}

#[tokio::test]
async fn registry_evicts_only_stale_terminal_tasks() {
    let registry = TaskRegistry::new();

    let done = registry.create();
    registry.complete(
        done,
        stillcut::ExtractionResult {
            frames: Vec::new(),
            total_frames: 0,
        },
    );
    let in_flight = registry.create();
    registry.update_progress(in_flight, 0.4);

    let evicted = registry.evict_terminal_older_than(std::time::Duration::ZERO);
    assert_eq!(evicted, 1);
    assert!(registry.get(done).is_none());
    assert!(registry.get(in_flight).is_some());

    // A generous TTL keeps fresh terminal tasks around.
    let done_again = registry.create();
    registry.fail(done_again, "boom");
    let evicted = registry.evict_terminal_older_than(std::time::Duration::from_secs(3600));
    assert_eq!(evicted, 0);
    assert!(registry.get(done_again).is_some());
}

#[tokio::test]
async fn unknown_task_reads_and_writes_are_safe() {
    let registry = TaskRegistry::new();
    let ghost = uuid::Uuid::new_v4();

    assert!(registry.get(ghost).is_none());
    registry.update_progress(ghost, 0.5);
    registry.fail(ghost, "nope");
    assert!(registry.get(ghost).is_none());
    assert!(registry.is_empty());
}
