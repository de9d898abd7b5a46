//! FFmpeg-backed extraction tests.
//!
//! Decode tests require fixture media under `tests/fixtures/` (see
//! `tests/fixtures/README.md`) and are skipped when it is absent; the
//! error-path tests always run.

use std::path::Path;

use stillcut::{FrameSource, StillcutError, VideoSource};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

#[test]
fn open_nonexistent_file() {
    let result = VideoSource::open("this_file_does_not_exist.mp4");
    assert!(result.is_err());

    let error_message = result.err().map(|e| e.to_string()).unwrap_or_default();
    assert!(
        error_message.contains("Failed to open media file"),
        "Error message should mention file open failure: {error_message}",
    );
}

#[test]
fn open_invalid_file() {
    // A file with garbage content must fail at open, not mid-decode.
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let result = VideoSource::open(&invalid_file_path);
    assert!(
        matches!(
            result,
            Err(StillcutError::MediaOpen { .. }) | Err(StillcutError::EmptyMedia { .. }),
        ),
        "Expected an open-time error for an invalid media file",
    );
}

#[test]
fn declared_frames_positive_for_fixture() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = VideoSource::open(path).expect("Failed to open fixture");
    assert!(source.declared_frames() > 0);
}

#[test]
fn frames_come_out_in_order_and_drain() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut source = VideoSource::open(path).expect("Failed to open fixture");
    let mut decoded = 0u64;

    while let Some(frame) = source.next_frame().expect("Decode failed") {
        assert!(frame.width() > 0);
        assert!(frame.height() > 0);
        decoded += 1;
    }

    assert!(decoded > 0, "Fixture produced no frames");

    // The sequence is non-restartable: once drained it stays drained.
    assert!(source.next_frame().expect("Decode failed").is_none());
}
