//! Error types for the `stillcut` crate.
//!
//! This module defines [`StillcutError`], the unified error type returned by
//! all fallible operations in the crate. Errors carry enough context to
//! diagnose the problem without additional logging at the call site.
//!
//! Two failure modes from the extraction pipeline are deliberately *not*
//! errors: a frame that fails to upload degrades to a placeholder locator
//! ([`StoreOutcome::Degraded`](crate::StoreOutcome)), and an archive item
//! that cannot be fetched is recorded in the
//! [`ArchiveManifest`](crate::ArchiveManifest) while the archive is still
//! produced.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;
use uuid::Uuid;
use zip::result::ZipError;

/// The unified error type for all `stillcut` operations.
///
/// Every public method that can fail returns `Result<T, StillcutError>`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StillcutError {
    /// The source video could not be opened or is not a decodable container.
    ///
    /// Fatal for the task that owns the video: it transitions straight to
    /// `failed` without ever reaching `processing`.
    #[error("Failed to open media file at {path}: {reason}")]
    MediaOpen {
        /// Path to the video that was submitted for extraction.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The container opened but declared no decodable frames.
    ///
    /// Fatal for the owning task, same as [`MediaOpen`](Self::MediaOpen).
    #[error("No decodable frames in media file at {path}")]
    EmptyMedia {
        /// Path to the offending video.
        path: PathBuf,
    },

    /// A video frame could not be decoded mid-stream.
    #[error("Failed to decode video frame: {0}")]
    Decode(String),

    /// A decoded frame could not be persisted locally.
    ///
    /// Non-fatal: the extraction loop logs the failure, skips the frame, and
    /// continues.
    #[error("Failed to write frame to {path}: {reason}")]
    FrameWrite {
        /// Destination path of the frame image.
        path: PathBuf,
        /// Underlying reason the write failed.
        reason: String,
    },

    /// An archive item could not be fetched via either the direct URL or the
    /// authenticated store fallback.
    ///
    /// Non-fatal for the archive as a whole: the item is excluded and the
    /// failure recorded in the manifest.
    #[error("Failed to fetch {locator}: {reason}")]
    Fetch {
        /// The locator that could not be resolved.
        locator: String,
        /// Underlying reason the fetch failed.
        reason: String,
    },

    /// The uploaded file's extension is not an accepted format.
    #[error("Unsupported file format: {0:?}")]
    UnsupportedFormat(String),

    /// No task with the given id exists in the registry.
    #[error("Task {0} not found")]
    TaskNotFound(Uuid),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    /// The HTTP client for the remote store could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// An error from the `image` crate during frame encoding.
    #[error("Image processing error: {0}")]
    Image(#[from] ImageError),

    /// Reading or writing the label CSV failed.
    #[error("Label CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Writing the output archive failed.
    #[error("Archive error: {0}")]
    Archive(#[from] ZipError),

    /// Serializing a JSON payload (task snapshot, manifest) failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<FfmpegError> for StillcutError {
    fn from(error: FfmpegError) -> Self {
        StillcutError::Ffmpeg(error.to_string())
    }
}
