//! # stillcut
//!
//! Extract still frames from uploaded video files, track extraction
//! progress asynchronously, and bundle selected frames — with their
//! human-entered classification labels — for download.
//!
//! The core of the crate is the asynchronous frame-extraction pipeline:
//!
//! - [`VideoSource`] decodes a video container and yields one image per
//!   frame, lazily and in presentation order ([`FrameSource`] is the seam
//!   for alternative sources).
//! - [`TaskRegistry`] is the process-wide map from task id to task state;
//!   pollers always read a consistent [`TaskSnapshot`].
//! - [`TaskRunner`] drives a source asynchronously, persists each frame,
//!   hands it to the [`ObjectStore`], reports fractional progress, and
//!   cleans up scratch space on every exit path.
//! - [`ArchiveBuilder`] assembles a zip of selected frames on demand,
//!   tolerating per-item fetch failures and recording them in an
//!   [`ArchiveManifest`].
//!
//! Everything else — routing, CORS, static files, CSV labels — is thin
//! plumbing in [`server`] and [`labels`].
//!
//! ## Quick start
//!
//! ```no_run
//! use std::{path::PathBuf, sync::Arc, time::Duration};
//!
//! use stillcut::{ObjectStore, TaskRegistry, TaskRunner};
//!
//! # async fn example() -> Result<(), stillcut::StillcutError> {
//! let registry = Arc::new(TaskRegistry::new());
//! let store = Arc::new(ObjectStore::disabled()?);
//! let runner = TaskRunner::new(registry.clone(), store, PathBuf::from("output"));
//!
//! let task_id = registry.create();
//! runner.spawn_video_task(task_id, PathBuf::from("input.mp4"), "input".into());
//!
//! // Poll until the task reaches a terminal state.
//! loop {
//!     let snapshot = registry.get(task_id).unwrap();
//!     if snapshot.is_terminal() {
//!         break;
//!     }
//!     tokio::time::sleep(Duration::from_millis(200)).await;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on the host; decoding is
//! done in-process via the [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next)
//! crate.

pub mod archive;
pub mod error;
pub mod extractor;
pub mod labels;
pub mod naming;
pub mod registry;
pub mod runner;
pub mod server;
pub mod store;
pub mod task;

pub use archive::{ArchiveBuilder, ArchiveItem, ArchiveManifest, BuiltArchive, ItemOutcome};
pub use error::StillcutError;
pub use extractor::{FrameSource, VideoSource};
pub use labels::{LabelEntry, read_labels, write_labels};
pub use registry::TaskRegistry;
pub use runner::TaskRunner;
pub use server::{AppState, router};
pub use store::{ObjectStore, RemoteStoreConfig, StoreOutcome};
pub use task::{ExtractionResult, FrameDescriptor, TaskSnapshot, TaskStatus};
