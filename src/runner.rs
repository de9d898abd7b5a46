//! Asynchronous task execution.
//!
//! [`TaskRunner`] drives one frame-extraction task from `queued` to a
//! terminal state. Decoding is CPU-bound FFmpeg work, so it runs on
//! `tokio::task::spawn_blocking` and streams frames back through a bounded
//! channel; the async side persists each frame, hands it to the object
//! store, appends a [`FrameDescriptor`] to the in-progress result, and
//! updates registry progress. This keeps the Tokio runtime's cooperative
//! budget free of decode work while uploads overlap with decoding.
//!
//! Cleanup is unconditional: the uploaded source video is deleted on every
//! exit path, and the per-task output directory is removed whenever its
//! contents are no longer referenced by locators (always on failure; on
//! completion only when frames were shipped to a remote store).

use std::{path::PathBuf, sync::Arc};

use tokio::sync::mpsc::{self, Receiver};
use uuid::Uuid;

use crate::{
    error::StillcutError,
    extractor::{FrameSource, VideoSource},
    registry::TaskRegistry,
    store::ObjectStore,
    task::{ExtractionResult, FrameDescriptor},
};

/// Bounded-channel capacity between the decode thread and the consumer.
///
/// Kept small to avoid buffering many large decoded frames in memory.
const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Events sent from the blocking decode thread to the async consumer.
enum FrameEvent {
    /// The source opened successfully and declared this many frames.
    Opened { declared_frames: u64 },
    /// One decoded frame, in presentation order.
    Frame(image::DynamicImage),
    /// Opening or decoding failed; no further events follow.
    Error(StillcutError),
}

/// Drives frame-extraction tasks and owns their scratch space layout.
///
/// One `TaskRunner` serves the whole process; each
/// [`spawn_video_task`](TaskRunner::spawn_video_task) call runs
/// independently on its own tokio task.
#[derive(Clone)]
pub struct TaskRunner {
    registry: Arc<TaskRegistry>,
    store: Arc<ObjectStore>,
    /// Root under which each task gets an `<output_root>/<task-id>/`
    /// directory for extracted frames.
    output_root: PathBuf,
}

impl TaskRunner {
    /// Create a runner that records state in `registry`, ships frames to
    /// `store`, and writes scratch output under `output_root`.
    pub fn new(registry: Arc<TaskRegistry>, store: Arc<ObjectStore>, output_root: PathBuf) -> Self {
        Self {
            registry,
            store,
            output_root,
        }
    }

    /// Start extraction of `video_path` as an independent unit of work.
    ///
    /// Returns immediately; progress and the eventual result are observable
    /// only through the registry under `task_id`. The task id must already
    /// be registered as `queued` — the submission endpoint does that before
    /// scheduling, so a racing poll never sees an unknown id.
    pub fn spawn_video_task(&self, task_id: Uuid, video_path: PathBuf, video_name: String) {
        let runner = self.clone();
        tokio::spawn(async move {
            let source_path = video_path.clone();
            runner
                .run_from_source(task_id, video_name, Some(video_path), move || {
                    VideoSource::open(&source_path).map(|s| Box::new(s) as Box<dyn FrameSource>)
                })
                .await;
        });
    }

    /// Run one task to its terminal state using the source produced by
    /// `open_source`.
    ///
    /// `source_video` is the uploaded temporary file to delete when the
    /// task ends, if any. The factory runs on the blocking decode thread so
    /// non-`Send` sources (FFmpeg contexts) never cross threads. This is
    /// the seam integration tests drive with synthetic sources.
    pub async fn run_from_source<F>(
        &self,
        task_id: Uuid,
        video_name: String,
        source_video: Option<PathBuf>,
        open_source: F,
    ) where
        F: FnOnce() -> Result<Box<dyn FrameSource>, StillcutError> + Send + 'static,
    {
        let output_dir = self.output_root.join(task_id.to_string());

        let (sender, receiver) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let decode = tokio::task::spawn_blocking(move || {
            let mut source = match open_source() {
                Ok(source) => source,
                Err(error) => {
                    let _ = sender.blocking_send(FrameEvent::Error(error));
                    return;
                }
            };

            let _ = sender.blocking_send(FrameEvent::Opened {
                declared_frames: source.declared_frames(),
            });

            loop {
                match source.next_frame() {
                    Ok(Some(frame)) => {
                        if sender.blocking_send(FrameEvent::Frame(frame)).is_err() {
                            // Consumer went away; stop decoding.
                            return;
                        }
                    }
                    Ok(None) => return,
                    Err(error) => {
                        let _ = sender.blocking_send(FrameEvent::Error(error));
                        return;
                    }
                }
            }
        });

        let outcome = self
            .consume_frames(task_id, &video_name, &output_dir, receiver)
            .await;
        // The decode thread ends when the channel drains or the consumer
        // drops the receiver; its errors arrive as events.
        let _ = decode.await;

        // Cleanup runs on every exit path before the terminal transition.
        let keep_output = outcome.is_ok() && !self.store.is_remote();
        cleanup_scratch(source_video.as_deref(), &output_dir, keep_output).await;

        match outcome {
            Ok(result) => self.registry.complete(task_id, result),
            Err(error) => self.registry.fail(task_id, error.to_string()),
        }
    }

    /// The extraction loop proper: persists frames, hands them to the
    /// store, and reports capped progress.
    async fn consume_frames(
        &self,
        task_id: Uuid,
        video_name: &str,
        output_dir: &std::path::Path,
        mut receiver: Receiver<FrameEvent>,
    ) -> Result<ExtractionResult, StillcutError> {
        let declared_frames = match receiver.recv().await {
            Some(FrameEvent::Opened { declared_frames }) => declared_frames,
            Some(FrameEvent::Error(error)) => return Err(error),
            Some(FrameEvent::Frame(_)) | None => {
                return Err(StillcutError::Decode(
                    "decode thread ended before reporting an opened source".to_string(),
                ));
            }
        };

        if declared_frames == 0 {
            return Err(StillcutError::EmptyMedia {
                path: PathBuf::from(video_name),
            });
        }

        tokio::fs::create_dir_all(output_dir).await?;

        let mut frames: Vec<FrameDescriptor> = Vec::new();
        let mut frames_consumed: u64 = 0;

        while let Some(event) = receiver.recv().await {
            let frame = match event {
                FrameEvent::Frame(frame) => frame,
                FrameEvent::Error(error) => return Err(error),
                FrameEvent::Opened { .. } => continue,
            };

            let sequence_number = frames.len() as u64;
            let display_name = crate::naming::frame_display_name(video_name, sequence_number);
            let frame_path = output_dir.join(&display_name);

            frames_consumed += 1;

            if let Err(error) = frame.save(&frame_path) {
                // WriteError is non-fatal: log, skip the frame, keep going.
                log::warn!(
                    "Task {task_id}: failed to write frame {sequence_number} to {}: {error}",
                    frame_path.display(),
                );
            } else {
                let outcome = self.store.store(&frame_path, &display_name).await;

                // Ownership of the bytes transferred to the remote store;
                // the local copy is deleted whatever the upload outcome.
                if self.store.is_remote() {
                    if let Err(error) = tokio::fs::remove_file(&frame_path).await {
                        log::warn!(
                            "Task {task_id}: failed to remove local copy {}: {error}",
                            frame_path.display(),
                        );
                    }
                }

                frames.push(FrameDescriptor::new(
                    video_name,
                    sequence_number,
                    outcome.locator().to_string(),
                ));
            }

            // 1.0 is reserved for the completed transition; the cap keeps
            // an inaccurate declared count from reporting early completion.
            let progress = (frames_consumed as f32 / declared_frames as f32).min(0.99);
            self.registry.update_progress(task_id, progress);
        }

        // Drained without error. Zero decoded frames is not itself a
        // failure when the container claimed frames existed.
        log::info!(
            "Task {task_id}: extracted {} of ~{declared_frames} declared frames",
            frames.len(),
        );

        let total_frames = frames.len() as u64;
        Ok(ExtractionResult {
            frames,
            total_frames,
        })
    }
}

/// Release a task's temporary resources.
///
/// Best-effort on every path: failures are logged, never propagated.
async fn cleanup_scratch(
    source_video: Option<&std::path::Path>,
    output_dir: &std::path::Path,
    keep_output: bool,
) {
    if let Some(path) = source_video {
        if let Err(error) = tokio::fs::remove_file(path).await {
            if path.exists() {
                log::warn!("Failed to remove source video {}: {error}", path.display());
            }
        }
    }

    if !keep_output && output_dir.exists() {
        if let Err(error) = tokio::fs::remove_dir_all(output_dir).await {
            log::warn!(
                "Failed to remove output directory {}: {error}",
                output_dir.display(),
            );
        }
    }
}
