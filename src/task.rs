//! Task lifecycle data model.
//!
//! A [`TaskSnapshot`] is the unit the registry stores and the status
//! endpoint returns verbatim: id, state, fractional progress, and — in a
//! terminal state — either the ordered list of extracted frames or a
//! human-readable failure reason. Snapshots are immutable values; the
//! runner replaces the whole snapshot on every update so a polling reader
//! can never observe a half-written state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::naming;

/// Lifecycle state of an extraction task.
///
/// Transitions are strictly `Queued → Processing → {Completed, Failed}`,
/// with the single exception that a task whose video cannot be opened goes
/// straight from `Queued` to `Failed`. Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, extraction not yet started.
    Queued,
    /// The extraction loop is consuming frames.
    Processing,
    /// All frames drained; `result` is present and progress is `1.0`.
    Completed,
    /// Extraction aborted; `error` is present and progress is frozen.
    Failed,
}

/// Metadata record for one extracted frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    /// Unique id, assigned when the frame is extracted.
    pub id: Uuid,
    /// Retrievable reference to the frame asset: a local path, or a remote
    /// URL once the Object Store Adapter has taken ownership of the bytes.
    pub locator: String,
    /// Zero-based ordinal matching decode order. Contiguous within a
    /// completed task's result.
    pub sequence_number: u64,
    /// Deterministic display name, `<video-name>-<NNNN>.jpg`.
    pub display_name: String,
    /// Sanitized base name of the originating video, used for display and
    /// archive grouping.
    pub source_video_name: String,
}

impl FrameDescriptor {
    /// Build a descriptor for the frame at `sequence_number` of
    /// `video_name`, with a freshly assigned id.
    pub fn new(video_name: &str, sequence_number: u64, locator: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            locator,
            sequence_number,
            display_name: naming::frame_display_name(video_name, sequence_number),
            source_video_name: video_name.to_string(),
        }
    }
}

/// The result attached to a completed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Extracted frames, ordered by sequence number.
    pub frames: Vec<FrameDescriptor>,
    /// Number of frames actually extracted (`frames.len()`); kept as an
    /// explicit field for clients that only need the count.
    pub total_frames: u64,
}

/// A point-in-time view of one task, returned verbatim by status polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Opaque unique identifier, assigned at creation.
    pub id: Uuid,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Fraction complete in `[0.0, 1.0]`. Monotonically non-decreasing
    /// while processing, pinned to `1.0` on completion, frozen on failure.
    pub progress: f32,
    /// Present only when `status == Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExtractionResult>,
    /// Present only when `status == Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskSnapshot {
    /// A fresh snapshot in the `Queued` state with zero progress.
    pub fn queued(id: Uuid) -> Self {
        Self {
            id,
            status: TaskStatus::Queued,
            progress: 0.0,
            result: None,
            error: None,
        }
    }

    /// Whether the task has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Failed)
    }
}
