//! Process-wide task registry.
//!
//! [`TaskRegistry`] is the single source of truth for task state: a map
//! from task id to the latest [`TaskSnapshot`]. It is an explicit object —
//! the server holds it in shared state and passes it to every handler and
//! runner — never a global. A process restart loses all task visibility,
//! which is acceptable for the current scope.
//!
//! Every mutation replaces the stored snapshot wholesale under a write
//! lock, so a concurrent poller either sees the previous snapshot or the
//! new one, never a torn mixture. Each task has exactly one writer (its own
//! runner); different tasks only share the map itself.
//!
//! Completed and failed tasks are retained until
//! [`evict_terminal_older_than`](TaskRegistry::evict_terminal_older_than)
//! removes them; the server sweeps on a fixed interval so the map does not
//! grow without bound.

use std::{
    collections::HashMap,
    sync::RwLock,
    time::{Duration, Instant},
};

use uuid::Uuid;

use crate::task::{ExtractionResult, TaskSnapshot, TaskStatus};

/// One registry slot: the public snapshot plus the terminal timestamp used
/// for eviction.
struct TaskRecord {
    snapshot: TaskSnapshot,
    terminal_at: Option<Instant>,
}

/// Concurrent map from task id to task state.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<Uuid, TaskRecord>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new task id and register it in the `Queued` state.
    ///
    /// This happens atomically before the asynchronous unit of work is
    /// scheduled, so a poll racing the submission already sees `queued`.
    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let record = TaskRecord {
            snapshot: TaskSnapshot::queued(id),
            terminal_at: None,
        };
        self.write().insert(id, record);
        log::debug!("Registered task {id} (queued)");
        id
    }

    /// Fetch the current snapshot for `id`, if the task exists.
    pub fn get(&self, id: Uuid) -> Option<TaskSnapshot> {
        self.read().get(&id).map(|record| record.snapshot.clone())
    }

    /// Record a progress update, transitioning `Queued → Processing` on the
    /// first call.
    ///
    /// Progress never decreases and never reaches `1.0` through this path;
    /// `1.0` is reserved for [`complete`](TaskRegistry::complete). Updates
    /// against terminal or unknown tasks are ignored.
    pub fn update_progress(&self, id: Uuid, progress: f32) {
        let mut tasks = self.write();
        let Some(record) = tasks.get_mut(&id) else {
            return;
        };
        if record.snapshot.is_terminal() {
            return;
        }

        let clamped = progress.clamp(record.snapshot.progress, 0.99);
        record.snapshot = TaskSnapshot {
            status: TaskStatus::Processing,
            progress: clamped,
            ..record.snapshot.clone()
        };
    }

    /// Transition `id` to `Completed` with the given result.
    ///
    /// Pins progress to `1.0`. No-op for terminal or unknown tasks.
    pub fn complete(&self, id: Uuid, result: ExtractionResult) {
        let mut tasks = self.write();
        let Some(record) = tasks.get_mut(&id) else {
            return;
        };
        if record.snapshot.is_terminal() {
            return;
        }

        log::info!(
            "Task {id} completed with {} extracted frames",
            result.frames.len(),
        );
        record.snapshot = TaskSnapshot {
            id,
            status: TaskStatus::Completed,
            progress: 1.0,
            result: Some(result),
            error: None,
        };
        record.terminal_at = Some(Instant::now());
    }

    /// Transition `id` to `Failed`, recording a human-readable reason.
    ///
    /// Progress is frozen at its last value. No-op for terminal or unknown
    /// tasks.
    pub fn fail(&self, id: Uuid, error: impl Into<String>) {
        let mut tasks = self.write();
        let Some(record) = tasks.get_mut(&id) else {
            return;
        };
        if record.snapshot.is_terminal() {
            return;
        }

        let error = error.into();
        log::warn!("Task {id} failed: {error}");
        record.snapshot = TaskSnapshot {
            id,
            status: TaskStatus::Failed,
            progress: record.snapshot.progress,
            result: None,
            error: Some(error),
        };
        record.terminal_at = Some(Instant::now());
    }

    /// Remove tasks that reached a terminal state more than `ttl` ago.
    ///
    /// Returns the number of evicted tasks. In-flight tasks are never
    /// touched.
    pub fn evict_terminal_older_than(&self, ttl: Duration) -> usize {
        let mut tasks = self.write();
        let before = tasks.len();
        tasks.retain(|_, record| match record.terminal_at {
            Some(at) => at.elapsed() < ttl,
            None => true,
        });
        let evicted = before - tasks.len();
        if evicted > 0 {
            log::debug!("Evicted {evicted} terminal task(s) older than {ttl:?}");
        }
        evicted
    }

    /// Number of tracked tasks (any state).
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the registry tracks no tasks at all.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, TaskRecord>> {
        // A poisoned lock means a panic while holding the guard; the map
        // itself is still structurally sound, so keep serving.
        self.tasks.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, TaskRecord>> {
        self.tasks.write().unwrap_or_else(|e| e.into_inner())
    }
}
