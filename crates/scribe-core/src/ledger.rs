use std::{
    collections::HashMap,
    io::ErrorKind,
    path::Path,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use tracing::{debug, info, warn};

use scribe_model::{TaskId, TaskStatus};

use crate::error::CoreError;

type Entries = HashMap<TaskId, TaskStatus>;

/// Latest status of every task accepted since the ledger was created or loaded.
///
/// Records are never deleted. Every operation takes the lock for exactly one
/// read or one write; no guard escapes a method, so no lock is held across an `.await`.
#[derive(Clone, Default)]
pub struct Ledger {
    inner: Arc<RwLock<Entries>>,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly accepted task.
    pub fn insert_pending(&self, id: TaskId) {
        self.write().insert(id, TaskStatus::Pending);
    }

    /// Overwrite the status of a task, returning the previous value.
    ///
    /// `Undefined` is a query-time sentinel and is never stored.
    pub fn set(&self, id: &TaskId, status: TaskStatus) -> Option<TaskStatus> {
        if status == TaskStatus::Undefined {
            warn!(task_id = %id, "refusing to store undefined status");
            return self.get(id);
        }
        self.write().insert(id.clone(), status)
    }

    /// Set `status` unless the task already holds a terminal value.
    ///
    /// Check and write happen under one lock acquisition.
    /// Returns `Err(current)` when the existing terminal value was kept.
    pub fn mark_unless_terminal(
        &self,
        id: &TaskId,
        status: TaskStatus,
    ) -> Result<Option<TaskStatus>, TaskStatus> {
        if status == TaskStatus::Undefined {
            return Err(self.status(id));
        }
        let mut entries = self.write();
        match entries.get(id) {
            Some(current) if current.is_terminal() => Err(*current),
            _ => Ok(entries.insert(id.clone(), status)),
        }
    }

    /// Stored status, if the task is known.
    pub fn get(&self, id: &TaskId) -> Option<TaskStatus> {
        self.read().get(id).copied()
    }

    /// Stored status, or `Undefined` for unknown identifiers.
    pub fn status(&self, id: &TaskId) -> TaskStatus {
        self.get(id).unwrap_or(TaskStatus::Undefined)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy of the full mapping.
    pub fn snapshot(&self) -> HashMap<TaskId, TaskStatus> {
        self.read().clone()
    }

    /// Number of tasks per status.
    pub fn count_by_status(&self) -> HashMap<TaskStatus, usize> {
        let entries = self.read();
        let mut counts = HashMap::new();
        for status in entries.values() {
            *counts.entry(*status).or_insert(0) += 1;
        }
        counts
    }

    /// Load a snapshot written by [`Ledger::persist`]; a missing file yields an empty ledger.
    pub async fn load(path: &Path) -> Result<Self, CoreError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no ledger snapshot; starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut entries: Entries = serde_json::from_slice(&bytes)?;
        entries.retain(|id, status| {
            let keep = *status != TaskStatus::Undefined;
            if !keep {
                warn!(task_id = %id, "dropping undefined entry from snapshot");
            }
            keep
        });
        info!(path = %path.display(), tasks = entries.len(), "ledger loaded from previous snapshot");

        Ok(Self {
            inner: Arc::new(RwLock::new(entries)),
        })
    }

    /// Overwrite `path` with the full mapping. Returns the number of persisted tasks.
    ///
    /// Written to a sibling temporary file first, then renamed into place.
    pub async fn persist(&self, path: &Path) -> Result<usize, CoreError> {
        let entries = self.snapshot();
        let bytes = serde_json::to_vec(&entries)?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;

        info!(path = %path.display(), tasks = entries.len(), "ledger saved");
        Ok(entries.len())
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get_task() {
        let ledger = Ledger::new();
        let id = TaskId::from("task-1");

        ledger.insert_pending(id.clone());

        assert_eq!(ledger.get(&id), Some(TaskStatus::Pending));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn unknown_task_is_undefined() {
        let ledger = Ledger::new();
        assert_eq!(ledger.get(&TaskId::from("nope")), None);
        assert_eq!(ledger.status(&TaskId::from("nope")), TaskStatus::Undefined);
    }

    #[test]
    fn set_returns_previous_status() {
        let ledger = Ledger::new();
        let id = TaskId::from("task-1");

        ledger.insert_pending(id.clone());
        let prev = ledger.set(&id, TaskStatus::Running);

        assert_eq!(prev, Some(TaskStatus::Pending));
        assert_eq!(ledger.status(&id), TaskStatus::Running);
    }

    #[test]
    fn undefined_is_never_stored() {
        let ledger = Ledger::new();
        let id = TaskId::from("task-1");

        ledger.insert_pending(id.clone());
        ledger.set(&id, TaskStatus::Undefined);
        assert_eq!(ledger.status(&id), TaskStatus::Pending);

        ledger.set(&TaskId::from("ghost"), TaskStatus::Undefined);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn late_interrupt_keeps_terminal_value() {
        let ledger = Ledger::new();
        let id = TaskId::from("task-1");

        ledger.insert_pending(id.clone());
        ledger.set(&id, TaskStatus::Running);
        ledger.set(&id, TaskStatus::Completed);

        let res = ledger.mark_unless_terminal(&id, TaskStatus::Interrupted);
        assert_eq!(res, Err(TaskStatus::Completed));
        assert_eq!(ledger.status(&id), TaskStatus::Completed);
    }

    #[test]
    fn interrupt_applies_to_active_task() {
        let ledger = Ledger::new();
        let id = TaskId::from("task-1");

        ledger.insert_pending(id.clone());
        ledger.set(&id, TaskStatus::Running);

        let res = ledger.mark_unless_terminal(&id, TaskStatus::Interrupted);
        assert_eq!(res, Ok(Some(TaskStatus::Running)));
        assert_eq!(ledger.status(&id), TaskStatus::Interrupted);
    }

    #[test]
    fn count_by_status_groups_tasks() {
        let ledger = Ledger::new();
        for i in 0..3 {
            ledger.insert_pending(TaskId::from(format!("t-{i}")));
        }
        ledger.set(&TaskId::from("t-0"), TaskStatus::Failed);

        let counts = ledger.count_by_status();
        assert_eq!(counts.get(&TaskStatus::Pending), Some(&2));
        assert_eq!(counts.get(&TaskStatus::Failed), Some(&1));
        assert_eq!(counts.get(&TaskStatus::Running), None);
    }

    #[tokio::test]
    async fn persist_then_load_reproduces_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let ledger = Ledger::new();
        let statuses = [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Timeout,
            TaskStatus::Interrupted,
        ];
        for (i, status) in statuses.iter().enumerate() {
            let id = TaskId::from(format!("task-{i}"));
            ledger.insert_pending(id.clone());
            ledger.set(&id, *status);
        }

        assert_eq!(ledger.persist(&path).await.unwrap(), statuses.len());
        let reloaded = Ledger::load(&path).await.unwrap();
        assert_eq!(reloaded.snapshot(), ledger.snapshot());
    }

    #[tokio::test]
    async fn persist_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let first = Ledger::new();
        first.insert_pending(TaskId::from("old"));
        first.persist(&path).await.unwrap();

        let second = Ledger::new();
        second.insert_pending(TaskId::from("new"));
        second.persist(&path).await.unwrap();

        let reloaded = Ledger::load(&path).await.unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.status(&TaskId::from("new")), TaskStatus::Pending);
    }

    #[tokio::test]
    async fn load_missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::load(&dir.path().join("absent.json")).await.unwrap();
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn load_corrupt_snapshot_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let err = Ledger::load(&path).await.err().unwrap();
        assert!(matches!(err, CoreError::Snapshot(_)));
    }
}
