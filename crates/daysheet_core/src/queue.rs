//! Queue of memo sync tasks awaiting the external job.

use crate::types::{SyncFlag, SyncTask, TaskMode, TaskStatus};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Input for enqueueing a task manually.
#[derive(Debug, Clone)]
pub struct TaskInput {
    /// Site of the target row.
    pub site: String,
    /// Reservation date text of the target row.
    pub reservation_date: String,
    /// Customer name for the external lookup.
    pub customer_name: String,
    /// Phone number for the external lookup.
    pub phone: String,
    /// Memo text, newline-joined.
    pub memo: String,
    /// Apply mode.
    pub mode: TaskMode,
}

/// In-memory task queue plus the process-wide sync flag.
///
/// Owned by the store; all access goes through the store's queue lock.
#[derive(Debug, Default)]
pub(crate) struct TaskQueue {
    tasks: Vec<SyncTask>,
    flag: SyncFlag,
}

impl TaskQueue {
    pub(crate) fn enqueue(&mut self, input: TaskInput, now: DateTime<Utc>) -> SyncTask {
        let task = SyncTask {
            id: Uuid::new_v4(),
            site: input.site,
            reservation_date: input.reservation_date,
            customer_name: input.customer_name,
            phone: input.phone,
            memo: input.memo,
            mode: input.mode,
            status: TaskStatus::Pending,
            tries: 0,
            added_at: now,
            updated_at: None,
            completed_at: None,
        };
        self.tasks.push(task.clone());
        self.flag.sync_required = true;
        self.flag.requested_at = Some(now);
        task
    }

    pub(crate) fn recent(&self, limit: usize) -> Vec<SyncTask> {
        self.tasks.iter().rev().take(limit).cloned().collect()
    }

    pub(crate) fn pending(&self) -> Vec<SyncTask> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .cloned()
            .collect()
    }

    pub(crate) fn flag(&self) -> SyncFlag {
        self.flag.clone()
    }

    pub(crate) fn clear_flag(&mut self) {
        self.flag.sync_required = false;
    }

    pub(crate) fn set_status(
        &mut self,
        id: Uuid,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> Option<SyncTask> {
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        task.status = status;
        task.tries += 1;
        task.updated_at = Some(now);
        if status != TaskStatus::Pending {
            task.completed_at = Some(now);
        }
        Some(task.clone())
    }
}
