use crate::schema::archive_queue;
use crate::time::DateTime;
use diesel::pg::Pg;
use diesel::prelude::*;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operation {
    Capture,
    Diff,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Capture => "capture",
            Operation::Diff => "diff",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum QueueStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl QueueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::InProgress => "in_progress",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = archive_queue)]
#[diesel(check_for_backend(Pg))]
pub struct NewQueueEntry {
    pub site_id: i32,
    pub operation: String,
    pub status: String,
    pub priority: i16,
}

#[derive(Debug, Clone, AsChangeset, Identifiable, Queryable, Selectable)]
#[diesel(treat_none_as_null = true)]
#[diesel(table_name = archive_queue)]
#[diesel(check_for_backend(Pg))]
pub struct QueueEntry {
    pub id: i32,
    pub site_id: i32,
    pub operation: String,
    pub status: String,
    pub priority: i16,
    pub scheduled_for: DateTime,
    pub started_at: Option<DateTime>,
    pub completed_at: Option<DateTime>,
    pub error_message: Option<String>,
    pub retries: i16,
}
