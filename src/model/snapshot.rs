use crate::model::metadata::MetadataMap;
use crate::schema::snapshots;
use crate::time::DateTime;
use diesel::pg::Pg;
use diesel::prelude::*;

#[derive(Insertable)]
#[diesel(table_name = snapshots)]
#[diesel(check_for_backend(Pg))]
pub struct NewSnapshot {
    pub site_id: i32,
    pub html_path: Option<String>,
    pub text_path: Option<String>,
    pub screenshot_path: Option<String>,
    pub pdf_path: Option<String>,
    pub warc_path: Option<String>,
    pub content_hash: Option<String>,
    pub http_status: Option<i32>,
    pub byte_size: Option<i64>,
    pub error_message: Option<String>,
    pub metadata: MetadataMap,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable)]
#[diesel(treat_none_as_null = true)]
#[diesel(table_name = snapshots)]
#[diesel(check_for_backend(Pg))]
pub struct Snapshot {
    pub id: i32,
    pub site_id: i32,
    pub capture_timestamp: DateTime,
    pub html_path: Option<String>,
    pub text_path: Option<String>,
    pub screenshot_path: Option<String>,
    pub pdf_path: Option<String>,
    pub warc_path: Option<String>,
    pub content_hash: Option<String>,
    pub http_status: Option<i32>,
    pub byte_size: Option<i64>,
    pub error_message: Option<String>,
    pub metadata: MetadataMap,
}

impl Snapshot {
    /// Prefers the raw HTML artifact for diffing; falls back to the plain-text projection.
    pub fn diffable_path(&self) -> Option<&str> {
        self.html_path.as_deref().or(self.text_path.as_deref())
    }

    pub fn is_degraded(&self) -> bool {
        self.content_hash.is_none()
    }
}
