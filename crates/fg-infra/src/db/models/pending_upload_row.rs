use crate::db::schema::pending_upload;
use diesel::prelude::*;

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = pending_upload)]
pub struct PendingUploadRow {
    pub id: i64,
    pub payload: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub folder: String,
    pub headers_snapshot: String,
    pub created_at_ms: i64,
    pub attempt_count: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = pending_upload)]
pub struct NewPendingUploadRow {
    pub payload: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub folder: String,
    pub headers_snapshot: String,
    pub created_at_ms: i64,
    pub attempt_count: i32,
}
