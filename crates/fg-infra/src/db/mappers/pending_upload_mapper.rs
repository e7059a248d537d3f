use anyhow::{Context, Result};
use std::collections::BTreeMap;

use fg_core::upload::{NewPendingUpload, PendingUpload};
use fg_core::PendingUploadId;

use crate::db::models::{NewPendingUploadRow, PendingUploadRow};
use crate::db::ports::{InsertMapper, RowMapper};

pub struct PendingUploadRowMapper;

impl InsertMapper<NewPendingUpload, NewPendingUploadRow> for PendingUploadRowMapper {
    fn to_row(&self, domain: &NewPendingUpload) -> Result<NewPendingUploadRow> {
        let headers_snapshot = serde_json::to_string(&domain.headers_snapshot)
            .context("serialize headers snapshot failed")?;

        Ok(NewPendingUploadRow {
            payload: domain.payload.clone(),
            file_name: domain.file_name.clone(),
            mime_type: domain.mime_type.clone(),
            folder: domain.folder.clone(),
            headers_snapshot,
            created_at_ms: domain.created_at_ms,
            attempt_count: 0,
        })
    }
}

impl RowMapper<PendingUploadRow, PendingUpload> for PendingUploadRowMapper {
    fn to_domain(&self, row: &PendingUploadRow) -> Result<PendingUpload> {
        let headers_snapshot: BTreeMap<String, String> =
            serde_json::from_str(&row.headers_snapshot).with_context(|| {
                format!("corrupt headers snapshot for pending upload {}", row.id)
            })?;

        Ok(PendingUpload {
            id: PendingUploadId::new(row.id),
            payload: row.payload.clone(),
            file_name: row.file_name.clone(),
            mime_type: row.mime_type.clone(),
            folder: row.folder.clone(),
            headers_snapshot,
            created_at_ms: row.created_at_ms,
            attempt_count: u32::try_from(row.attempt_count).unwrap_or(0),
        })
    }
}
