use crate::db::mappers::PendingUploadRowMapper;
use crate::db::models::PendingUploadRow;
use crate::db::ports::{DbExecutor, InsertMapper, RowMapper};
use crate::db::schema::pending_upload;
use diesel::{Connection, ExpressionMethods, QueryDsl, RunQueryDsl};
use fg_core::error::QueueError;
use fg_core::ids::PendingUploadId;
use fg_core::ports::PendingUploadQueuePort;
use fg_core::upload::{NewPendingUpload, PendingUpload};

/// SQLite-backed offline upload queue.
///
/// Every write runs inside a single transaction, so a crash leaves either the
/// whole row or nothing.
pub struct DieselPendingUploadQueue<E>
where
    E: DbExecutor,
{
    executor: E,
}

impl<E> DieselPendingUploadQueue<E>
where
    E: DbExecutor,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }
}

fn storage_error(err: anyhow::Error) -> QueueError {
    QueueError::Storage(format!("{err:#}"))
}

#[async_trait::async_trait]
impl<E> PendingUploadQueuePort for DieselPendingUploadQueue<E>
where
    E: DbExecutor,
{
    async fn enqueue(&self, upload: NewPendingUpload) -> Result<PendingUploadId, QueueError> {
        let new_row = PendingUploadRowMapper.to_row(&upload).map_err(storage_error)?;

        let id = self
            .executor
            .run(move |conn| {
                let id = conn.transaction::<i64, diesel::result::Error, _>(|conn| {
                    diesel::insert_into(pending_upload::table)
                        .values(&new_row)
                        .returning(pending_upload::id)
                        .get_result(conn)
                })?;
                Ok(id)
            })
            .await
            .map_err(storage_error)?;

        Ok(PendingUploadId::new(id))
    }

    async fn list_pending(&self) -> Result<Vec<PendingUpload>, QueueError> {
        let rows: Vec<PendingUploadRow> = self
            .executor
            .run(|conn| {
                let rows = pending_upload::table
                    .order(pending_upload::id.asc())
                    .load::<PendingUploadRow>(conn)?;
                Ok(rows)
            })
            .await
            .map_err(storage_error)?;

        rows.iter()
            .map(|row| PendingUploadRowMapper.to_domain(row))
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(storage_error)
    }

    async fn remove(&self, id: PendingUploadId) -> Result<bool, QueueError> {
        let row_id = id.value();
        let deleted = self
            .executor
            .run(move |conn| {
                let deleted = conn.transaction::<usize, diesel::result::Error, _>(|conn| {
                    diesel::delete(pending_upload::table.filter(pending_upload::id.eq(row_id)))
                        .execute(conn)
                })?;
                Ok(deleted)
            })
            .await
            .map_err(storage_error)?;

        Ok(deleted > 0)
    }

    async fn record_attempt(&self, id: PendingUploadId) -> Result<(), QueueError> {
        let row_id = id.value();
        let updated = self
            .executor
            .run(move |conn| {
                let updated = diesel::update(pending_upload::table.find(row_id))
                    .set(pending_upload::attempt_count.eq(pending_upload::attempt_count + 1))
                    .execute(conn)?;
                Ok(updated)
            })
            .await
            .map_err(storage_error)?;

        if updated == 0 {
            return Err(QueueError::NotFound(id));
        }
        Ok(())
    }
}
