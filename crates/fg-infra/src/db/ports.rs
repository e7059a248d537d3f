//! Seams between the repositories and diesel.

use diesel::SqliteConnection;

/// Runs a unit of database work on a pooled connection.
///
/// Work is handed over as an owned closure so implementations may move it
/// off the async runtime; queue rows carry whole image payloads.
#[async_trait::async_trait]
pub trait DbExecutor: Send + Sync {
    async fn run<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> anyhow::Result<T> + Send + 'static;
}

/// Domain value to insertable row.
pub trait InsertMapper<D, R>: Sync + Send {
    fn to_row(&self, domain: &D) -> anyhow::Result<R>;
}

/// Stored row back to a domain value. Fails on rows that no longer decode.
pub trait RowMapper<R, D>: Sync + Send {
    fn to_domain(&self, row: &R) -> anyhow::Result<D>;
}
