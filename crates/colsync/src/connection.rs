//! The connection collaborator: run a catalog query, execute a statement.
//!
//! Implemented for `tokio_postgres::Client` and `deadpool_postgres::Object`.
//! Every call is logged via a `tracing::debug_span!`.

use std::future::Future;
use std::pin::Pin;

use colsync_sql::Dialect;
use indexmap::IndexMap;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;
use tracing::Instrument;

use crate::Result;

/// One result row: column name to text value, in select-list order.
pub type CatalogRow = IndexMap<String, Option<String>>;

/// A boxed future borrowing the connection.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for database connections the reconciler can read from and write to.
///
/// Any failure to run a statement is reported as [`crate::Error::Connectivity`].
pub trait Connection: Send + Sync {
    /// The engine on the other end, which decides catalog queries and DDL syntax.
    fn dialect(&self) -> Dialect;

    /// Execute a read-only query with text parameters, returning all rows.
    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a str],
    ) -> BoxFuture<'a, Result<Vec<CatalogRow>>>;

    /// Execute a DDL or write statement, returning the number of rows affected.
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<u64>>;
}

impl Connection for tokio_postgres::Client {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a str],
    ) -> BoxFuture<'a, Result<Vec<CatalogRow>>> {
        Box::pin(pg_query(self, sql, params))
    }

    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<u64>> {
        Box::pin(pg_execute(self, sql))
    }
}

impl Connection for deadpool_postgres::Object {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a str],
    ) -> BoxFuture<'a, Result<Vec<CatalogRow>>> {
        // Deref to the underlying Client to avoid recursion
        let client: &tokio_postgres::Client = self;
        Box::pin(pg_query(client, sql, params))
    }

    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<u64>> {
        let client: &tokio_postgres::Client = self;
        Box::pin(pg_execute(client, sql))
    }
}

async fn pg_query(
    client: &tokio_postgres::Client,
    sql: &str,
    params: &[&str],
) -> Result<Vec<CatalogRow>> {
    let span = tracing::debug_span!(
        "db.query",
        sql = %sql,
        params = params.len(),
        rows = tracing::field::Empty,
    );
    let params: Vec<&(dyn ToSql + Sync)> = params
        .iter()
        .map(|p| p as &(dyn ToSql + Sync))
        .collect();
    let rows = client.query(sql, &params).instrument(span.clone()).await?;
    span.record("rows", rows.len());
    rows.iter().map(row_to_catalog).collect()
}

async fn pg_execute(client: &tokio_postgres::Client, sql: &str) -> Result<u64> {
    let span = tracing::debug_span!(
        "db.execute",
        sql = %sql,
        affected = tracing::field::Empty,
    );
    let affected = client.execute(sql, &[]).instrument(span.clone()).await?;
    span.record("affected", affected);
    Ok(affected)
}

/// Read every column of a row as nullable text.
///
/// Catalog queries cast their outputs to `text`, so this never has to guess.
fn row_to_catalog(row: &Row) -> Result<CatalogRow> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let value: Option<String> = row.try_get(idx)?;
            Ok((column.name().to_string(), value))
        })
        .collect()
}
