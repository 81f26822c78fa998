//! Schema introspection - read tables and columns from a live catalog.
//!
//! Nothing is cached: each call re-queries the catalog.

use crate::schema::{ColumnDescriptor, TableSchema};
use crate::{Connection, Error, Result};

/// List the base tables of the connection's current schema, sorted by name.
///
/// An empty database yields an empty list.
pub async fn list_tables<C: Connection + ?Sized>(conn: &C) -> Result<Vec<String>> {
    let rows = conn.query(conn.dialect().list_tables_sql(), &[]).await?;
    rows.into_iter()
        .map(|row| {
            row.get("name")
                .cloned()
                .flatten()
                .ok_or_else(|| Error::MalformedRow {
                    column: "name".to_string(),
                })
        })
        .collect()
}

/// Read the columns of `table` in ordinal order.
///
/// Fails with [`Error::UnknownTable`] if the table does not exist on this
/// connection. A table that exists but has no columns yields an empty schema.
pub async fn table_columns<C: Connection + ?Sized>(conn: &C, table: &str) -> Result<TableSchema> {
    let sql = conn.dialect().columns_sql();
    let rows = conn.query(&sql, &[table]).await?;

    if rows.is_empty() && !table_exists(conn, table).await? {
        return Err(Error::UnknownTable {
            table: table.to_string(),
        });
    }

    let schema = rows
        .iter()
        .map(ColumnDescriptor::from_row)
        .collect::<Result<TableSchema>>()?;

    tracing::debug!(table, columns = schema.len(), "read table columns");
    Ok(schema)
}

async fn table_exists<C: Connection + ?Sized>(conn: &C, table: &str) -> Result<bool> {
    let sql = conn.dialect().table_exists_sql();
    let rows = conn.query(&sql, &[table]).await?;
    Ok(!rows.is_empty())
}
