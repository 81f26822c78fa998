//! In-memory catalog for tests, MySQL-flavored unless told otherwise.

use std::sync::Mutex;

use colsync_sql::Dialect;
use indexmap::IndexMap;

use crate::connection::{BoxFuture, CatalogRow};
use crate::{Connection, Error, Result, TableSchema};

pub struct FakeConnection {
    dialect: Dialect,
    tables: IndexMap<String, TableSchema>,
    fail_queries: bool,
    fail_columns_of: Option<String>,
    fail_statements_containing: Option<String>,
    executed: Mutex<Vec<String>>,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self::with_dialect(Dialect::MySql)
    }

    /// Answer the given dialect's catalog queries and report it as ours.
    pub fn with_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            tables: IndexMap::new(),
            fail_queries: false,
            fail_columns_of: None,
            fail_statements_containing: None,
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Tables are listed in insertion order.
    pub fn with_table(mut self, name: &str, schema: TableSchema) -> Self {
        self.tables.insert(name.to_string(), schema);
        self
    }

    pub fn fail_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    pub fn fail_columns_of(mut self, table: &str) -> Self {
        self.fail_columns_of = Some(table.to_string());
        self
    }

    pub fn fail_statements_containing(mut self, needle: &str) -> Self {
        self.fail_statements_containing = Some(needle.to_string());
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    fn run_query(&self, sql: &str, params: &[&str]) -> Result<Vec<CatalogRow>> {
        if self.fail_queries {
            return Err(Error::connectivity("connection refused"));
        }
        let dialect = self.dialect;

        if sql == dialect.list_tables_sql() {
            return Ok(self
                .tables
                .keys()
                .map(|name| CatalogRow::from([("name".to_string(), Some(name.clone()))]))
                .collect());
        }

        let table = params.first().copied().unwrap_or_default();
        if sql == dialect.table_exists_sql() {
            return Ok(self
                .tables
                .keys()
                .filter(|name| name.as_str() == table)
                .map(|name| CatalogRow::from([("name".to_string(), Some(name.clone()))]))
                .collect());
        }

        if sql == dialect.columns_sql() {
            if self.fail_columns_of.as_deref() == Some(table) {
                return Err(Error::connectivity("lost connection during query"));
            }
            let Some(schema) = self.tables.get(table) else {
                return Ok(Vec::new());
            };
            return Ok(schema
                .iter()
                .map(|(name, col)| {
                    CatalogRow::from([
                        ("field".to_string(), Some(name.to_string())),
                        ("type".to_string(), Some(col.ty.clone())),
                        ("null".to_string(), Some(col.nullable.as_str().to_string())),
                        ("key".to_string(), Some(col.key_role.clone())),
                        ("default".to_string(), col.default.clone()),
                        ("extra".to_string(), Some(col.extra.clone())),
                    ])
                })
                .collect());
        }

        Err(Error::connectivity(format!("unexpected query: {sql}")))
    }
}

impl Connection for FakeConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a str],
    ) -> BoxFuture<'a, Result<Vec<CatalogRow>>> {
        Box::pin(async move { self.run_query(sql, params) })
    }

    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            if let Some(needle) = &self.fail_statements_containing {
                if sql.contains(needle.as_str()) {
                    return Err(Error::connectivity(format!("statement rejected: {sql}")));
                }
            }
            self.executed.lock().unwrap().push(sql.to_string());
            Ok(0)
        })
    }
}
