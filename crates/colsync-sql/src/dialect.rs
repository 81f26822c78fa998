//! Engine dialects and the catalog queries they answer.
//!
//! Every column query returns the same six text columns, named after what
//! MySQL's `SHOW COLUMNS` reports:
//!
//! | column    | meaning                                      |
//! |-----------|----------------------------------------------|
//! | `field`   | column name                                  |
//! | `type`    | engine-native type expression                |
//! | `null`    | `YES` or `NO`                                |
//! | `key`     | `PRI`, `UNI`, `MUL` or empty                 |
//! | `default` | default value or expression, NULL if none    |
//! | `extra`   | auto-increment / identity / generated marker |
//!
//! The MySQL queries read `information_schema`, which matches `SHOW COLUMNS`
//! on MySQL itself. MariaDB differs: its `COLUMN_DEFAULT` holds quoted
//! literals and the string `NULL`, so defaults read from MariaDB do not round
//! trip. The MySQL text is only exercised against in-memory fakes here.

use crate::{BacktickIdent, Ident, Lit, MySqlLit};

/// The SQL engine a connection talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    MySql,
    Postgres,
}

const MYSQL_LIST_TABLES: &str = "\
SELECT TABLE_NAME AS `name` \
FROM information_schema.TABLES \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
ORDER BY TABLE_NAME";

const PG_LIST_TABLES: &str = "\
SELECT c.relname::text AS name \
FROM pg_catalog.pg_class c \
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
WHERE n.nspname = current_schema() AND c.relkind IN ('r', 'p') \
ORDER BY c.relname";

impl Dialect {
    /// Quote an identifier (table or column name).
    ///
    /// Identifiers are always quoted, whatever they contain.
    pub fn quote_ident(&self, name: &str) -> String {
        match self {
            Dialect::MySql => BacktickIdent(name).to_string(),
            Dialect::Postgres => Ident(name).to_string(),
        }
    }

    /// Quote a string literal.
    pub fn literal(&self, value: &str) -> String {
        match self {
            Dialect::MySql => MySqlLit(value).to_string(),
            Dialect::Postgres => Lit(value).to_string(),
        }
    }

    /// Bind placeholder for the `n`-th (1-based) parameter.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::MySql => "?".to_string(),
            Dialect::Postgres => format!("${}", n),
        }
    }

    /// Query listing the base tables of the current schema, sorted by name.
    ///
    /// Takes no parameters and returns a single `name` column.
    pub fn list_tables_sql(&self) -> &'static str {
        match self {
            Dialect::MySql => MYSQL_LIST_TABLES,
            Dialect::Postgres => PG_LIST_TABLES,
        }
    }

    /// Query listing the columns of one table in ordinal order.
    ///
    /// Takes the table name as its only parameter.
    pub fn columns_sql(&self) -> String {
        let table = self.placeholder(1);
        match self {
            Dialect::MySql => format!(
                "\
SELECT COLUMN_NAME AS `field`, COLUMN_TYPE AS `type`, IS_NULLABLE AS `null`, \
COLUMN_KEY AS `key`, COLUMN_DEFAULT AS `default`, EXTRA AS `extra` \
FROM information_schema.COLUMNS \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {table} \
ORDER BY ORDINAL_POSITION"
            ),
            Dialect::Postgres => format!(
                "\
SELECT a.attname::text AS field, \
format_type(a.atttypid, a.atttypmod) AS \"type\", \
CASE WHEN a.attnotnull THEN 'NO' ELSE 'YES' END AS \"null\", \
CASE \
WHEN EXISTS (SELECT 1 FROM pg_catalog.pg_index i \
WHERE i.indrelid = a.attrelid AND i.indisprimary AND a.attnum = ANY(i.indkey)) THEN 'PRI' \
WHEN EXISTS (SELECT 1 FROM pg_catalog.pg_index i \
WHERE i.indrelid = a.attrelid AND i.indisunique AND i.indnatts = 1 AND i.indkey[0] = a.attnum) THEN 'UNI' \
WHEN EXISTS (SELECT 1 FROM pg_catalog.pg_index i \
WHERE i.indrelid = a.attrelid AND i.indkey[0] = a.attnum) THEN 'MUL' \
ELSE '' END AS \"key\", \
CASE WHEN a.attgenerated = '' THEN pg_get_expr(d.adbin, d.adrelid) END AS \"default\", \
CASE \
WHEN a.attidentity = 'a' THEN 'GENERATED ALWAYS AS IDENTITY' \
WHEN a.attidentity = 'd' THEN 'GENERATED BY DEFAULT AS IDENTITY' \
WHEN a.attgenerated = 's' THEN 'GENERATED ALWAYS AS (' || pg_get_expr(d.adbin, d.adrelid) || ') STORED' \
ELSE '' END AS extra \
FROM pg_catalog.pg_attribute a \
JOIN pg_catalog.pg_class c ON c.oid = a.attrelid \
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
WHERE n.nspname = current_schema() AND c.relkind IN ('r', 'p') AND c.relname = {table}::text \
AND a.attnum > 0 AND NOT a.attisdropped \
ORDER BY a.attnum"
            ),
        }
    }

    /// Query returning one row if the named table exists, none otherwise.
    pub fn table_exists_sql(&self) -> String {
        let table = self.placeholder(1);
        match self {
            Dialect::MySql => format!(
                "\
SELECT TABLE_NAME AS `name` \
FROM information_schema.TABLES \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' AND TABLE_NAME = {table}"
            ),
            Dialect::Postgres => format!(
                "\
SELECT c.relname::text AS name \
FROM pg_catalog.pg_class c \
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
WHERE n.nspname = current_schema() AND c.relkind IN ('r', 'p') AND c.relname = {table}::text"
            ),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::MySql => write!(f, "mysql"),
            Dialect::Postgres => write!(f, "postgres"),
        }
    }
}
