//! Column-level `ALTER TABLE` statements.
//!
//! MySQL statements follow the catalog-copy grammar:
//!
//! ```text
//! ALTER TABLE <t> ADD COLUMN    <c> <type> NOT NULL|NULL [DEFAULT '<d>'] [<extra>]
//! ALTER TABLE <t> MODIFY COLUMN <c> <type> NOT NULL|NULL [DEFAULT '<d>'] [<extra>]
//! ALTER TABLE <t> DROP COLUMN   <c>
//! ```
//!
//! Defaults are always written as quoted string literals, whatever the column
//! type. Postgres has no `MODIFY COLUMN`, so a modification there becomes a
//! list of `ALTER COLUMN` actions in a single statement, and its defaults are
//! the catalog's default expressions, written as-is.

use crate::Dialect;


/// The desired shape of one column, borrowed from a column descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec<'a> {
    /// Engine-native type expression, e.g. `varchar(255)`.
    pub ty: &'a str,
    /// Whether the column rejects NULL.
    pub not_null: bool,
    /// Default value (MySQL) or default expression (Postgres).
    pub default: Option<&'a str>,
    /// Engine-specific modifiers, e.g. `auto_increment`. May be empty.
    pub extra: &'a str,
}

/// `ALTER TABLE <table> ADD COLUMN <column> ...`
pub fn add_column_sql(dialect: Dialect, table: &str, column: &str, spec: &ColumnSpec<'_>) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        dialect.quote_ident(table),
        dialect.quote_ident(column),
        column_definition(dialect, spec)
    )
}

/// Bring an existing column to `spec`.
///
/// On MySQL this is `MODIFY COLUMN` with the same clauses as
/// [`add_column_sql`]. On Postgres it is one statement made of `ALTER COLUMN`
/// actions for type, nullability and default; `extra` is not rendered since
/// Postgres cannot add identity or generation to a column in place.
pub fn modify_column_sql(
    dialect: Dialect,
    table: &str,
    column: &str,
    spec: &ColumnSpec<'_>,
) -> String {
    let table = dialect.quote_ident(table);
    let column = dialect.quote_ident(column);
    match dialect {
        Dialect::MySql => format!(
            "ALTER TABLE {} MODIFY COLUMN {} {}",
            table,
            column,
            column_definition(dialect, spec)
        ),
        Dialect::Postgres => {
            let mut actions = vec![format!(
                "ALTER COLUMN {} TYPE {} USING {}::{}",
                column, spec.ty, column, spec.ty
            )];
            if spec.not_null {
                actions.push(format!("ALTER COLUMN {} SET NOT NULL", column));
            } else {
                actions.push(format!("ALTER COLUMN {} DROP NOT NULL", column));
            }
            match spec.default {
                Some(default) => {
                    actions.push(format!("ALTER COLUMN {} SET DEFAULT {}", column, default))
                }
                None => actions.push(format!("ALTER COLUMN {} DROP DEFAULT", column)),
            }
            format!("ALTER TABLE {} {}", table, actions.join(", "))
        }
    }
}

/// `ALTER TABLE <table> DROP COLUMN <column>`
pub fn drop_column_sql(dialect: Dialect, table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        dialect.quote_ident(table),
        dialect.quote_ident(column)
    )
}

/// `<type> NOT NULL|NULL [DEFAULT ...] [<extra>]`, single-space separated.
fn column_definition(dialect: Dialect, spec: &ColumnSpec<'_>) -> String {
    let mut parts = vec![spec.ty.to_string()];
    parts.push(if spec.not_null { "NOT NULL" } else { "NULL" }.to_string());
    if let Some(default) = spec.default {
        let default = match dialect {
            Dialect::MySql => dialect.literal(default),
            Dialect::Postgres => default.to_string(),
        };
        parts.push(format!("DEFAULT {}", default));
    }
    if !spec.extra.is_empty() {
        parts.push(spec.extra.to_string());
    }
    parts.join(" ")
}
