//! Schema diffing - compare a reference table schema against a target one.
//!
//! The diff is column-level only and runs in two passes:
//!
//! 1. Reference columns, in reference order: absent from the target is an
//!    [`Change::AddColumn`], present but not [`columns_equal`] is a
//!    [`Change::ModifyColumn`] carrying the reference descriptor.
//! 2. Target columns absent from the reference are [`Change::DropColumn`]s.
//!
//! So for a given table, additions and modifications always come before drops.
//!
//! ### Example
//!
//! ```text
//! users:
//!   + email: varchar(255)
//!   ~ name: varchar(100) (nullable)
//!   - legacy_flag
//! ```

use std::fmt;

use colsync_sql::{Dialect, add_column_sql, drop_column_sql, modify_column_sql};

use crate::schema::{ColumnDescriptor, TableSchema};

/// What a change does to its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Modify,
    Drop,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Add => write!(f, "add"),
            ChangeKind::Modify => write!(f, "modify"),
            ChangeKind::Drop => write!(f, "drop"),
        }
    }
}

/// A single column-level change to a target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Add a column missing from the target.
    AddColumn {
        table: String,
        column: String,
        descriptor: ColumnDescriptor,
    },
    /// Bring a column to the reference (desired) descriptor.
    ModifyColumn {
        table: String,
        column: String,
        descriptor: ColumnDescriptor,
    },
    /// Drop a column the reference does not have.
    DropColumn { table: String, column: String },
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::AddColumn { .. } => ChangeKind::Add,
            Change::ModifyColumn { .. } => ChangeKind::Modify,
            Change::DropColumn { .. } => ChangeKind::Drop,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Change::AddColumn { table, .. }
            | Change::ModifyColumn { table, .. }
            | Change::DropColumn { table, .. } => table,
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Change::AddColumn { column, .. }
            | Change::ModifyColumn { column, .. }
            | Change::DropColumn { column, .. } => column,
        }
    }

    /// The desired descriptor, for additions and modifications.
    pub fn descriptor(&self) -> Option<&ColumnDescriptor> {
        match self {
            Change::AddColumn { descriptor, .. } | Change::ModifyColumn { descriptor, .. } => {
                Some(descriptor)
            }
            Change::DropColumn { .. } => None,
        }
    }

    /// Generate the DDL statement for this change.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        match self {
            Change::AddColumn {
                table,
                column,
                descriptor,
            } => add_column_sql(dialect, table, column, &descriptor.as_spec()),
            Change::ModifyColumn {
                table,
                column,
                descriptor,
            } => modify_column_sql(dialect, table, column, &descriptor.as_spec()),
            Change::DropColumn { table, column } => drop_column_sql(dialect, table, column),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::AddColumn {
                column, descriptor, ..
            } => write!(f, "+ {}: {}", column, descriptor),
            Change::ModifyColumn {
                column, descriptor, ..
            } => write!(f, "~ {}: {}", column, descriptor),
            Change::DropColumn { column, .. } => write!(f, "- {}", column),
        }
    }
}

/// Strict structural equality of two column descriptors.
///
/// Type, nullability, key role, default and extra must all match exactly.
pub fn columns_equal(a: &ColumnDescriptor, b: &ColumnDescriptor) -> bool {
    a.ty == b.ty
        && a.nullable == b.nullable
        && a.key_role == b.key_role
        && a.default == b.default
        && a.extra == b.extra
}

/// Compute the changes that turn `target` into `reference` for `table`.
pub fn diff_table(reference: &TableSchema, target: &TableSchema, table: &str) -> Vec<Change> {
    let mut changes = Vec::new();

    for (name, desired) in reference.iter() {
        match target.get(name) {
            None => changes.push(Change::AddColumn {
                table: table.to_string(),
                column: name.to_string(),
                descriptor: desired.clone(),
            }),
            Some(current) if !columns_equal(current, desired) => {
                changes.push(Change::ModifyColumn {
                    table: table.to_string(),
                    column: name.to_string(),
                    descriptor: desired.clone(),
                })
            }
            Some(_) => {}
        }
    }

    for (name, _) in target.iter() {
        if !reference.contains(name) {
            changes.push(Change::DropColumn {
                table: table.to_string(),
                column: name.to_string(),
            });
        }
    }

    changes
}

/// Changes for a single table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDiff {
    /// Table name.
    pub table: String,
    /// Whether the target lacked the table entirely.
    pub missing_in_target: bool,
    /// List of changes.
    pub changes: Vec<Change>,
}

/// The changes a reconciliation pass would make, table by table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    /// Tables with at least one change, in reference enumeration order.
    pub table_diffs: Vec<TableDiff>,
}

impl SchemaDiff {
    /// Returns true if there are no differences.
    pub fn is_empty(&self) -> bool {
        self.table_diffs.is_empty()
    }

    /// Count total number of changes.
    pub fn change_count(&self) -> usize {
        self.table_diffs.iter().map(|t| t.changes.len()).sum()
    }

    /// Generate SQL statements for all changes in this diff.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut sql = String::new();
        for table_diff in &self.table_diffs {
            sql.push_str(&format!("-- Table: {}\n", table_diff.table));
            for change in &table_diff.changes {
                sql.push_str(&change.to_sql(dialect));
                sql.push_str(";\n");
            }
            sql.push('\n');
        }
        sql
    }
}

impl fmt::Display for SchemaDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            writeln!(f, "No changes detected.")?;
        } else {
            writeln!(f, "Changes detected:\n")?;
            for table_diff in &self.table_diffs {
                if table_diff.missing_in_target {
                    writeln!(f, "  {} (missing in target):", table_diff.table)?;
                } else {
                    writeln!(f, "  {}:", table_diff.table)?;
                }
                for change in &table_diff.changes {
                    writeln!(f, "    {}", change)?;
                }
            }
        }
        Ok(())
    }
}
