//! Column-level schema reconciliation.
//!
//! Given a reference database (say, development) and a target database (say,
//! production), colsync reads both catalogs, computes a per-table column diff
//! and applies `ADD COLUMN`, `MODIFY COLUMN` and `DROP COLUMN` statements to
//! the target until its columns match the reference.
//!
//! Only tables the reference has are considered, and only their columns.
//! Tables, indexes, constraints and data are never created, dropped or moved.
//!
//! ```ignore
//! let reference = DatabaseConfig::new("localhost", "dev", "root", "").connect().await?;
//! let target = DatabaseConfig::new("localhost", "prod", "root", "").connect().await?;
//!
//! // Preview
//! let diff = Reconciler::new().plan(&reference, &target).await?;
//! print!("{diff}");
//!
//! // Apply
//! let report = Reconciler::new()
//!     .reconcile(&reference, &target, &mut LogProgress)
//!     .await?;
//! print!("{report}");
//! ```

mod config;
mod connection;
mod diff;
mod error;
mod event;
pub mod introspect;
mod reconcile;
mod schema;

#[cfg(test)]
mod fake;

pub use config::DatabaseConfig;
pub use connection::{BoxFuture, CatalogRow, Connection};
pub use diff::{Change, ChangeKind, SchemaDiff, TableDiff, columns_equal, diff_table};
pub use error::{BoxError, Error};
pub use event::{Event, LogProgress, NoProgress, Progress};
pub use reconcile::{Failure, OnError, ReconcileReport, Reconciler};
pub use schema::{ColumnDescriptor, Nullability, TableSchema};

// Re-export the SQL layer for dialect selection and DDL rendering
pub use colsync_sql as sql;
pub use colsync_sql::Dialect;

/// Result type for colsync operations.
pub type Result<T> = std::result::Result<T, Error>;
