//! Reconciliation - bring a target database's columns in line with a reference.
//!
//! For every table the reference lists, in listing order:
//!
//! 1. read the reference columns (failure aborts the pass),
//! 2. read the target columns (a missing table reads as empty; any other
//!    failure skips the table and is reported),
//! 3. diff them and execute each change against the target, one statement at
//!    a time. A failed statement is reported and the pass moves on.
//!
//! Tables that only exist in the target are never touched. There is no
//! transaction around the pass: what succeeded stays applied.

use std::collections::HashSet;
use std::fmt;

use colsync_sql::{Dialect, FragmentKind, check_fragment};
use tracing::Instrument;

use crate::diff::{Change, ChangeKind, SchemaDiff, TableDiff, diff_table};
use crate::event::{Event, Progress};
use crate::introspect::{list_tables, table_columns};
use crate::schema::TableSchema;
use crate::{Connection, Error, Result};

/// What to do when a statement fails or a target table cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnError {
    /// Report it and carry on with the next change or table.
    #[default]
    Continue,
    /// Report it and stop the pass.
    Abort,
}

/// Drives a reconciliation pass between two connections.
///
/// The connections are passed to each call; a `Reconciler` only holds options.
///
/// # Example
///
/// ```ignore
/// let report = Reconciler::new()
///     .exclude(["schema_migrations"])
///     .reconcile(&reference, &target, &mut LogProgress)
///     .await?;
/// println!("{report}");
/// ```
#[derive(Debug, Clone)]
pub struct Reconciler {
    on_error: OnError,
    validate_fragments: bool,
    exclude: HashSet<String>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

enum Flow {
    Continue,
    Stop,
}

impl Reconciler {
    /// Continue on error, validate catalog fragments, exclude nothing.
    pub fn new() -> Self {
        Self {
            on_error: OnError::Continue,
            validate_fragments: true,
            exclude: HashSet::new(),
        }
    }

    pub fn on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    /// Whether to reject catalog-reported types and extras that could break
    /// out of the DDL statement they are spliced into.
    pub fn validate_fragments(mut self, validate: bool) -> Self {
        self.validate_fragments = validate;
        self
    }

    /// Skip these reference tables entirely.
    pub fn exclude<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(tables.into_iter().map(Into::into));
        self
    }

    /// Compute what [`Reconciler::reconcile`] would do, without executing anything.
    ///
    /// Unlike `reconcile`, any read failure (reference or target) is returned,
    /// except a table missing from the target, which reads as empty.
    pub async fn plan<R, T>(&self, reference: &R, target: &T) -> Result<SchemaDiff>
    where
        R: Connection + ?Sized,
        T: Connection + ?Sized,
    {
        let mut table_diffs = Vec::new();

        for table in list_tables(reference).await? {
            if self.exclude.contains(&table) {
                continue;
            }
            let reference_columns = table_columns(reference, &table).await?;
            let (target_columns, missing_in_target) = match table_columns(target, &table).await {
                Ok(columns) => (columns, false),
                Err(Error::UnknownTable { .. }) => (TableSchema::new(), true),
                Err(err) => return Err(err),
            };

            let changes = diff_table(&reference_columns, &target_columns, &table);
            if !changes.is_empty() {
                table_diffs.push(TableDiff {
                    table,
                    missing_in_target,
                    changes,
                });
            }
        }

        Ok(SchemaDiff { table_diffs })
    }

    /// Run a reconciliation pass.
    ///
    /// Returns `Err` only when the reference side cannot be read. Everything
    /// else lands in the report.
    pub async fn reconcile<R, T, P>(
        &self,
        reference: &R,
        target: &T,
        progress: &mut P,
    ) -> Result<ReconcileReport>
    where
        R: Connection + ?Sized,
        T: Connection + ?Sized,
        P: Progress + ?Sized,
    {
        let tables = list_tables(reference).await?;
        let dialect = target.dialect();
        let mut report = ReconcileReport::default();

        tracing::info!(tables = tables.len(), %dialect, "starting reconciliation");

        for table in &tables {
            if self.exclude.contains(table) {
                tracing::debug!(table = %table, "table excluded");
                continue;
            }

            let span = tracing::info_span!("reconcile.table", table = %table);
            let flow = self
                .reconcile_table(reference, target, dialect, table, progress, &mut report)
                .instrument(span)
                .await?;

            if let Flow::Stop = flow {
                report.aborted = true;
                break;
            }
        }

        tracing::info!(
            tables = report.tables_processed,
            applied = report.applied.len(),
            failed = report.failures.len(),
            "reconciliation finished"
        );
        Ok(report)
    }

    async fn reconcile_table<R, T, P>(
        &self,
        reference: &R,
        target: &T,
        dialect: Dialect,
        table: &str,
        progress: &mut P,
        report: &mut ReconcileReport,
    ) -> Result<Flow>
    where
        R: Connection + ?Sized,
        T: Connection + ?Sized,
        P: Progress + ?Sized,
    {
        progress.on_event(&Event::TableStarted {
            table: table.to_string(),
        });
        report.tables_processed += 1;

        let reference_columns = table_columns(reference, table).await?;
        let target_columns = match table_columns(target, table).await {
            Ok(columns) => columns,
            Err(Error::UnknownTable { .. }) => {
                tracing::debug!("table missing in target, adding every column");
                TableSchema::new()
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not read target columns");
                progress.on_event(&Event::TableFailed {
                    table: table.to_string(),
                    error: err.to_string(),
                });
                report.failures.push(Failure {
                    table: table.to_string(),
                    column: None,
                    kind: None,
                    error: err,
                });
                return Ok(self.after_failure());
            }
        };

        let changes = diff_table(&reference_columns, &target_columns, table);
        let mut applied = 0;

        for change in changes {
            match self.apply(target, dialect, &change).await {
                Ok(()) => {
                    progress.on_event(&applied_event(&change));
                    report.applied.push(change);
                    applied += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        column = change.column(),
                        kind = %change.kind(),
                        error = %err,
                        "change failed"
                    );
                    progress.on_event(&Event::OperationFailed {
                        table: table.to_string(),
                        column: change.column().to_string(),
                        kind: change.kind(),
                        error: err.to_string(),
                    });
                    report.failures.push(Failure {
                        table: table.to_string(),
                        column: Some(change.column().to_string()),
                        kind: Some(change.kind()),
                        error: err,
                    });
                    if let Flow::Stop = self.after_failure() {
                        return Ok(Flow::Stop);
                    }
                }
            }
        }

        progress.on_event(&Event::TableFinished {
            table: table.to_string(),
            changes: applied,
        });
        Ok(Flow::Continue)
    }

    async fn apply<T: Connection + ?Sized>(
        &self,
        target: &T,
        dialect: Dialect,
        change: &Change,
    ) -> Result<()> {
        if self.validate_fragments {
            if let Some(descriptor) = change.descriptor() {
                check_fragment(FragmentKind::Type, &descriptor.ty)?;
                check_fragment(FragmentKind::Extra, &descriptor.extra)?;
                // MySQL defaults are quoted as literals; Postgres ones are expressions
                if let (Dialect::Postgres, Some(default)) = (dialect, &descriptor.default) {
                    check_fragment(FragmentKind::Default, default)?;
                }
            }
        }
        let sql = change.to_sql(dialect);
        target.execute(&sql).await?;
        Ok(())
    }

    fn after_failure(&self) -> Flow {
        match self.on_error {
            OnError::Continue => Flow::Continue,
            OnError::Abort => Flow::Stop,
        }
    }
}

fn applied_event(change: &Change) -> Event {
    let table = change.table().to_string();
    let column = change.column().to_string();
    match change.kind() {
        ChangeKind::Add => Event::ColumnAdded { table, column },
        ChangeKind::Modify => Event::ColumnModified { table, column },
        ChangeKind::Drop => Event::ColumnDropped { table, column },
    }
}

/// A change or table that could not be reconciled.
#[derive(Debug)]
pub struct Failure {
    pub table: String,
    /// `None` when the whole table was skipped.
    pub column: Option<String>,
    pub kind: Option<ChangeKind>,
    pub error: Error,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.column, self.kind) {
            (Some(column), Some(kind)) => {
                write!(f, "{}.{} ({}): {}", self.table, column, kind, self.error)
            }
            _ => write!(f, "{}: {}", self.table, self.error),
        }
    }
}

/// End-of-pass summary.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Reference tables that were started (excluded tables are not counted).
    pub tables_processed: usize,
    /// Changes that executed successfully, in execution order.
    pub applied: Vec<Change>,
    pub failures: Vec<Failure>,
    /// Whether [`OnError::Abort`] cut the pass short.
    pub aborted: bool,
}

impl ReconcileReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Processed {} table(s): {} change(s) applied, {} failure(s).",
            self.tables_processed,
            self.applied.len(),
            self.failures.len()
        )?;
        for failure in &self.failures {
            writeln!(f, "  failed: {}", failure)?;
        }
        if self.aborted {
            writeln!(f, "Aborted after the first failure.")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColumnDescriptor;
    use crate::fake::FakeConnection;

    fn users() -> TableSchema {
        TableSchema::new()
            .with(
                "id",
                ColumnDescriptor::new("int(11)")
                    .not_null()
                    .key_role("PRI")
                    .extra("auto_increment"),
            )
            .with("name", ColumnDescriptor::new("varchar(100)").not_null())
            .with("email", ColumnDescriptor::new("varchar(255)"))
    }

    fn orders() -> TableSchema {
        TableSchema::new()
            .with("id", ColumnDescriptor::new("int(11)").not_null().key_role("PRI"))
            .with(
                "status",
                ColumnDescriptor::new("varchar(16)")
                    .not_null()
                    .default_value("new"),
            )
            .with("total", ColumnDescriptor::new("decimal(10,2)"))
    }

    #[tokio::test]
    async fn test_missing_target_table_adds_every_column() {
        let reference = FakeConnection::new().with_table("orders", orders());
        let target = FakeConnection::new();

        let mut events = Vec::new();
        let report = Reconciler::new()
            .reconcile(&reference, &target, &mut |e: &Event| events.push(e.clone()))
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.tables_processed, 1);
        assert_eq!(report.applied.len(), 3);
        assert_eq!(
            target.executed(),
            vec![
                "ALTER TABLE `orders` ADD COLUMN `id` int(11) NOT NULL",
                "ALTER TABLE `orders` ADD COLUMN `status` varchar(16) NOT NULL DEFAULT 'new'",
                "ALTER TABLE `orders` ADD COLUMN `total` decimal(10,2) NULL",
            ]
        );
        assert_eq!(
            events,
            vec![
                Event::TableStarted {
                    table: "orders".into()
                },
                Event::ColumnAdded {
                    table: "orders".into(),
                    column: "id".into()
                },
                Event::ColumnAdded {
                    table: "orders".into(),
                    column: "status".into()
                },
                Event::ColumnAdded {
                    table: "orders".into(),
                    column: "total".into()
                },
                Event::TableFinished {
                    table: "orders".into(),
                    changes: 3
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_add_modify_drop_in_one_table() {
        let reference = FakeConnection::new().with_table("users", users());
        let target = FakeConnection::new().with_table(
            "users",
            TableSchema::new()
                .with(
                    "id",
                    ColumnDescriptor::new("int")
                        .not_null()
                        .key_role("PRI")
                        .extra("auto_increment"),
                )
                .with("name", ColumnDescriptor::new("varchar(100)").not_null())
                .with("legacy_flag", ColumnDescriptor::new("tinyint(1)")),
        );

        let report = Reconciler::new()
            .reconcile(&reference, &target, &mut crate::NoProgress)
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(
            target.executed(),
            vec![
                "ALTER TABLE `users` MODIFY COLUMN `id` int(11) NOT NULL auto_increment",
                "ALTER TABLE `users` ADD COLUMN `email` varchar(255) NULL",
                "ALTER TABLE `users` DROP COLUMN `legacy_flag`",
            ]
        );
    }

    #[tokio::test]
    async fn test_identical_schemas_execute_nothing() {
        let reference = FakeConnection::new()
            .with_table("orders", orders())
            .with_table("users", users());
        let target = FakeConnection::new()
            .with_table("users", users())
            .with_table("orders", orders());

        let report = Reconciler::new()
            .reconcile(&reference, &target, &mut crate::NoProgress)
            .await
            .unwrap();

        assert_eq!(report.tables_processed, 2);
        assert!(report.applied.is_empty());
        assert!(target.executed().is_empty());
    }

    #[tokio::test]
    async fn test_target_only_tables_are_untouched() {
        let reference = FakeConnection::new().with_table("users", users());
        let target = FakeConnection::new()
            .with_table("users", users())
            .with_table("audit_log", orders());

        let report = Reconciler::new()
            .reconcile(&reference, &target, &mut crate::NoProgress)
            .await
            .unwrap();

        assert_eq!(report.tables_processed, 1);
        assert!(target.executed().is_empty());
    }

    #[tokio::test]
    async fn test_failed_statement_does_not_stop_the_pass() {
        let reference = FakeConnection::new()
            .with_table("users", users())
            .with_table("orders", orders());
        let target = FakeConnection::new()
            .with_table("users", TableSchema::new())
            .fail_statements_containing("`name`");

        let mut events = Vec::new();
        let report = Reconciler::new()
            .reconcile(&reference, &target, &mut |e: &Event| events.push(e.clone()))
            .await
            .unwrap();

        assert!(!report.is_success());
        assert!(!report.aborted);
        assert_eq!(report.tables_processed, 2);
        assert_eq!(report.applied.len(), 5);
        assert_eq!(report.failures.len(), 1);

        let failure = &report.failures[0];
        assert_eq!(failure.table, "users");
        assert_eq!(failure.column.as_deref(), Some("name"));
        assert_eq!(failure.kind, Some(ChangeKind::Add));
        assert!(matches!(failure.error, Error::Connectivity(_)));

        assert!(events.iter().any(|e| matches!(
            e,
            Event::OperationFailed { table, column, kind: ChangeKind::Add, .. }
                if table == "users" && column == "name"
        )));
        assert!(events.contains(&Event::TableFinished {
            table: "users".into(),
            changes: 2
        }));
    }

    #[tokio::test]
    async fn test_abort_stops_at_first_failure() {
        let reference = FakeConnection::new()
            .with_table("users", users())
            .with_table("orders", orders());
        let target = FakeConnection::new().fail_statements_containing("`name`");

        let report = Reconciler::new()
            .on_error(OnError::Abort)
            .reconcile(&reference, &target, &mut crate::NoProgress)
            .await
            .unwrap();

        assert!(report.aborted);
        assert_eq!(report.tables_processed, 1);
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.to_string().contains("Aborted after the first failure."));
    }

    #[tokio::test]
    async fn test_reference_listing_failure_is_fatal() {
        let reference = FakeConnection::new()
            .with_table("users", users())
            .fail_queries();
        let target = FakeConnection::new();

        let err = Reconciler::new()
            .reconcile(&reference, &target, &mut crate::NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connectivity(_)));
        assert!(target.executed().is_empty());
    }

    #[tokio::test]
    async fn test_reference_columns_failure_is_fatal() {
        let reference = FakeConnection::new()
            .with_table("users", users())
            .fail_columns_of("users");
        let target = FakeConnection::new();

        let err = Reconciler::new()
            .reconcile(&reference, &target, &mut crate::NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connectivity(_)));
        assert!(target.executed().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_target_table_is_skipped() {
        let reference = FakeConnection::new()
            .with_table("orders", orders())
            .with_table("users", users());
        let target = FakeConnection::new()
            .with_table("orders", TableSchema::new())
            .fail_columns_of("orders");

        let mut events = Vec::new();
        let report = Reconciler::new()
            .reconcile(&reference, &target, &mut |e: &Event| events.push(e.clone()))
            .await
            .unwrap();

        assert_eq!(report.tables_processed, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].table, "orders");
        assert_eq!(report.failures[0].column, None);
        assert_eq!(report.applied.len(), 3);
        assert!(report.applied.iter().all(|c| c.table() == "users"));
        assert!(events.iter().any(|e| matches!(e, Event::TableFailed { table, .. } if table == "orders")));
    }

    #[tokio::test]
    async fn test_excluded_tables_are_skipped() {
        let reference = FakeConnection::new()
            .with_table("orders", orders())
            .with_table("users", users());
        let target = FakeConnection::new();

        let report = Reconciler::new()
            .exclude(["orders"])
            .reconcile(&reference, &target, &mut crate::NoProgress)
            .await
            .unwrap();

        assert_eq!(report.tables_processed, 1);
        assert!(report.applied.iter().all(|c| c.table() == "users"));
    }

    #[tokio::test]
    async fn test_unsafe_fragment_is_reported() {
        let reference = FakeConnection::new().with_table(
            "t",
            TableSchema::new().with("c", ColumnDescriptor::new("int; DROP TABLE t")),
        );

        let target = FakeConnection::new();
        let report = Reconciler::new()
            .reconcile(&reference, &target, &mut crate::NoProgress)
            .await
            .unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, Error::UnsafeFragment(_)));
        assert!(target.executed().is_empty());

        let target = FakeConnection::new();
        let report = Reconciler::new()
            .validate_fragments(false)
            .reconcile(&reference, &target, &mut crate::NoProgress)
            .await
            .unwrap();
        assert!(report.is_success());
        assert_eq!(target.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_postgres_fragments_skip_quoted_literals() {
        let reference = FakeConnection::with_dialect(Dialect::Postgres).with_table(
            "t",
            TableSchema::new()
                .with("a", ColumnDescriptor::new("text").default_value("';'::text"))
                .with(
                    "b",
                    ColumnDescriptor::new("text")
                        .extra("GENERATED ALWAYS AS ((a || ';'::text)) STORED"),
                ),
        );
        let target =
            FakeConnection::with_dialect(Dialect::Postgres).with_table("t", TableSchema::new());

        let report = Reconciler::new()
            .reconcile(&reference, &target, &mut crate::NoProgress)
            .await
            .unwrap();
        assert!(report.is_success(), "{report}");
        assert_eq!(
            target.executed(),
            vec![
                r#"ALTER TABLE "t" ADD COLUMN "a" text NULL DEFAULT ';'::text"#,
                r#"ALTER TABLE "t" ADD COLUMN "b" text NULL GENERATED ALWAYS AS ((a || ';'::text)) STORED"#,
            ]
        );
    }

    #[tokio::test]
    async fn test_postgres_default_expression_is_checked() {
        let reference = FakeConnection::with_dialect(Dialect::Postgres).with_table(
            "t",
            TableSchema::new().with(
                "c",
                ColumnDescriptor::new("integer").default_value("0; DROP TABLE t"),
            ),
        );
        let target =
            FakeConnection::with_dialect(Dialect::Postgres).with_table("t", TableSchema::new());

        let report = Reconciler::new()
            .reconcile(&reference, &target, &mut crate::NoProgress)
            .await
            .unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            &report.failures[0].error,
            Error::UnsafeFragment(f) if f.kind == FragmentKind::Default
        ));
        assert!(target.executed().is_empty());
    }

    #[tokio::test]
    async fn test_mysql_default_is_a_literal_and_not_checked() {
        let reference = FakeConnection::new().with_table(
            "t",
            TableSchema::new().with(
                "c",
                ColumnDescriptor::new("varchar(8)").default_value("a;b"),
            ),
        );
        let target = FakeConnection::new().with_table("t", TableSchema::new());

        let report = Reconciler::new()
            .reconcile(&reference, &target, &mut crate::NoProgress)
            .await
            .unwrap();
        assert!(report.is_success(), "{report}");
        assert_eq!(
            target.executed(),
            vec!["ALTER TABLE `t` ADD COLUMN `c` varchar(8) NULL DEFAULT 'a;b'"]
        );
    }

    #[tokio::test]
    async fn test_events_stream_to_channel() {
        let reference = FakeConnection::new().with_table("users", users());
        let target = FakeConnection::new().with_table(
            "users",
            users().with("legacy_flag", ColumnDescriptor::new("tinyint(1)")),
        );

        let (mut tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
        Reconciler::new()
            .reconcile(&reference, &target, &mut tx)
            .await
            .unwrap();
        drop(tx);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events[1],
            Event::ColumnDropped {
                table: "users".into(),
                column: "legacy_flag".into()
            }
        );
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_plan_executes_nothing() {
        let reference = FakeConnection::new()
            .with_table("orders", orders())
            .with_table("users", users());
        let target = FakeConnection::new().with_table("users", users());

        let diff = Reconciler::new().plan(&reference, &target).await.unwrap();

        assert!(target.executed().is_empty());
        assert_eq!(diff.table_diffs.len(), 1);
        assert_eq!(diff.table_diffs[0].table, "orders");
        assert!(diff.table_diffs[0].missing_in_target);
        assert_eq!(diff.change_count(), 3);
    }

    #[tokio::test]
    async fn test_plan_then_reconcile_agree() {
        let reference = FakeConnection::new().with_table("users", users());
        let target = FakeConnection::new().with_table(
            "users",
            TableSchema::new().with("nickname", ColumnDescriptor::new("varchar(32)")),
        );

        let reconciler = Reconciler::new();
        let diff = reconciler.plan(&reference, &target).await.unwrap();
        let report = reconciler
            .reconcile(&reference, &target, &mut crate::NoProgress)
            .await
            .unwrap();

        let planned: Vec<Change> = diff
            .table_diffs
            .into_iter()
            .flat_map(|td| td.changes)
            .collect();
        assert_eq!(planned, report.applied);
    }
}
