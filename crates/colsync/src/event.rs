//! Progress events emitted during a reconciliation pass.
//!
//! The reconciler never prints. It reports what it does through a
//! [`Progress`] sink and lets the caller decide how to present it.

use std::fmt;

use tokio::sync::mpsc::UnboundedSender;

use crate::diff::ChangeKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Started processing a reference table.
    TableStarted { table: String },
    ColumnAdded { table: String, column: String },
    ColumnModified { table: String, column: String },
    ColumnDropped { table: String, column: String },
    /// A DDL statement failed; the pass moves on.
    OperationFailed {
        table: String,
        column: String,
        kind: ChangeKind,
        error: String,
    },
    /// The target side of a table could not be read; the table is skipped.
    TableFailed { table: String, error: String },
    /// Done with a table; `changes` counts the statements that succeeded.
    TableFinished { table: String, changes: usize },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::TableStarted { table } => write!(f, "syncing table {}", table),
            Event::ColumnAdded { table, column } => {
                write!(f, "added column {} to table {}", column, table)
            }
            Event::ColumnModified { table, column } => {
                write!(f, "modified column {} in table {}", column, table)
            }
            Event::ColumnDropped { table, column } => {
                write!(f, "dropped column {} from table {}", column, table)
            }
            Event::OperationFailed {
                table,
                column,
                kind,
                error,
            } => write!(f, "failed to {} column {}.{}: {}", kind, table, column, error),
            Event::TableFailed { table, error } => {
                write!(f, "skipped table {}: {}", table, error)
            }
            Event::TableFinished { table, changes } => {
                write!(f, "finished table {} ({} change(s))", table, changes)
            }
        }
    }
}

/// A sink for progress events.
pub trait Progress {
    fn on_event(&mut self, event: &Event);
}

impl<F: FnMut(&Event)> Progress for F {
    fn on_event(&mut self, event: &Event) {
        self(event)
    }
}

/// Stream events to a channel. A closed receiver is ignored.
impl Progress for UnboundedSender<Event> {
    fn on_event(&mut self, event: &Event) {
        let _ = self.send(event.clone());
    }
}

/// Forward events to `tracing`: failures at warn level, the rest at info.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn on_event(&mut self, event: &Event) {
        match event {
            Event::OperationFailed { .. } | Event::TableFailed { .. } => {
                tracing::warn!("{}", event)
            }
            _ => tracing::info!("{}", event),
        }
    }
}

/// Discard every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn on_event(&mut self, _event: &Event) {}
}
