//! Column descriptors and per-table schemas as read from a catalog.

use std::fmt;

use colsync_sql::ColumnSpec;
use indexmap::IndexMap;

use crate::connection::CatalogRow;
use crate::{Error, Result};

/// Whether a column permits NULL, as reported by the catalog (`YES`/`NO`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nullability {
    Yes,
    No,
}

impl Nullability {
    /// Parse the catalog's `YES`/`NO` text. Anything else is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "YES" => Some(Nullability::Yes),
            "NO" => Some(Nullability::No),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Nullability::Yes => "YES",
            Nullability::No => "NO",
        }
    }
}

impl fmt::Display for Nullability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural metadata of one column, snapshotted from a catalog.
///
/// Every field is compared verbatim: no case folding, no whitespace or
/// type-spelling normalization, no numeric coercion of defaults. `int(11)`
/// and `int` are different types as far as this crate is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnDescriptor {
    /// Engine-native type expression, e.g. `varchar(255)`.
    pub ty: String,
    pub nullable: Nullability,
    /// Key participation as reported by the engine (`PRI`, `UNI`, `MUL`, empty).
    pub key_role: String,
    /// `None` means no default; `Some("")` is an explicit empty-string default.
    pub default: Option<String>,
    /// Engine-specific modifiers, e.g. `auto_increment`.
    pub extra: String,
}

impl ColumnDescriptor {
    /// A nullable column of the given type with no key, default or extra.
    pub fn new(ty: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            nullable: Nullability::Yes,
            key_role: String::new(),
            default: None,
            extra: String::new(),
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = Nullability::No;
        self
    }

    pub fn key_role(mut self, key_role: impl Into<String>) -> Self {
        self.key_role = key_role.into();
        self
    }

    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self
    }

    /// Borrow this descriptor as the desired shape for DDL rendering.
    pub fn as_spec(&self) -> ColumnSpec<'_> {
        ColumnSpec {
            ty: &self.ty,
            not_null: self.nullable == Nullability::No,
            default: self.default.as_deref(),
            extra: &self.extra,
        }
    }

    /// Build a `(name, descriptor)` pair from one row of a columns query.
    ///
    /// The row must carry `field`, `type`, `null`, `key`, `default` and
    /// `extra`. A NULL `key` or `extra` reads as empty; only `default`
    /// distinguishes NULL from empty.
    pub fn from_row(row: &CatalogRow) -> Result<(String, Self)> {
        let name = required(row, "field")?;
        let ty = required(row, "type")?;
        let null = required(row, "null")?;
        let nullable = Nullability::parse(&null).ok_or_else(|| Error::InvalidNullability {
            column: name.clone(),
            value: null.clone(),
        })?;
        let key_role = optional(row, "key")?.unwrap_or_default();
        let default = optional(row, "default")?;
        let extra = optional(row, "extra")?.unwrap_or_default();

        Ok((
            name,
            Self {
                ty,
                nullable,
                key_role,
                default,
                extra,
            },
        ))
    }
}

fn optional(row: &CatalogRow, column: &str) -> Result<Option<String>> {
    row.get(column)
        .cloned()
        .ok_or_else(|| Error::MalformedRow {
            column: column.to_string(),
        })
}

fn required(row: &CatalogRow, column: &str) -> Result<String> {
    optional(row, column)?.ok_or_else(|| Error::MalformedRow {
        column: column.to_string(),
    })
}

impl fmt::Display for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ty)?;
        if self.nullable == Nullability::Yes {
            write!(f, " (nullable)")?;
        }
        if let Some(default) = &self.default {
            write!(f, " default {:?}", default)?;
        }
        if !self.key_role.is_empty() {
            write!(f, " [{}]", self.key_role)?;
        }
        if !self.extra.is_empty() {
            write!(f, " {}", self.extra)?;
        }
        Ok(())
    }
}

/// The columns of one table, keyed by name, in catalog enumeration order.
///
/// Lookups are by name so comparison ignores order; iteration order is the
/// order the catalog reported, which decides the order of emitted changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: IndexMap<String, ColumnDescriptor>,
}

impl TableSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, builder style.
    pub fn with(mut self, name: impl Into<String>, column: ColumnDescriptor) -> Self {
        self.columns.insert(name.into(), column);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnDescriptor)> {
        self.columns.iter().map(|(name, col)| (name.as_str(), col))
    }
}

impl FromIterator<(String, ColumnDescriptor)> for TableSchema {
    fn from_iter<I: IntoIterator<Item = (String, ColumnDescriptor)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}
