//! SQL text for colsync.
//!
//! Everything in here is pure string building: identifier and literal
//! quoting, the catalog queries each engine answers, and the column-level
//! `ALTER TABLE` statements used to bring a target schema in line.

mod ddl;
pub use ddl::*;

mod dialect;
pub use dialect::*;

/// A string literal wrapper.
///
/// Display writes the value escaped and quoted with single quotes.
///
/// # Example
/// ```
/// use colsync_sql::Lit;
/// assert_eq!(format!("{}", Lit("foo")), "'foo'");
/// assert_eq!(format!("{}", Lit("it's")), "'it''s'");
/// ```
pub struct Lit<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for Lit<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_quoted(f, self.0.as_ref(), '\'')
    }
}

/// A MySQL string literal wrapper.
///
/// Like [`Lit`], but backslashes are doubled too, since MySQL treats them
/// as escape characters inside string literals by default.
///
/// # Example
/// ```
/// use colsync_sql::MySqlLit;
/// assert_eq!(format!("{}", MySqlLit("C:\\tmp")), "'C:\\\\tmp'");
/// ```
pub struct MySqlLit<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for MySqlLit<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'")?;
        for c in self.0.as_ref().chars() {
            match c {
                '\'' => write!(f, "''")?,
                '\\' => write!(f, "\\\\")?,
                c => write!(f, "{}", c)?,
            }
        }
        write!(f, "'")
    }
}

/// A PostgreSQL identifier wrapper.
///
/// Display writes the value escaped and quoted with double quotes.
///
/// # Example
/// ```
/// use colsync_sql::Ident;
/// assert_eq!(format!("{}", Ident("user")), "\"user\"");
/// assert_eq!(format!("{}", Ident("bla\"h")), "\"bla\"\"h\"");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_quoted(f, self.0.as_ref(), '"')
    }
}

/// A MySQL identifier wrapper, quoted with backticks.
///
/// # Example
/// ```
/// use colsync_sql::BacktickIdent;
/// assert_eq!(format!("{}", BacktickIdent("order")), "`order`");
/// assert_eq!(format!("{}", BacktickIdent("a`b")), "`a``b`");
/// ```
pub struct BacktickIdent<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for BacktickIdent<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_quoted(f, self.0.as_ref(), '`')
    }
}

/// Write `s` wrapped in `quote`, doubling any embedded `quote`.
fn write_quoted(f: &mut std::fmt::Formatter<'_>, s: &str, quote: char) -> std::fmt::Result {
    write!(f, "{}", quote)?;
    for c in s.chars() {
        if c == quote {
            write!(f, "{}{}", quote, quote)?;
        } else {
            write!(f, "{}", c)?;
        }
    }
    write!(f, "{}", quote)
}

/// What kind of catalog-reported text a fragment is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Type,
    Extra,
    Default,
}

impl std::fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FragmentKind::Type => write!(f, "type"),
            FragmentKind::Extra => write!(f, "extra"),
            FragmentKind::Default => write!(f, "default expression"),
        }
    }
}

/// A catalog-reported fragment that cannot be spliced into DDL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("refusing to splice {kind} {text:?} into DDL: contains {reason}")]
pub struct UnsafeFragment {
    pub kind: FragmentKind,
    pub text: String,
    pub reason: &'static str,
}

/// Check that a type, extra or default expression read from a catalog is safe
/// to splice verbatim into a DDL statement.
///
/// These cannot be bound as parameters, so anything that could terminate the
/// statement or open a comment is rejected. The contents of single-quoted
/// literals (with `''` escapes) are skipped, so `';'::text` inside a
/// generated-column expression is fine; a literal that never closes is not.
///
/// # Example
/// ```
/// use colsync_sql::{FragmentKind, check_fragment};
/// assert!(check_fragment(FragmentKind::Type, "varchar(255)").is_ok());
/// assert!(check_fragment(FragmentKind::Type, "int; DROP TABLE x").is_err());
/// assert!(check_fragment(FragmentKind::Default, "';'::text").is_ok());
/// ```
pub fn check_fragment(kind: FragmentKind, text: &str) -> Result<(), UnsafeFragment> {
    let reject = |reason| {
        Err(UnsafeFragment {
            kind,
            text: text.to_string(),
            reason,
        })
    };

    // Blank out literal contents, keeping the quotes so `''` stays balanced
    let mut outside = String::with_capacity(text.len());
    let mut in_literal = false;
    for c in text.chars() {
        if c == '\'' {
            in_literal = !in_literal;
            outside.push(c);
        } else if in_literal {
            outside.push(' ');
        } else {
            outside.push(c);
        }
    }

    if in_literal {
        return reject("an unterminated string literal");
    }
    if outside.contains(';') {
        return reject("a statement terminator");
    }
    if outside.contains("--") || outside.contains("/*") || outside.contains("*/") {
        return reject("a comment marker");
    }
    if outside.chars().any(char::is_control) {
        return reject("a control character");
    }
    Ok(())
}
