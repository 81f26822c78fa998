use thiserror::Error;

/// Boxed error coming out of a connection implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// The connection could not run a statement: transport, auth or SQL failure.
    #[error("connectivity error: {0}")]
    Connectivity(#[source] BoxError),

    /// The table is absent on the connection it was read from.
    #[error("table {table:?} does not exist")]
    UnknownTable { table: String },

    #[error("catalog row has no {column:?} column")]
    MalformedRow { column: String },

    #[error("column {column:?} reports nullability {value:?}, expected YES or NO")]
    InvalidNullability { column: String, value: String },

    #[error(transparent)]
    UnsafeFragment(#[from] colsync_sql::UnsafeFragment),

    #[error("could not build connection pool: {0}")]
    Pool(String),
}

impl Error {
    /// Wrap any driver error as a connectivity failure.
    pub fn connectivity(err: impl Into<BoxError>) -> Self {
        Error::Connectivity(err.into())
    }

    pub fn is_unknown_table(&self) -> bool {
        matches!(self, Error::UnknownTable { .. })
    }
}

impl From<tokio_postgres::Error> for Error {
    fn from(err: tokio_postgres::Error) -> Self {
        Error::Connectivity(Box::new(err))
    }
}

impl From<deadpool_postgres::PoolError> for Error {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Error::Connectivity(Box::new(err))
    }
}
