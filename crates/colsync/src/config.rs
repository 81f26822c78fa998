//! Connection settings for one database.

use std::fmt;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

use crate::{Error, Result};

/// Where and how to connect to one database.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl DatabaseConfig {
    pub const DEFAULT_PORT: u16 = 5432;

    pub fn new(
        host: impl Into<String>,
        dbname: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            dbname: dbname.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user)
            .password(&self.password)
            .application_name("colsync");
        config
    }

    /// Open a single client and drive its connection on the tokio runtime.
    pub async fn connect(&self) -> Result<tokio_postgres::Client> {
        let (client, connection) = self.to_pg_config().connect(NoTls).await?;

        let label = self.to_string();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(database = %label, error = %e, "database connection error");
            }
        });

        Ok(client)
    }

    /// Build a pool holding at most one connection.
    ///
    /// A reconciliation pass only ever needs one connection per side.
    pub fn create_pool(&self) -> Result<Pool> {
        let manager = Manager::from_config(
            self.to_pg_config(),
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        Pool::builder(manager)
            .max_size(1)
            .build()
            .map_err(|e| Error::Pool(e.to_string()))
    }
}

/// `user@host:port/dbname`, never the password.
impl fmt::Display for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}/{}", self.user, self.host, self.port, self.dbname)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}
