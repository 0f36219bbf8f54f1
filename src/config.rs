use crate::readers::Source;
use anyhow::{Result, bail};
use std::fmt;
use std::num::NonZeroUsize;

pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = NonZeroUsize::new(100_000).unwrap();

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Driver {
    Postgres,
    Mysql,
}

impl Driver {
    pub fn default_port(&self) -> u16 {
        match self {
            Driver::Postgres => 5432,
            Driver::Mysql => 3306,
        }
    }

    fn scheme(&self) -> &'static str {
        match self {
            Driver::Postgres => "postgresql",
            Driver::Mysql => "mysql",
        }
    }
}

/// Destination database credentials.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub driver: Driver,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
}

impl DatabaseConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.driver.default_port())
    }

    /// Connection URI with the password masked, for logs.
    pub fn get_uri(&self) -> String {
        format!(
            "{}://{}:***@{}:{}/{}",
            self.driver.scheme(),
            self.user,
            self.host,
            self.port(),
            self.database
        )
    }

    pub fn postgres_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .user(&self.user)
            .password(&self.password)
            .host(&self.host)
            .port(self.port())
            .dbname(&self.database)
            .application_name("taxiload");
        config
    }

    pub fn mysql_opts(&self) -> mysql_async::Opts {
        mysql_async::OptsBuilder::default()
            .ip_or_hostname(self.host.clone())
            .tcp_port(self.port())
            .user(Some(self.user.clone()))
            .pass(Some(self.password.clone()))
            .db_name(Some(self.database.clone()))
            .into()
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("driver", &self.driver)
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port())
            .field("database", &self.database)
            .finish()
    }
}

/// What to read and where it goes.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub source: Source,
    pub target_table: String,
    pub chunk_size: NonZeroUsize,
}

impl IngestConfig {
    pub fn build(source: Source, target_table: String, chunk_size: NonZeroUsize) -> Result<IngestConfig> {
        let target_table = target_table.trim().to_string();
        if target_table.is_empty() {
            bail!("Target table name must not be empty.");
        }
        Ok(IngestConfig {
            source,
            target_table,
            chunk_size,
        })
    }
}
