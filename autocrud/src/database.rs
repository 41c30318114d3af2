use std::fmt;
use std::str::FromStr;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use serde::{Deserialize, Serialize};

use crate::config::DbConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbDriver {
    #[default]
    Sqlite,
    Mysql,
    Postgres,
}

impl DbDriver {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    /// Turns a DSN into a connection URL for this driver.
    ///
    /// Full URLs pass through. A bare SQLite DSN is a file path, created if
    /// missing.
    #[must_use]
    pub fn url(self, dsn: &str) -> String {
        if dsn.contains("://") || dsn.starts_with("sqlite:") {
            return dsn.to_string();
        }
        match self {
            Self::Sqlite => format!("sqlite://{dsn}?mode=rwc"),
            Self::Mysql | Self::Postgres => format!("{}://{dsn}", self.as_str()),
        }
    }
}

impl fmt::Display for DbDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DbDriver {
    type Err = DbErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "mysql" => Ok(Self::Mysql),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(DbErr::Custom(format!("unknown database driver `{other}`"))),
        }
    }
}

/// Opens the connection pool described by `config`.
///
/// # Errors
///
/// Fails when the database is unreachable or the driver's cargo feature is
/// not enabled.
pub async fn connect(config: &DbConfig) -> Result<DatabaseConnection, DbErr> {
    let url = config.driver.url(&config.dsn);
    tracing::info!(driver = %config.driver, "connecting to database");

    let mut options = ConnectOptions::new(url);
    options.sqlx_logging(false);
    Database::connect(options).await.map_err(|e| {
        tracing::error!(driver = %config.driver, error = %e, "database connection failed");
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_names() {
        assert_eq!("sqlite".parse::<DbDriver>().unwrap(), DbDriver::Sqlite);
        assert_eq!("Postgres".parse::<DbDriver>().unwrap(), DbDriver::Postgres);
        assert!("oracle".parse::<DbDriver>().is_err());
    }

    #[test]
    fn test_url_from_dsn() {
        assert_eq!(DbDriver::Sqlite.url("todolist.db"), "sqlite://todolist.db?mode=rwc");
        assert_eq!(DbDriver::Sqlite.url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            DbDriver::Postgres.url("user:pw@localhost/app"),
            "postgres://user:pw@localhost/app"
        );
    }

    #[tokio::test]
    async fn test_connect_in_memory() {
        let config = DbConfig {
            driver: DbDriver::Sqlite,
            dsn: "sqlite::memory:".into(),
        };
        let db = connect(&config).await.unwrap();
        assert!(db.ping().await.is_ok());
    }
}
