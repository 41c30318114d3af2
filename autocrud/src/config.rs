//! Configuration loaded with Figment.
//!
//! Sources, lowest precedence first:
//! 1. Defaults (in-memory SQLite, `0.0.0.0:8086`, `debug`)
//! 2. A TOML file, when given
//! 3. Environment variables prefixed `AUTOCRUD_`, nested with `__`
//!    (`AUTOCRUD_DB__DSN=todolist.db`, `AUTOCRUD_LOG_LEVEL=info`)
//!
//! ```toml
//! log_level = "info"
//!
//! [db]
//! driver = "sqlite"
//! dsn = "todolist.db"
//!
//! [http]
//! addr = "127.0.0.1:8086"
//! ```

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::database::DbDriver;
use crate::logging::LogLevel;

pub const ENV_PREFIX: &str = "AUTOCRUD_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default)]
    pub driver: DbDriver,
    #[serde(default = "default_dsn")]
    pub dsn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
}

fn default_dsn() -> String {
    "sqlite::memory:".to_string()
}

fn default_addr() -> String {
    "0.0.0.0:8086".to_string()
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            driver: DbDriver::default(),
            dsn: default_dsn(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

impl Config {
    /// Defaults overridden by the environment.
    ///
    /// # Errors
    ///
    /// Fails when a value has the wrong type, e.g. an unknown driver.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment(None).extract()
    }

    /// Defaults, then the TOML file at `path` (skipped if missing), then the
    /// environment.
    ///
    /// # Errors
    ///
    /// Fails when the file is malformed or a value has the wrong type.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Self::figment(Some(path.as_ref())).extract()
    }

    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}
