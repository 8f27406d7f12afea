//! Settings for the `ledger` binary.
//!
//! Read from an optional TOML file (`settings.toml` unless `--config` says
//! otherwise), then from `LEDGER__*` environment variables, e.g.
//! `LEDGER__APP__LEVEL=debug` or `LEDGER__TIMEZONE=Europe/Rome`.
//!
//! ```toml
//! timezone = "America/Sao_Paulo"
//!
//! [app]
//! level = "info"
//!
//! [database]
//! sqlite = "./ledger.db"
//! ```
use config::{Config, ConfigError, Environment, File, Source};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "settings";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Default for Database {
    fn default() -> Self {
        Self::Sqlite("./ledger.db".to_string())
    }
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Self::Memory => "sqlite::memory:".to_string(),
            Self::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    /// IANA name. Empty means UTC.
    pub timezone: String,
}

impl Settings {
    pub fn new(path: Option<&str>) -> Result<Self, ConfigError> {
        Self::load(
            File::with_name(path.unwrap_or(DEFAULT_CONFIG_PATH)).required(path.is_some()),
            environment(),
        )
    }

    /// Environment values win over the file.
    fn load<F>(file: F, env: Environment) -> Result<Self, ConfigError>
    where
        F: Source + Send + Sync + 'static,
    {
        let settings = Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?;

        settings.try_deserialize()
    }
}

fn environment() -> Environment {
    Environment::with_prefix("LEDGER").separator("__")
}
