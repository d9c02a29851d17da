use crate::error::AppError;
use config::{Config as Cfg, Environment, File};
use serde::Deserialize;

const DEFAULT_PORT: u16 = 3000;

/// Listener settings shared by every binary in the workspace.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

impl Config {
    /// Layers an optional `configuration.{toml,yaml,json}` file under
    /// `APP__*` environment variables, after loading `.env` if present.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_sources(Environment::with_prefix("APP").separator("__"))
    }

    fn from_sources(env: Environment) -> Result<Self, AppError> {
        let settings = Cfg::builder()
            .set_default("port", i64::from(DEFAULT_PORT))?
            .add_source(File::with_name("configuration").required(false))
            .add_source(env)
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
