use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::value_objects::Credentials;

/// Default image new instances are launched from.
pub const DEFAULT_IMAGE: &str = "mariadb";

/// Process-wide configuration, read once at startup.
///
/// Sources, highest priority first: real environment variables, then a `.env`
/// file in the working directory. The `.env` file is parsed without writing
/// anything back into the process environment, and nothing later mutates
/// these values — connection coordinates are threaded explicitly from here.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Login shared by every instance in the fleet.
    pub credentials: Credentials,
    /// `PORT`: default port for direct connections when no instance is named.
    pub default_port: Option<u16>,
    /// `MARIADB_IMAGE`: image new instances are launched from.
    pub image: String,
}

impl Settings {
    /// Load from the process environment plus `./.env`.
    pub fn load() -> Result<Self> {
        let process_env: BTreeMap<String, String> = std::env::vars().collect();
        let dotenv = read_env_file(Path::new(".env")).unwrap_or_default();
        Self::from_sources(&process_env, &dotenv)
    }

    /// Pure assembly from two pre-read variable maps; `env` wins over `dotenv`.
    pub fn from_sources(
        env: &BTreeMap<String, String>,
        dotenv: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let get = |key: &str| -> Option<String> {
            env.get(key).or_else(|| dotenv.get(key)).cloned()
        };

        let user = get("USER").context("USER is not set (environment or .env)")?;
        let password = get("PASSWORD").context("PASSWORD is not set (environment or .env)")?;
        let host = get("HOST").context("HOST is not set (environment or .env)")?;

        let default_port = match get("PORT") {
            Some(raw) => Some(
                raw.parse::<u16>()
                    .with_context(|| format!("PORT is not a valid port number: '{raw}'"))?,
            ),
            None => None,
        };

        let image = get("MARIADB_IMAGE").unwrap_or_else(|| DEFAULT_IMAGE.to_string());

        Ok(Settings {
            credentials: Credentials {
                user,
                password,
                host,
            },
            default_port,
            image,
        })
    }
}

/// Parse a `.env` file into a map without touching the process environment.
///
/// Missing file is not an error — the caller falls back to the environment
/// alone, same as running without a `.env`.
pub fn read_env_file(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to read env file: {}", path.display()))?;

    let mut vars = BTreeMap::new();
    for item in iter {
        let (key, value) =
            item.with_context(|| format!("failed to parse env file: {}", path.display()))?;
        vars.insert(key, value);
    }
    Ok(vars)
}
