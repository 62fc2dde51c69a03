//! Handles settings for the application. Configuration is read from an
//! optional `settings.toml` and `TRIPSYNC_*` environment variables, e.g.
//! `TRIPSYNC_SERVER__PORT=8080`.
//!
//! See `settings.toml` for the configuration.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub database: Database,
    pub bind: Option<String>,
    pub port: u16,
}

#[derive(Debug, Default, Deserialize)]
pub struct Ai {
    /// Remote diff generator. Proposals fail with 502 when unset.
    pub endpoint: Option<String>,
    /// Lifetime of a proposal nonce.
    pub ttl_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub server: Option<Server>,
    #[serde(default)]
    pub ai: Ai,
}

fn default_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("app.level", default_level())?
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("TRIPSYNC").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn parse(toml: &str) -> Settings {
        Config::builder()
            .set_default("app.level", default_level())
            .unwrap()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn full_settings() {
        let settings = parse(
            r#"
            [app]
            level = "debug"

            [server]
            database = { sqlite = "trips.db" }
            port = 3000

            [ai]
            endpoint = "http://127.0.0.1:9000/edits"
            ttl_seconds = 120
            "#,
        );
        assert_eq!(settings.app.level, "debug");
        let server = settings.server.unwrap();
        assert!(matches!(server.database, Database::Sqlite(path) if path == "trips.db"));
        assert_eq!(server.bind, None);
        assert_eq!(settings.ai.ttl_seconds, Some(120));
    }

    #[test]
    fn defaults_without_server_or_ai() {
        let settings = parse("");
        assert_eq!(settings.app.level, "info");
        assert!(settings.server.is_none());
        assert!(settings.ai.endpoint.is_none());
    }

    #[test]
    fn memory_database() {
        let settings = parse(
            r#"
            [server]
            database = "memory"
            port = 8080
            "#,
        );
        assert!(matches!(
            settings.server.unwrap().database,
            Database::Memory
        ));
    }
}
