use std::env;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

impl Server {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    /// PostgreSQL URL. Without one the server keeps everything in memory.
    #[serde(default)]
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Auth {
    /// HS256 signing key for access tokens.
    pub secret: String,
    pub token_ttl_hours: i64,
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            secret: String::new(),
            token_ttl_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Google {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl Google {
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

impl Default for Google {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: "http://localhost:8080/auth/google/callback".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Frontend {
    pub url: String,
}

impl Default for Frontend {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Notes {
    pub excerpt_limit: usize,
}

impl Default for Notes {
    fn default() -> Self {
        Self {
            excerpt_limit: store::EXCERPT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub database: Database,
    pub auth: Auth,
    pub google: Google,
    pub frontend: Frontend,
    pub notes: Notes,
}

impl Settings {
    /// Load settings from defaults, an optional `config.toml`, then
    /// `NOTES__SECTION__KEY` environment variables. `SECRET` and
    /// `DATABASE_URL` are honoured as shorthands.
    pub fn new() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Settings::default();
        let config = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default(
                "database.max_connections",
                i64::from(defaults.database.max_connections),
            )?
            .set_default("auth.secret", defaults.auth.secret)?
            .set_default("auth.token_ttl_hours", defaults.auth.token_ttl_hours)?
            .set_default("google.client_id", defaults.google.client_id)?
            .set_default("google.client_secret", defaults.google.client_secret)?
            .set_default("google.redirect_url", defaults.google.redirect_url)?
            .set_default("frontend.url", defaults.frontend.url)?
            .set_default("notes.excerpt_limit", defaults.notes.excerpt_limit as i64)?
            .add_source(
                File::with_name("config.toml")
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix("NOTES").separator("__"))
            .set_override_option("auth.secret", env::var("SECRET").ok())?
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        if settings.auth.secret.is_empty() {
            return Err(ConfigError::Message(
                "SECRET must be set to sign access tokens".into(),
            ));
        }
        Ok(settings)
    }
}
