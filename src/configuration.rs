use std::time::Duration;

use crate::error::ConfigError as SettingsError;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
}

/// Which backing store the repositories talk to
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// Sets the `Secure` attribute on the refresh cookie
    pub secure_cookie: bool,
    pub storage: StorageBackend,
    /// How often expired refresh tokens are swept from storage
    pub purge_interval_seconds: u64,
}

impl ApplicationSettings {
    /// Never zero; `tokio::time::interval` rejects a zero period.
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_seconds.max(1))
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub max_connections: u32,
    /// Deadline applied to every storage round trip
    pub timeout_seconds: u64,
}

impl DatabaseSettings {
    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }

    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// JWT and refresh token settings
#[derive(serde::Deserialize, Clone, Debug)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,   // seconds (86400 = 24 hours)
    pub refresh_token_expiry: i64,  // seconds (604800 = 7 days)
    pub issuer: String,
}

impl JwtSettings {
    /// Fails when no signing secret is configured.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.secret.trim().is_empty() {
            return Err(SettingsError::MissingRequired("jwt.secret".to_string()));
        }
        if self.access_token_expiry <= 0 || self.refresh_token_expiry <= 0 {
            return Err(SettingsError::InvalidValue(
                "token expiry must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cookie attributes derived from the settings
#[derive(Clone, Debug)]
pub struct CookieSettings {
    pub secure: bool,
    pub max_age_seconds: i64,
}

impl Settings {
    pub fn cookie_settings(&self) -> CookieSettings {
        CookieSettings {
            secure: self.application.secure_cookie,
            max_age_seconds: self.jwt.refresh_token_expiry,
        }
    }
}

/// Loads settings from defaults, an optional `configuration` file and
/// `APP_`-prefixed environment variables (`APP_JWT__SECRET=...`).
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8080)?
        .set_default("application.secure_cookie", true)?
        .set_default("application.storage", "postgres")?
        .set_default("application.purge_interval_seconds", 3_600)?
        .set_default("database.username", "postgres")?
        .set_default("database.password", "password")?
        .set_default("database.host", "localhost")?
        .set_default("database.port", 5432)?
        .set_default("database.database_name", "fitness_db")?
        .set_default("database.max_connections", 5)?
        .set_default("database.timeout_seconds", 5)?
        .set_default("jwt.secret", "")?
        .set_default("jwt.access_token_expiry", 86_400)?
        .set_default("jwt.refresh_token_expiry", 604_800)?
        .set_default("jwt.issuer", "fitness-app")?
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
