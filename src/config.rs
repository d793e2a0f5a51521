use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use dotenvy::dotenv;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub addr: String,
    pub port: u16,
    pub cors_origin: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Process-wide signing secret. Must be provided at startup; there is no
    /// usable default.
    pub secret: String,
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
}

fn default_token_ttl_minutes() -> i64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub web: WebConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, figment::Error> {
        dotenv().ok();

        let config: AppConfig = Figment::new()
            .merge(Toml::file("Config.toml")) // For non-sensitive defaults
            .merge(Env::prefixed("APP_").split("__")) // e.g., APP_JWT__SECRET
            .extract()?;

        // An empty secret deserializes fine but signs nothing worth trusting.
        // Refuse to start rather than serve traffic with it.
        if config.jwt.secret.is_empty() {
            return Err(figment::Error::from(
                "jwt.secret (APP_JWT__SECRET) must be set to a non-empty value".to_string(),
            ));
        }

        tracing::info!("Configuration loaded for {}:{}", config.web.addr, config.web.port);

        Ok(config)
    }
}
