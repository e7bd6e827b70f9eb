//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Payment gateway configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Which gateway environment charges are routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    /// Live merchant accounts.
    Live,
    /// Sandbox merchant accounts.
    Test,
}

/// Payment gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Selects which merchant id field is used for destination routing.
    #[serde(default = "default_mode")]
    pub mode: GatewayMode,
    /// Per-deployment tag baked into every idempotency key.
    #[serde(default)]
    pub idempotency_tag: String,
    /// ISO 3166 country code used by the local-card fee schedule.
    #[serde(default = "default_home_country")]
    pub home_country: String,
}

fn default_mode() -> GatewayMode {
    GatewayMode::Test
}

fn default_home_country() -> String {
    "SG".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            idempotency_tag: String::new(),
            home_country: default_home_country(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("FAREBOX").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
