//! Configuration system for the brand shop server.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! A `.env` file is read by the binary before configuration is loaded, so the
//! variables below may live there as well.
//!
//! # Environment Variables
//!
//! - `PORT` / `BRANDSHOP_PORT` - Server port (`BRANDSHOP_PORT` wins)
//! - `BRANDSHOP_HOST` - Server bind address
//! - `DB_USERNAME` - MongoDB username
//! - `DB_PASSWORD` - MongoDB password
//! - `BRANDSHOP_DATABASE_BACKEND` - `mongodb` or `memory`
//! - `BRANDSHOP_DATABASE_URI` - Full MongoDB connection string
//! - `BRANDSHOP_DATABASE_HOST` - MongoDB SRV host (used when no URI is set)
//! - `BRANDSHOP_DATABASE_NAME` - Database name
//! - `ACCESS_TOKEN_SECRET` - Secret used to sign the `token` cookie
//! - `BRANDSHOP_TOKEN_EXPIRATION_SECS` - Token lifetime in seconds
//! - `BRANDSHOP_COOKIE_SECURE` - Mark the `token` cookie as `Secure`
//! - `BRANDSHOP_ENFORCE_CART_OWNER` - Require `/cart?email=` to match the token
//! - `BRANDSHOP_CORS_ORIGIN` - The single trusted browser origin
//! - `BRANDSHOP_LOGGING_ENABLED` - Enable the tracing subscriber
//! - `BRANDSHOP_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use config::Config;
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;

use crate::errors::{ShopError, ShopResult};

/// Global configuration singleton.
static CONFIG: OnceLock<ShopConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Token and cookie configuration
    pub auth: AuthConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Storage backend: "mongodb" or "memory"
    pub backend: String,
    /// Full connection string; overrides `host`, `username` and `password` when set
    pub uri: String,
    /// SRV host of the MongoDB cluster
    pub host: String,
    /// MongoDB username
    pub username: String,
    /// MongoDB password
    pub password: String,
    /// Database holding the `companies`, `cart` and `products` collections
    pub name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: "mongodb".to_string(),
            uri: String::new(),
            host: "cluster0.mongodb.net".to_string(),
            username: String::new(),
            password: String::new(),
            name: "brandShop".to_string(),
        }
    }
}

/// Token and cookie configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret used to sign tokens
    pub jwt_secret: String,
    /// Token lifetime in seconds (default: 1 hour)
    pub token_expiration_secs: u64,
    /// Add the `Secure` attribute to the `token` cookie
    pub cookie_secure: bool,
    /// Reject `/cart` lookups for an email other than the token's
    pub enforce_cart_owner: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_expiration_secs: 3600,
            cookie_secure: false,
            enforce_cart_owner: true,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// The one origin allowed to call the API with credentials
    pub allowed_origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin: "http://localhost:5173".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
        }
    }
}

/// Parse an environment variable. Unset is `None`; set but unparsable is an error.
fn env_parsed<T>(name: &str) -> ShopResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value.trim().parse::<T>().map(Some).map_err(|e| {
            ShopError::ConfigError(format!("invalid value '{value}' for {name}: {e}"))
        }),
        Err(_) => Ok(None),
    }
}

impl ShopConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `config.toml` file (optional)
    /// 3. Environment variables
    pub fn load() -> ShopResult<Self> {
        let port = match env_parsed::<u16>("BRANDSHOP_PORT")? {
            Some(port) => Some(port),
            None => env_parsed::<u16>("PORT")?,
        };

        let settings = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("database.backend", "mongodb")?
            .set_default("database.uri", "")?
            .set_default("database.host", "cluster0.mongodb.net")?
            .set_default("database.username", "")?
            .set_default("database.password", "")?
            .set_default("database.name", "brandShop")?
            .set_default("auth.jwt_secret", "")?
            .set_default("auth.token_expiration_secs", 3600)?
            .set_default("auth.cookie_secure", false)?
            .set_default("auth.enforce_cart_owner", true)?
            .set_default("cors.allowed_origin", "http://localhost:5173")?
            .set_default("logging.enabled", true)?
            .set_default("logging.level", "info")?
            // Load from config.toml (optional)
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables
            .set_override_option("server.host", env::var("BRANDSHOP_HOST").ok())?
            .set_override_option("server.port", port.map(i64::from))?
            .set_override_option(
                "database.backend",
                env::var("BRANDSHOP_DATABASE_BACKEND").ok(),
            )?
            .set_override_option("database.uri", env::var("BRANDSHOP_DATABASE_URI").ok())?
            .set_override_option("database.host", env::var("BRANDSHOP_DATABASE_HOST").ok())?
            .set_override_option("database.username", env::var("DB_USERNAME").ok())?
            .set_override_option("database.password", env::var("DB_PASSWORD").ok())?
            .set_override_option("database.name", env::var("BRANDSHOP_DATABASE_NAME").ok())?
            .set_override_option("auth.jwt_secret", env::var("ACCESS_TOKEN_SECRET").ok())?
            .set_override_option(
                "auth.token_expiration_secs",
                env_parsed::<u32>("BRANDSHOP_TOKEN_EXPIRATION_SECS")?.map(i64::from),
            )?
            .set_override_option(
                "auth.cookie_secure",
                env_parsed::<bool>("BRANDSHOP_COOKIE_SECURE")?,
            )?
            .set_override_option(
                "auth.enforce_cart_owner",
                env_parsed::<bool>("BRANDSHOP_ENFORCE_CART_OWNER")?,
            )?
            .set_override_option("cors.allowed_origin", env::var("BRANDSHOP_CORS_ORIGIN").ok())?
            .set_override_option(
                "logging.enabled",
                env_parsed::<bool>("BRANDSHOP_LOGGING_ENABLED")?,
            )?
            .set_override_option("logging.level", env::var("BRANDSHOP_LOG_LEVEL").ok())?
            .build()
            .map_err(|e| ShopError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| ShopError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ShopResult<()> {
        if self.server.port == 0 {
            return Err(ShopError::ConfigError(
                "server.port must be greater than 0".to_string(),
            ));
        }

        match self.database.backend.as_str() {
            "mongodb" => {
                let has_credentials =
                    !self.database.username.is_empty() && !self.database.password.is_empty();
                if self.database.uri.is_empty() && !has_credentials {
                    return Err(ShopError::ConfigError(
                        "database.uri or database.username and database.password are required \
                         for the mongodb backend"
                            .to_string(),
                    ));
                }
            }
            "memory" => {}
            other => {
                return Err(ShopError::ConfigError(format!(
                    "database.backend must be 'mongodb' or 'memory', got '{other}'"
                )));
            }
        }

        if self.database.name.is_empty() {
            return Err(ShopError::ConfigError(
                "database.name cannot be empty".to_string(),
            ));
        }

        if self.auth.jwt_secret.is_empty() {
            return Err(ShopError::ConfigError(
                "auth.jwt_secret is required (set ACCESS_TOKEN_SECRET)".to_string(),
            ));
        }

        if self.auth.token_expiration_secs == 0 {
            return Err(ShopError::ConfigError(
                "auth.token_expiration_secs must be greater than 0".to_string(),
            ));
        }

        if self.cors.allowed_origin.is_empty() {
            return Err(ShopError::ConfigError(
                "cors.allowed_origin cannot be empty".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ShopError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }
}

/// Get the global configuration.
///
/// Loads and validates the configuration on first access and caches it.
pub fn get_config() -> ShopResult<&'static ShopConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = ShopConfig::load()?;
    config.validate()?;

    // Another thread may have won the race; either value is equivalent.
    let _ = CONFIG.set(config);

    CONFIG
        .get()
        .ok_or_else(|| ShopError::ConfigError("configuration was not initialised".to_string()))
}

/// Initialize configuration explicitly.
///
/// Call this early in the binary to surface configuration errors at startup.
pub fn init_config() -> ShopResult<&'static ShopConfig> {
    get_config()
}
