//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which `DatabaseService` adapter backs the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Json,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "json" => Ok(StorageBackend::Json),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::InvalidValue(
                "STORAGE_BACKEND".to_string(),
                format!("'{}' is not one of sqlite, json, memory", other),
            )),
        }
    }
}

/// Azure AD app registration used to validate Microsoft sign-in tokens.
#[derive(Clone, Debug)]
pub struct AzureConfig {
    pub tenant_id: String,
    pub client_id: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub cors_origin: String,

    // --- Storage ---
    pub storage_backend: StorageBackend,
    pub database_url: String,
    pub json_store_path: PathBuf,

    // --- Auth ---
    pub jwt_secret: String,
    pub access_token_expiry_secs: u64,
    pub refresh_token_expiry_secs: u64,
    pub session_sweep_interval_secs: u64,
    pub azure: Option<AzureConfig>,

    // --- Providers ---
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub perplexity_api_key: Option<String>,
    pub serper_api_key: Option<String>,
    pub openai_model: String,
    pub gemini_model: String,
    pub perplexity_model: String,
    pub embedding_model: String,

    // --- Browser automation ---
    pub browser_debug_url: String,
    pub chat_url: String,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    let raw = var_or(name, default);
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("'{}': {}", raw, e)))
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server Settings ---
        let bind_address = parse_var::<SocketAddr>("BIND_ADDRESS", "0.0.0.0:3001")?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;
        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:3000");

        // --- Load Storage Settings ---
        let storage_backend = var_or("STORAGE_BACKEND", "sqlite").parse::<StorageBackend>()?;
        let database_url = var_or("DATABASE_URL", "sqlite://genfuze.db");
        let json_store_path = PathBuf::from(var_or("JSON_STORE_PATH", "./data/genfuze.json"));

        // --- Load Auth Settings ---
        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingVar("JWT_SECRET".to_string()))?;
        if jwt_secret.len() < 16 {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                "must be at least 16 characters".to_string(),
            ));
        }
        let access_token_expiry_secs = parse_var("JWT_ACCESS_TOKEN_EXPIRY", "900")?;
        let refresh_token_expiry_secs = parse_var("JWT_REFRESH_TOKEN_EXPIRY", "604800")?;
        let session_sweep_interval_secs = parse_var("SESSION_SWEEP_INTERVAL_SECS", "3600")?;

        let azure = match (optional_var("AZURE_TENANT_ID"), optional_var("AZURE_CLIENT_ID")) {
            (Some(tenant_id), Some(client_id)) => Some(AzureConfig { tenant_id, client_id }),
            _ => None,
        };

        // --- Load API Keys (as optional) ---
        let openai_api_key = optional_var("OPENAI_API_KEY");
        let gemini_api_key = optional_var("GEMINI_API_KEY");
        let perplexity_api_key = optional_var("PERPLEXITY_API_KEY");
        let serper_api_key = optional_var("SERPER_API_KEY");

        // --- Load Adapter-specific Settings ---
        let openai_model = var_or("DEFAULT_OPENAI_MODEL", "gpt-4o-mini");
        let gemini_model = var_or("DEFAULT_GEMINI_MODEL", "gemini-1.5-flash");
        let perplexity_model = var_or("DEFAULT_PERPLEXITY_MODEL", "sonar");
        let embedding_model = var_or("EMBEDDING_MODEL", "text-embedding-3-small");

        let browser_debug_url = var_or("BROWSER_DEBUG_URL", "http://localhost:9222");
        let chat_url = var_or("CHAT_URL", "https://chatgpt.com/");

        Ok(Self {
            bind_address,
            log_level,
            cors_origin,
            storage_backend,
            database_url,
            json_store_path,
            jwt_secret,
            access_token_expiry_secs,
            refresh_token_expiry_secs,
            session_sweep_interval_secs,
            azure,
            openai_api_key,
            gemini_api_key,
            perplexity_api_key,
            serper_api_key,
            openai_model,
            gemini_model,
            perplexity_model,
            embedding_model,
            browser_debug_url,
            chat_url,
        })
    }

    /// A configuration with no external keys and an in-memory store, for tests.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_level: Level::INFO,
            cors_origin: "http://localhost:3000".to_string(),
            storage_backend: StorageBackend::Memory,
            database_url: "sqlite::memory:".to_string(),
            json_store_path: PathBuf::from("./data/test.json"),
            jwt_secret: jwt_secret.to_string(),
            access_token_expiry_secs: 900,
            refresh_token_expiry_secs: 604_800,
            session_sweep_interval_secs: 3600,
            azure: None,
            openai_api_key: None,
            gemini_api_key: None,
            perplexity_api_key: None,
            serper_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            gemini_model: "gemini-1.5-flash".to_string(),
            perplexity_model: "sonar".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            browser_debug_url: "http://localhost:9222".to_string(),
            chat_url: "https://chatgpt.com/".to_string(),
        }
    }
}
