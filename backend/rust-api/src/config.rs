use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Result<Self, config::ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(config::ConfigError::Message(format!(
                "Unknown database backend '{}', expected 'mongo' or 'memory'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub api_url: String,
    pub model: String,
    pub api_token: Option<String>,
    /// Forces one sampling temperature on every call when set.
    pub temperature: Option<f32>,
    /// Upper bound on `max_new_tokens` for any single call.
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub mongo_uri: String,
    pub mongo_database: String,
    pub redis_uri: Option<String>,
    pub jwt_secret: String,
    pub llm: LlmConfig,
    pub bind_addr: String,
    pub assessment_ttl_hours: i64,
}

/// Thirty days.
const MAX_ASSESSMENT_TTL_HOURS: i64 = 720;

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first (two levels up), then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let store_backend = settings
            .get_string("database.backend")
            .or_else(|_| env::var("DATABASE_BACKEND"))
            .map(|value| StoreBackend::parse(&value))
            .unwrap_or(Ok(StoreBackend::Mongo))?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "learning_platform".to_string());

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .ok()
            .filter(|value| !value.trim().is_empty());

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            Err(_) => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let llm = LlmConfig {
            api_url: settings
                .get_string("llm.api_url")
                .or_else(|_| env::var("LLM_API_URL"))
                .unwrap_or_else(|_| "https://api-inference.huggingface.co".to_string()),
            model: settings
                .get_string("llm.model")
                .or_else(|_| env::var("LLM_MODEL"))
                .unwrap_or_else(|_| "google/flan-t5-base".to_string()),
            api_token: settings
                .get_string("llm.api_token")
                .or_else(|_| env::var("LLM_API_TOKEN"))
                .ok()
                .filter(|value| !value.trim().is_empty()),
            temperature: settings
                .get_float("llm.temperature")
                .map(|value| value as f32)
                .or_else(|_| parse_env("LLM_TEMPERATURE"))
                .ok(),
            max_tokens: settings
                .get_int("llm.max_tokens")
                .map(|value| value.max(1) as u32)
                .or_else(|_| parse_env("LLM_MAX_TOKENS"))
                .unwrap_or(2000),
            timeout_secs: settings
                .get_int("llm.timeout_secs")
                .map(|value| value.max(1) as u64)
                .or_else(|_| parse_env("LLM_TIMEOUT_SECS"))
                .unwrap_or(30),
        };

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let assessment_ttl_hours = settings
            .get_int("assessment.ttl_hours")
            .or_else(|_| parse_env("ASSESSMENT_TTL_HOURS"))
            .unwrap_or(24);
        if !(1..=MAX_ASSESSMENT_TTL_HOURS).contains(&assessment_ttl_hours) {
            return Err(config::ConfigError::Message(format!(
                "assessment.ttl_hours must be between 1 and {}, got {}",
                MAX_ASSESSMENT_TTL_HOURS, assessment_ttl_hours
            )));
        }

        Ok(Config {
            store_backend,
            mongo_uri,
            mongo_database,
            redis_uri,
            jwt_secret,
            llm,
            bind_addr,
            assessment_ttl_hours,
        })
    }

    /// In-memory configuration used by tests and local demos.
    pub fn for_memory(jwt_secret: impl Into<String>) -> Self {
        Config {
            store_backend: StoreBackend::Memory,
            mongo_uri: String::new(),
            mongo_database: "learning_platform".to_string(),
            redis_uri: None,
            jwt_secret: jwt_secret.into(),
            llm: LlmConfig {
                api_url: "http://localhost:8000".to_string(),
                model: "google/flan-t5-base".to_string(),
                api_token: None,
                temperature: None,
                max_tokens: 2000,
                timeout_secs: 5,
            },
            bind_addr: "127.0.0.1:0".to_string(),
            assessment_ttl_hours: 24,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<T, env::VarError> {
    env::var(key)?
        .trim()
        .parse::<T>()
        .map_err(|_| env::VarError::NotPresent)
}
