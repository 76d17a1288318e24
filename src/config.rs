use std::{env, str::FromStr, time::Duration};

use thiserror::Error;

const HOST: &str = "0.0.0.0";
const PORT: u16 = 8000;
const API_V1_PREFIX: &str = "/api/v1";
const PROJECT_NAME: &str = "Travel Planner API";
const DEFAULT_CORS_ORIGINS: &str =
    "http://localhost:3000,http://localhost:5173,http://localhost:5174";
const DEFAULT_DATABASE: &str = "travel";

const LLM_BASE_URL: &str = "https://api.deepseek.com/v1";
const LLM_MODEL: &str = "deepseek-chat";
const LLM_TEMPERATURE: f32 = 0.7;
// Multi-day itinerary JSON is long; a small cap truncates it mid-object.
const LLM_MAX_TOKENS: u32 = 6000;
const LLM_TIMEOUT_SECS: u64 = 300;

const SSE_HEARTBEAT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    Mongo { uri: String, database: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub api_prefix: String,
    pub project_name: String,
    pub version: String,
    pub cors_origins: Vec<String>,
    pub store: StoreBackend,
    pub llm: LlmSettings,
    pub amap_api_key: Option<String>,
    pub amap_security_key: Option<String>,
    pub mapbox_token: Option<String>,
    pub google_places_api_key: Option<String>,
    pub heartbeat_interval: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let store = match get("STORE_BACKEND").as_deref().unwrap_or("mongo") {
            "mongo" | "mongodb" => StoreBackend::Mongo {
                uri: get("MONGODB_URI").ok_or(ConfigError::Missing("MONGODB_URI"))?,
                database: get("MONGODB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            },
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let llm = LlmSettings {
            api_key: get("DEEPSEEK_API_KEY"),
            base_url: get("LLM_BASE_URL").unwrap_or_else(|| LLM_BASE_URL.to_string()),
            model: get("LLM_MODEL").unwrap_or_else(|| LLM_MODEL.to_string()),
            temperature: parse_or("LLM_TEMPERATURE", get("LLM_TEMPERATURE"), LLM_TEMPERATURE)?,
            max_tokens: parse_or("LLM_MAX_TOKENS", get("LLM_MAX_TOKENS"), LLM_MAX_TOKENS)?,
            timeout: Duration::from_secs(parse_or(
                "LLM_TIMEOUT_SECS",
                get("LLM_TIMEOUT_SECS"),
                LLM_TIMEOUT_SECS,
            )?),
        };

        let cors_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let heartbeat_secs: u64 =
            parse_or("SSE_HEARTBEAT_SECS", get("SSE_HEARTBEAT_SECS"), SSE_HEARTBEAT_SECS)?;
        if heartbeat_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "SSE_HEARTBEAT_SECS",
                value: "0".to_string(),
            });
        }
        let heartbeat_interval = Duration::from_secs(heartbeat_secs);

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| HOST.to_string()),
            port: parse_or("PORT", get("PORT"), PORT)?,
            api_prefix: get("API_V1_PREFIX").unwrap_or_else(|| API_V1_PREFIX.to_string()),
            project_name: get("PROJECT_NAME").unwrap_or_else(|| PROJECT_NAME.to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            cors_origins,
            store,
            llm,
            amap_api_key: get("AMAP_API_KEY"),
            amap_security_key: get("AMAP_SECURITY_KEY"),
            mapbox_token: get("MAPBOX_TOKEN"),
            google_places_api_key: get("GOOGLE_PLACES_API_KEY"),
            heartbeat_interval,
        })
    }
}

fn parse_or<T: FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_memory_backend_defaults() {
        let settings = settings_from(&[("STORE_BACKEND", "memory")]).unwrap();
        assert_eq!(settings.store, StoreBackend::Memory);
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.api_prefix, "/api/v1");
        assert_eq!(settings.llm.model, "deepseek-chat");
        assert_eq!(settings.llm.max_tokens, 6000);
        assert_eq!(settings.cors_origins.len(), 3);
        assert_eq!(settings.heartbeat_interval, Duration::from_secs(15));
        assert!(settings.llm.api_key.is_none());
    }

    #[test]
    fn test_mongo_backend_requires_uri() {
        let err = settings_from(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("MONGODB_URI")));

        let settings = settings_from(&[("MONGODB_URI", "mongodb://localhost:27017")]).unwrap();
        assert_eq!(
            settings.store,
            StoreBackend::Mongo {
                uri: "mongodb://localhost:27017".to_string(),
                database: "travel".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let err = settings_from(&[("STORE_BACKEND", "memory"), ("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn test_zero_heartbeat_is_rejected() {
        let err = settings_from(&[("STORE_BACKEND", "memory"), ("SSE_HEARTBEAT_SECS", "0")])
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "SSE_HEARTBEAT_SECS",
                ..
            }
        ));

        let settings =
            settings_from(&[("STORE_BACKEND", "memory"), ("SSE_HEARTBEAT_SECS", "1")]).unwrap();
        assert_eq!(settings.heartbeat_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let settings = settings_from(&[
            ("STORE_BACKEND", "memory"),
            ("DEEPSEEK_API_KEY", "  "),
            ("CORS_ORIGINS", "https://a.example, https://b.example,"),
        ])
        .unwrap();
        assert!(settings.llm.api_key.is_none());
        assert_eq!(
            settings.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }
}
