use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::{
    validate_args, ToolError, GEOCODE, GET_XIAOHONGSHU_CDATA, SEARCH_ATTRACTIONS, SEARCH_PLACES,
    SEARCH_RESTAURANTS,
};
use crate::services::location::{LocationError, LocationService, PlaceKind, PlaceQuery};
use crate::services::notes;

const MAX_ATTEMPTS: u32 = 3;
const MIN_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

const GEOCODE_TTL: Duration = Duration::from_secs(3600);
const SEARCH_TTL: Duration = Duration::from_secs(1800);
const NOTE_TTL: Duration = Duration::from_secs(7200);

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

fn ttl_for(name: &str) -> Duration {
    match name {
        GEOCODE => GEOCODE_TTL,
        GET_XIAOHONGSHU_CDATA => NOTE_TTL,
        _ => SEARCH_TTL,
    }
}

/// Cache key over the function name and its arguments. `serde_json::Map`
/// keeps keys sorted, so equal argument sets hash the same.
fn cache_key(name: &str, args: &Map<String, Value>) -> String {
    let mut hasher = Md5::new();
    hasher.update(name.as_bytes());
    hasher.update(Value::Object(args.clone()).to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

fn optional_str<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn required_str<'a>(
    name: &str,
    args: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, ToolError> {
    optional_str(args, key).ok_or_else(|| ToolError::Execution {
        name: name.to_string(),
        message: format!("{} must not be empty", key),
    })
}

fn list_output<T: Serialize>(items: &[T]) -> Value {
    json!({ "success": true, "data": items, "count": items.len() })
}

fn missing_output(error: String) -> Value {
    json!({ "success": false, "data": null, "error": error })
}

/// Runs tool calls with argument validation, a TTL cache and retries on
/// transient provider failures.
pub struct ToolExecutor {
    locations: Arc<LocationService>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    min_backoff: Duration,
}

impl ToolExecutor {
    pub fn new(locations: Arc<LocationService>) -> Self {
        Self {
            locations,
            cache: Mutex::new(HashMap::new()),
            min_backoff: MIN_BACKOFF,
        }
    }

    pub fn with_backoff(mut self, min_backoff: Duration) -> Self {
        self.min_backoff = min_backoff;
        self
    }

    fn cached(&self, key: &str) -> Option<Value> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        match cache.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    /// Inserts an entry and drops every expired one.
    fn store(&self, key: String, value: Value, ttl: Duration) {
        let now = Instant::now();
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.retain(|_, entry| entry.expires_at > now);
        cache.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    async fn with_retry<T, F, Fut>(&self, name: &str, mut call: F) -> Result<T, ToolError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LocationError>>,
    {
        let mut backoff = self.min_backoff;
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    log::warn!(
                        "{} attempt {}/{} failed: {}, retrying in {:?}",
                        name,
                        attempt,
                        MAX_ATTEMPTS,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(ToolError::Execution {
                        name: name.to_string(),
                        message: e.to_string(),
                    })
                }
            }
        }
    }

    async fn search(&self, name: &str, query: PlaceQuery) -> Result<Value, ToolError> {
        let places = self
            .with_retry(name, || self.locations.search(&query))
            .await?;
        Ok(list_output(&places))
    }

    async fn run(&self, name: &str, args: &Map<String, Value>) -> Result<Value, ToolError> {
        match name {
            GEOCODE => {
                let address = required_str(name, args, "address")?;
                let location = optional_str(args, "location");
                let point = self
                    .with_retry(name, || self.locations.geocode_checked(address, location))
                    .await?;
                Ok(match point {
                    Some(point) => json!({ "success": true, "data": point }),
                    None => missing_output(format!("无法解析地址：{}", address)),
                })
            }
            SEARCH_ATTRACTIONS => {
                let city = required_str(name, args, "city")?;
                let query = PlaceQuery::attractions(city, optional_str(args, "keyword"));
                self.search(name, query).await
            }
            SEARCH_RESTAURANTS => {
                let city = required_str(name, args, "city")?;
                let query = PlaceQuery::restaurants(city, optional_str(args, "cuisine_type"));
                self.search(name, query).await
            }
            SEARCH_PLACES => {
                let query = PlaceQuery {
                    kind: PlaceKind::Any,
                    keyword: Some(required_str(name, args, "keywords")?.to_string()),
                    city: optional_str(args, "city").map(str::to_string),
                    types: optional_str(args, "types").map(str::to_string),
                };
                self.search(name, query).await
            }
            GET_XIAOHONGSHU_CDATA => {
                let url = required_str(name, args, "note_url")?;
                Ok(match notes::fetch_note(url) {
                    Some(note) => json!({ "success": true, "data": note }),
                    None => missing_output(format!("无法获取小红书笔记：{}", url)),
                })
            }
            other => Err(ToolError::UnknownFunction(other.to_string())),
        }
    }

    /// Validates and runs a tool. Output is `{success, data, count?|error?}`.
    pub async fn execute(&self, name: &str, args: &Map<String, Value>) -> Result<Value, ToolError> {
        validate_args(name, args)?;

        let key = cache_key(name, args);
        if let Some(hit) = self.cached(&key) {
            log::debug!("Tool cache hit for {}", name);
            return Ok(hit);
        }

        let output = self.run(name, args).await?;
        self.store(key, output.clone(), ttl_for(name));
        Ok(output)
    }
}
