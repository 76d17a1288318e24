use async_trait::async_trait;
use md5::{Digest, Md5};
use serde_json::Value;

use super::{http_client, LocationError, PlaceKind, PlaceProvider, PlaceQuery};
use crate::models::place::{GeoPoint, Place};

const BASE_URL: &str = "https://restapi.amap.com/v3";
const ATTRACTION_TYPES: &str = "110000";
const RESTAURANT_TYPES: &str = "050000";
const PAGE_SIZE: u32 = 20;
/// `info` values meaning the key is over its quota or AMap is briefly unavailable.
const THROTTLED_INFO: [&str; 5] = [
    "ACCESS_TOO_FREQUENT",
    "CUQPS_HAS_EXCEEDED_THE_LIMIT",
    "CKQPS_HAS_EXCEEDED_THE_LIMIT",
    "DAILY_QUERY_OVER_LIMIT",
    "UNKNOWN_ERROR",
];

/// AMap web-service client for places inside mainland China.
pub struct AmapClient {
    http: reqwest::Client,
    api_key: Option<String>,
    security_key: Option<String>,
    base_url: String,
}

impl AmapClient {
    pub fn new(api_key: Option<String>, security_key: Option<String>) -> Self {
        Self {
            http: http_client(),
            api_key,
            security_key,
            base_url: BASE_URL.to_string(),
        }
    }

    fn key(&self) -> Result<&str, LocationError> {
        self.api_key
            .as_deref()
            .ok_or(LocationError::NotConfigured("AMAP_API_KEY"))
    }

    /// Adds `key` and, when a security key is configured, the `sig` parameter.
    fn signed_params(&self, mut params: Vec<(String, String)>) -> Result<Vec<(String, String)>, LocationError> {
        params.push(("key".to_string(), self.key()?.to_string()));
        params.push(("output".to_string(), "json".to_string()));
        if let Some(secret) = self.security_key.as_deref() {
            let sig = sign(&params, secret);
            params.push(("sig".to_string(), sig));
        }
        Ok(params)
    }

    async fn get(&self, path: &str, params: Vec<(String, String)>) -> Result<Value, LocationError> {
        let params = self.signed_params(params)?;
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(&params)
            .send()
            .await?
            .error_for_status()?;
        check_status(response.json().await?)
    }
}

/// AMap answers 200 with `status: "0"` and an `info` code on failure.
fn check_status(body: Value) -> Result<Value, LocationError> {
    if body.get("status").and_then(Value::as_str) == Some("1") {
        return Ok(body);
    }
    let info = body
        .get("info")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    if THROTTLED_INFO.contains(&info.as_str()) {
        Err(LocationError::Throttled {
            provider: "amap",
            message: info,
        })
    } else {
        Err(LocationError::Provider {
            provider: "amap",
            message: info,
        })
    }
}

/// MD5 over the parameters sorted by name, joined as `k=v&k=v`, with the
/// security key appended.
fn sign(params: &[(String, String)], secret: &str) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().filter(|(k, _)| k != "sig").collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Md5::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// AMap encodes coordinates as `"lng,lat"`.
fn parse_location(raw: &str) -> Option<(f64, f64)> {
    let (lng, lat) = raw.split_once(',')?;
    Some((lat.trim().parse().ok()?, lng.trim().parse().ok()?))
}

// Empty fields come back as `[]` instead of a string.
fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_geocode(body: &Value) -> Option<GeoPoint> {
    let first = body.get("geocodes")?.as_array()?.first()?;
    let (latitude, longitude) = parse_location(first.get("location")?.as_str()?)?;
    Some(GeoPoint {
        latitude,
        longitude,
        formatted_address: text(first, "formatted_address"),
        province: text(first, "province"),
        city: text(first, "city"),
        district: text(first, "district"),
        place_id: None,
    })
}

fn parse_pois(body: &Value) -> Vec<Place> {
    let Some(pois) = body.get("pois").and_then(Value::as_array) else {
        return Vec::new();
    };
    pois.iter()
        .filter_map(|poi| {
            let name = text(poi, "name")?;
            let coords = text(poi, "location").and_then(|l| parse_location(&l));
            Some(Place {
                name,
                address: text(poi, "address"),
                latitude: coords.map(|(lat, _)| lat),
                longitude: coords.map(|(_, lng)| lng),
                kind: text(poi, "type"),
                tel: text(poi, "tel"),
                place_id: text(poi, "id"),
                ..Default::default()
            })
        })
        .collect()
}

#[async_trait]
impl PlaceProvider for AmapClient {
    fn name(&self) -> &'static str {
        "amap"
    }

    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>, LocationError> {
        let body = self
            .get(
                "/geocode/geo",
                vec![("address".to_string(), address.to_string())],
            )
            .await?;
        Ok(parse_geocode(&body))
    }

    async fn search_places(&self, query: &PlaceQuery) -> Result<Vec<Place>, LocationError> {
        let (default_keyword, default_types) = match query.kind {
            PlaceKind::Attraction => ("景点", Some(ATTRACTION_TYPES)),
            PlaceKind::Restaurant => ("餐厅", Some(RESTAURANT_TYPES)),
            PlaceKind::Any => ("", None),
        };
        let keywords = query
            .keyword
            .clone()
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| default_keyword.to_string());

        let mut params = vec![
            ("keywords".to_string(), keywords),
            ("page".to_string(), "1".to_string()),
            ("offset".to_string(), PAGE_SIZE.to_string()),
        ];
        if let Some(city) = query.city.as_deref().filter(|c| !c.is_empty()) {
            params.push(("city".to_string(), city.to_string()));
        }
        if let Some(types) = query.types.as_deref().or(default_types) {
            params.push(("types".to_string(), types.to_string()));
        }

        let body = self.get("/place/text", params).await?;
        Ok(parse_pois(&body))
    }
}
