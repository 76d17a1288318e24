use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{http_client, is_domestic_location, LocationError, PlaceProvider};
use crate::models::place::GeoPoint;

const BASE_URL: &str = "https://api.mapbox.com/geocoding/v5/mapbox.places/";
const RESULT_LIMIT: u32 = 5;

// Mapbox has poor coverage of Chinese place names.
const CITY_NAMES: [(&str, &str); 6] = [
    ("成都", "Chengdu"),
    ("北京", "Beijing"),
    ("上海", "Shanghai"),
    ("广州", "Guangzhou"),
    ("深圳", "Shenzhen"),
    ("杭州", "Hangzhou"),
];

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    id: Option<String>,
    #[serde(default)]
    place_name: String,
    geometry: Geometry,
    #[serde(default)]
    context: Vec<ContextEntry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ContextEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    short_code: String,
}

impl Feature {
    fn is_china(&self) -> bool {
        let place_name = self.place_name.to_lowercase();
        self.context
            .iter()
            .any(|c| c.id.starts_with("country") && c.short_code.to_lowercase().contains("cn"))
            || place_name.contains("china")
            || place_name.contains("中国")
    }

    fn into_point(self) -> Option<GeoPoint> {
        if self.geometry.coordinates.len() < 2 {
            return None;
        }
        Some(GeoPoint {
            latitude: self.geometry.coordinates[1],
            longitude: self.geometry.coordinates[0],
            formatted_address: Some(self.place_name),
            province: None,
            city: None,
            district: None,
            place_id: self.id,
        })
    }
}

/// Mapbox forward geocoding. Search is not supported.
pub struct MapboxClient {
    http: reqwest::Client,
    token: Option<String>,
}

impl MapboxClient {
    pub fn new(token: Option<String>) -> Self {
        Self {
            http: http_client(),
            token,
        }
    }
}

/// Returns the text to send and the country filter for an address.
fn build_query(address: &str) -> (String, Option<&'static str>) {
    if !is_domestic_location(address) {
        return (address.to_string(), None);
    }
    let query = CITY_NAMES
        .iter()
        .find(|(cn, _)| address.contains(cn))
        .map(|(_, en)| en.to_string())
        .unwrap_or_else(|| address.to_string());
    (query, Some("CN"))
}

fn select_feature(features: Vec<Feature>, domestic: bool) -> Option<Feature> {
    if !domestic {
        return features.into_iter().next();
    }
    let china = features.iter().position(Feature::is_china);
    match china {
        Some(idx) => features.into_iter().nth(idx),
        None => {
            log::warn!("Mapbox returned no result inside China, using the first match");
            features.into_iter().next()
        }
    }
}

#[async_trait]
impl PlaceProvider for MapboxClient {
    fn name(&self) -> &'static str {
        "mapbox"
    }

    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>, LocationError> {
        let token = self
            .token
            .as_deref()
            .ok_or(LocationError::NotConfigured("MAPBOX_TOKEN"))?;

        let (query, country) = build_query(address);
        let mut url = Url::parse(BASE_URL).map_err(|e| LocationError::Provider {
            provider: "mapbox",
            message: e.to_string(),
        })?;
        url.path_segments_mut()
            .map_err(|_| LocationError::Provider {
                provider: "mapbox",
                message: "base url cannot take a path".to_string(),
            })?
            .pop_if_empty()
            .push(&format!("{}.json", query));

        let mut params = vec![
            ("access_token", token.to_string()),
            ("limit", RESULT_LIMIT.to_string()),
        ];
        if let Some(country) = country {
            params.push(("country", country.to_string()));
        }

        let response: GeocodingResponse = self
            .http
            .get(url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(select_feature(response.features, country.is_some()).and_then(Feature::into_point))
    }
}
