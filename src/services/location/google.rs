use async_trait::async_trait;
use serde::Deserialize;

use super::{http_client, LocationError, PlaceKind, PlaceProvider, PlaceQuery};
use crate::models::place::{GeoPoint, Place};

const BASE_URL: &str = "https://maps.googleapis.com/maps/api";

#[derive(Debug, Deserialize)]
struct GoogleResponse<T> {
    status: String,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLatLng,
}

#[derive(Debug, Deserialize)]
struct GoogleLatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: GoogleGeometry,
    formatted_address: Option<String>,
    place_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextSearchResult {
    name: String,
    formatted_address: Option<String>,
    geometry: Option<GoogleGeometry>,
    place_id: Option<String>,
    rating: Option<f64>,
    #[serde(default)]
    types: Vec<String>,
}

impl From<TextSearchResult> for Place {
    fn from(result: TextSearchResult) -> Self {
        Place {
            name: result.name,
            address: result.formatted_address,
            latitude: result.geometry.as_ref().map(|g| g.location.lat),
            longitude: result.geometry.as_ref().map(|g| g.location.lng),
            kind: result.types.into_iter().next(),
            rating: result.rating,
            place_id: result.place_id,
            ..Default::default()
        }
    }
}

/// Google Geocoding and Places text search, used outside China.
pub struct GooglePlacesClient {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl GooglePlacesClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: http_client(),
            api_key,
        }
    }

    fn key(&self) -> Result<&str, LocationError> {
        self.api_key
            .as_deref()
            .ok_or(LocationError::NotConfigured("GOOGLE_PLACES_API_KEY"))
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, LocationError> {
        let response: GoogleResponse<T> = self
            .http
            .get(format!("{}{}", BASE_URL, path))
            .query(params)
            .query(&[("key", self.key()?)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.status.as_str() {
            "OK" => Ok(response.results),
            "ZERO_RESULTS" => Ok(Vec::new()),
            status @ ("OVER_QUERY_LIMIT" | "UNKNOWN_ERROR") => Err(LocationError::Throttled {
                provider: "google",
                message: status.to_string(),
            }),
            status => Err(LocationError::Provider {
                provider: "google",
                message: response
                    .error_message
                    .unwrap_or_else(|| status.to_string()),
            }),
        }
    }
}

/// Text query and place type for a search.
fn text_query(query: &PlaceQuery) -> (String, Option<&str>) {
    let city = query.city.as_deref().unwrap_or_default();
    let keyword = query.keyword.as_deref().filter(|k| !k.is_empty());
    let text = match (query.kind, keyword) {
        (PlaceKind::Attraction, Some(kw)) => format!("{} {}", kw, city),
        (PlaceKind::Attraction, None) => format!("attractions {}", city),
        (PlaceKind::Restaurant, Some(cuisine)) => format!("{} restaurant {}", cuisine, city),
        (PlaceKind::Restaurant, None) => format!("restaurant {}", city),
        (PlaceKind::Any, Some(kw)) => format!("{} {}", kw, city),
        (PlaceKind::Any, None) => city.to_string(),
    };
    let place_type = query.types.as_deref().or(match query.kind {
        PlaceKind::Attraction => Some("tourist_attraction"),
        PlaceKind::Restaurant => Some("restaurant"),
        PlaceKind::Any => None,
    });
    (text.trim().to_string(), place_type)
}

#[async_trait]
impl PlaceProvider for GooglePlacesClient {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>, LocationError> {
        let results: Vec<GeocodeResult> = self
            .fetch("/geocode/json", &[("address", address.to_string())])
            .await?;
        Ok(results.into_iter().next().map(|r| GeoPoint {
            latitude: r.geometry.location.lat,
            longitude: r.geometry.location.lng,
            formatted_address: r.formatted_address,
            province: None,
            city: None,
            district: None,
            place_id: r.place_id,
        }))
    }

    async fn search_places(&self, query: &PlaceQuery) -> Result<Vec<Place>, LocationError> {
        let (text, place_type) = text_query(query);
        let mut params = vec![("query", text)];
        if let Some(place_type) = place_type {
            params.push(("type", place_type.to_string()));
        }
        let results: Vec<TextSearchResult> = self.fetch("/place/textsearch/json", &params).await?;
        Ok(results.into_iter().map(Place::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_query() {
        let sights = PlaceQuery::attractions("Paris", None);
        let (text, kind) = text_query(&sights);
        assert_eq!(text, "attractions Paris");
        assert_eq!(kind, Some("tourist_attraction"));

        let dinner = PlaceQuery::restaurants("London", Some("Indian"));
        let (text, kind) = text_query(&dinner);
        assert_eq!(text, "Indian restaurant London");
        assert_eq!(kind, Some("restaurant"));
    }

    #[test]
    fn test_text_search_result_to_place() {
        let result: TextSearchResult = serde_json::from_value(serde_json::json!({
            "name": "Louvre Museum",
            "formatted_address": "Rue de Rivoli, Paris",
            "geometry": {"location": {"lat": 48.86, "lng": 2.33}},
            "rating": 4.7,
            "types": ["museum", "tourist_attraction"]
        }))
        .unwrap();
        let place = Place::from(result);
        assert_eq!(place.latitude, Some(48.86));
        assert_eq!(place.kind.as_deref(), Some("museum"));
        assert_eq!(place.rating, Some(4.7));
    }
}
