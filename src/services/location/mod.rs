//! Geocoding and place search.
//!
//! Domestic lookups go to AMap, everything else to Mapbox (geocoding) and
//! Google Places (search). Provider failures are logged and degrade to
//! "no result" so a missing key never fails a request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Settings;
use crate::models::place::{GeoPoint, Place};

mod amap;
mod google;
mod mapbox;

pub use amap::AmapClient;
pub use google::GooglePlacesClient;
pub use mapbox::MapboxClient;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

const FOREIGN_KEYWORDS: [&str; 24] = [
    "首尔", "东京", "大阪", "新加坡", "曼谷", "吉隆坡", "雅加达", "巴黎", "纽约", "伦敦", "悉尼",
    "墨尔本", "seoul", "tokyo", "osaka", "singapore", "bangkok", "kuala lumpur", "jakarta",
    "paris", "new york", "london", "sydney", "melbourne",
];

/// Decides whether a place name should be resolved by the domestic provider.
/// Unknown and empty names count as domestic.
pub fn is_domestic_location(location: &str) -> bool {
    let lower = location.to_lowercase();
    !FOREIGN_KEYWORDS.iter().any(|k| lower.contains(k))
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned an error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// Quota or temporary upstream trouble reported inside a 200 answer.
    #[error("{provider} is throttling requests: {message}")]
    Throttled {
        provider: &'static str,
        message: String,
    },
}

impl LocationError {
    /// Timeouts, connection failures, 5xx answers and throttling are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            LocationError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            LocationError::Throttled { .. } => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceKind {
    Attraction,
    Restaurant,
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceQuery {
    pub kind: PlaceKind,
    pub keyword: Option<String>,
    pub city: Option<String>,
    /// Provider-specific category code, overrides the one implied by `kind`.
    pub types: Option<String>,
}

impl PlaceQuery {
    pub fn attractions(city: &str, keyword: Option<&str>) -> Self {
        Self {
            kind: PlaceKind::Attraction,
            keyword: keyword.map(str::to_string),
            city: Some(city.to_string()),
            types: None,
        }
    }

    pub fn restaurants(city: &str, cuisine_type: Option<&str>) -> Self {
        Self {
            kind: PlaceKind::Restaurant,
            keyword: cuisine_type.map(str::to_string),
            city: Some(city.to_string()),
            types: None,
        }
    }
}

#[async_trait]
pub trait PlaceProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>, LocationError>;

    async fn search_places(&self, _query: &PlaceQuery) -> Result<Vec<Place>, LocationError> {
        Ok(Vec::new())
    }
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Routes lookups to the right provider based on where the place is.
pub struct LocationService {
    domestic: Arc<dyn PlaceProvider>,
    geocoder: Arc<dyn PlaceProvider>,
    international: Arc<dyn PlaceProvider>,
}

impl LocationService {
    pub fn new(
        domestic: Arc<dyn PlaceProvider>,
        geocoder: Arc<dyn PlaceProvider>,
        international: Arc<dyn PlaceProvider>,
    ) -> Self {
        Self {
            domestic,
            geocoder,
            international,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Arc::new(AmapClient::new(
                settings.amap_api_key.clone(),
                settings.amap_security_key.clone(),
            )),
            Arc::new(MapboxClient::new(settings.mapbox_token.clone())),
            Arc::new(GooglePlacesClient::new(
                settings.google_places_api_key.clone(),
            )),
        )
    }

    fn provider_for(&self, location: &str) -> &Arc<dyn PlaceProvider> {
        if is_domestic_location(location) {
            &self.domestic
        } else {
            &self.international
        }
    }

    async fn try_geocode(provider: &Arc<dyn PlaceProvider>, address: &str) -> Option<GeoPoint> {
        match provider.geocode(address).await {
            Ok(Some(point)) => {
                log::info!(
                    "{} geocoded {} -> ({}, {})",
                    provider.name(),
                    address,
                    point.latitude,
                    point.longitude
                );
                Some(point)
            }
            Ok(None) => {
                log::warn!("{} found no match for {}", provider.name(), address);
                None
            }
            Err(e) => {
                log::warn!("{} geocoding failed for {}: {}", provider.name(), address, e);
                None
            }
        }
    }

    /// Geocoders in the order they are tried. `location` (usually the city)
    /// decides when given, otherwise the address itself does.
    fn geocoders_for(
        &self,
        address: &str,
        location: Option<&str>,
    ) -> (&Arc<dyn PlaceProvider>, &Arc<dyn PlaceProvider>) {
        let scope = location.filter(|l| !l.is_empty()).unwrap_or(address);
        if is_domestic_location(scope) {
            (&self.domestic, &self.geocoder)
        } else {
            (&self.geocoder, &self.international)
        }
    }

    /// Resolves an address, falling back to the second geocoder.
    pub async fn geocode(&self, address: &str, location: Option<&str>) -> Option<GeoPoint> {
        let (first, second) = self.geocoders_for(address, location);
        match Self::try_geocode(first, address).await {
            Some(point) => Some(point),
            None => Self::try_geocode(second, address).await,
        }
    }

    /// Same as [`geocode`](Self::geocode) but surfaces provider errors, for retrying callers.
    pub async fn geocode_checked(
        &self,
        address: &str,
        location: Option<&str>,
    ) -> Result<Option<GeoPoint>, LocationError> {
        let (first, second) = self.geocoders_for(address, location);

        match first.geocode(address).await {
            Ok(Some(point)) => Ok(Some(point)),
            Ok(None) | Err(LocationError::NotConfigured(_)) => second.geocode(address).await,
            Err(e) if e.is_transient() => Err(e),
            Err(_) => second.geocode(address).await,
        }
    }

    pub async fn search(&self, query: &PlaceQuery) -> Result<Vec<Place>, LocationError> {
        let city = query.city.as_deref().unwrap_or_default();
        let provider = self.provider_for(city);
        let places = provider.search_places(query).await?;
        log::info!(
            "{} search in {:?} returned {} places",
            provider.name(),
            query.city,
            places.len()
        );
        Ok(places)
    }

    async fn search_or_empty(&self, query: PlaceQuery) -> Vec<Place> {
        match self.search(&query).await {
            Ok(places) => places,
            Err(e) => {
                log::warn!("Place search failed for {:?}: {}", query.city, e);
                Vec::new()
            }
        }
    }

    pub async fn search_attractions(&self, city: &str, keyword: Option<&str>) -> Vec<Place> {
        self.search_or_empty(PlaceQuery::attractions(city, keyword))
            .await
    }

    pub async fn search_restaurants(&self, city: &str, cuisine_type: Option<&str>) -> Vec<Place> {
        self.search_or_empty(PlaceQuery::restaurants(city, cuisine_type))
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Answers from a fixed table and records every call.
    pub struct FixedProvider {
        pub name: &'static str,
        pub point: Option<GeoPoint>,
        pub places: Vec<Place>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FixedProvider {
        pub fn new(name: &'static str, point: Option<GeoPoint>, places: Vec<Place>) -> Arc<Self> {
            Arc::new(Self {
                name,
                point,
                places,
                calls: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PlaceProvider for FixedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>, LocationError> {
            self.calls.lock().unwrap().push(format!("geocode:{}", address));
            Ok(self.point.clone())
        }

        async fn search_places(&self, query: &PlaceQuery) -> Result<Vec<Place>, LocationError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("search:{}", query.city.clone().unwrap_or_default()));
            Ok(self.places.clone())
        }
    }

    #[test]
    fn test_is_domestic_location() {
        assert!(is_domestic_location(""));
        assert!(is_domestic_location("成都"));
        assert!(is_domestic_location("Reykjavik"));
        assert!(!is_domestic_location("首尔明洞"));
        assert!(!is_domestic_location("New York City"));
        assert!(!is_domestic_location("TOKYO Tower"));
    }

    #[actix_rt::test]
    async fn test_domestic_geocode_falls_back_to_mapbox() {
        let amap = FixedProvider::new("amap", None, vec![]);
        let mapbox = FixedProvider::new("mapbox", Some(GeoPoint::new(30.66, 104.06)), vec![]);
        let google = FixedProvider::new("google", None, vec![]);
        let service = LocationService::new(amap.clone(), mapbox.clone(), google.clone());

        let point = service.geocode("春熙路", Some("成都")).await.unwrap();
        assert_eq!(point.latitude, 30.66);
        assert_eq!(amap.calls(), vec!["geocode:春熙路"]);
        assert_eq!(mapbox.calls(), vec!["geocode:春熙路"]);
        assert!(google.calls().is_empty());
    }

    #[actix_rt::test]
    async fn test_foreign_geocode_prefers_mapbox_then_google() {
        let amap = FixedProvider::new("amap", Some(GeoPoint::new(0.0, 0.0)), vec![]);
        let mapbox = FixedProvider::new("mapbox", None, vec![]);
        let google = FixedProvider::new("google", Some(GeoPoint::new(48.85, 2.35)), vec![]);
        let service = LocationService::new(amap.clone(), mapbox.clone(), google.clone());

        let point = service.geocode("Louvre", Some("Paris")).await.unwrap();
        assert_eq!(point.longitude, 2.35);
        assert!(amap.calls().is_empty());
        assert_eq!(mapbox.calls().len(), 1);
    }

    #[actix_rt::test]
    async fn test_checked_geocode_uses_same_order() {
        let amap = FixedProvider::new("amap", Some(GeoPoint::new(0.0, 0.0)), vec![]);
        let mapbox = FixedProvider::new("mapbox", None, vec![]);
        let google = FixedProvider::new("google", Some(GeoPoint::new(48.85, 2.35)), vec![]);
        let service = LocationService::new(amap.clone(), mapbox.clone(), google.clone());

        let point = service
            .geocode_checked("Louvre", Some("Paris"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(point.longitude, 2.35);
        assert!(amap.calls().is_empty());
        assert_eq!(mapbox.calls(), vec!["geocode:Louvre"]);

        let point = service
            .geocode_checked("春熙路", Some("成都"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(point.latitude, 0.0);
        assert_eq!(amap.calls(), vec!["geocode:春熙路"]);
    }

    #[actix_rt::test]
    async fn test_search_routes_by_city() {
        let place = Place {
            name: "宽窄巷子".to_string(),
            ..Default::default()
        };
        let amap = FixedProvider::new("amap", None, vec![place]);
        let mapbox = FixedProvider::new("mapbox", None, vec![]);
        let google = FixedProvider::new("google", None, vec![]);
        let service = LocationService::new(amap.clone(), mapbox.clone(), google.clone());

        assert_eq!(service.search_attractions("成都", None).await.len(), 1);
        assert!(service.search_restaurants("London", None).await.is_empty());
        assert_eq!(amap.calls(), vec!["search:成都"]);
        assert_eq!(google.calls(), vec!["search:London"]);
        assert!(mapbox.calls().is_empty());
    }
}
