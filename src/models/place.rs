use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Attraction {
    pub id: String,
    pub name: String,
    pub city: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub city: String,
    #[serde(default)]
    pub cuisine_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub price_range: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload shared by attractions and restaurants fetched from a provider.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct NewAttraction {
    pub name: String,
    pub city: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rating: Option<f64>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct NewRestaurant {
    pub name: String,
    pub city: String,
    pub cuisine_type: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rating: Option<f64>,
    pub price_range: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AttractionQuery {
    pub city: Option<String>,
    pub keyword: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RestaurantQuery {
    pub city: Option<String>,
    pub cuisine_type: Option<String>,
    pub keyword: Option<String>,
}

/// A geocoding hit from any provider.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            formatted_address: None,
            province: None,
            city: None,
            district: None,
            place_id: None,
        }
    }
}

/// A point of interest returned by a place search.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Place {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
}

impl Place {
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn into_attraction(self, city: &str) -> NewAttraction {
        NewAttraction {
            name: self.name,
            city: city.to_string(),
            description: self.description,
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
            rating: self.rating,
            category: self.kind,
        }
    }

    pub fn into_restaurant(self, city: &str, cuisine_type: Option<&str>) -> NewRestaurant {
        NewRestaurant {
            name: self.name,
            city: city.to_string(),
            cuisine_type: cuisine_type.map(str::to_string).or(self.cuisine_type),
            description: self.description,
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
            rating: self.rating,
            price_range: None,
        }
    }
}
