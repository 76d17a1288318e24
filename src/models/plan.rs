use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Budget {
    #[serde(default)]
    pub min: f64,
    #[serde(default = "default_budget_max")]
    pub max: f64,
}

fn default_budget_max() -> f64 {
    10000.0
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: default_budget_max(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AddressInput {
    #[serde(deserialize_with = "deserialize_city")]
    pub city: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, alias = "checkInDate")]
    pub check_in_date: Option<NaiveDate>,
    #[serde(default, alias = "checkOutDate")]
    pub check_out_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FlightInput {
    #[serde(alias = "departureAirport")]
    pub departure_airport: String,
    #[serde(alias = "arrivalAirport")]
    pub arrival_airport: String,
    #[serde(alias = "departureTime", deserialize_with = "deserialize_datetime")]
    pub departure_time: NaiveDateTime,
    #[serde(
        default,
        alias = "returnTime",
        deserialize_with = "deserialize_optional_datetime"
    )]
    pub return_time: Option<NaiveDateTime>,
}

/// Onboarding payload for `POST /plans`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TravelPlanCreate {
    pub destination: Vec<String>,
    pub budget: Budget,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default, alias = "foodPreferences")]
    pub food_preferences: Vec<String>,
    pub travelers: String,
    #[serde(default, alias = "xiaohongshuNotes")]
    pub xiaohongshu_notes: Vec<String>,
    #[serde(default)]
    pub addresses: Vec<AddressInput>,
    #[serde(default)]
    pub flights: Vec<FlightInput>,
}

impl TravelPlanCreate {
    pub fn validate(&self) -> Result<(), String> {
        if self.budget.min < 0.0 || self.budget.max < 0.0 {
            return Err("budget bounds must be non-negative".to_string());
        }
        Ok(())
    }

    /// Only the first requested destination is planned for.
    pub fn primary_destination(&self) -> String {
        self.destination.first().cloned().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TravelPlan {
    pub id: String,
    pub user_id: String,
    pub destination: String,
    pub budget_min: f64,
    pub budget_max: f64,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub food_preferences: Vec<String>,
    #[serde(default)]
    pub travelers: String,
    #[serde(default)]
    pub xiaohongshu_notes: Vec<String>,
    #[serde(default)]
    pub addresses: Vec<AddressInput>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Flight {
    pub id: String,
    pub user_id: String,
    pub travel_plan_id: Option<String>,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub departure_time: NaiveDateTime,
    pub return_time: Option<NaiveDateTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Accommodation {
    pub id: String,
    pub user_id: String,
    pub travel_plan_id: Option<String>,
    pub city: String,
    pub address: String,
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A geocoded accommodation waiting to be written alongside its plan.
#[derive(Debug, Clone)]
pub struct AccommodationDraft {
    pub address: AddressInput,
    pub coordinates: Option<(f64, f64)>,
}

/// Everything needed to persist a new plan with its flights and lodging.
#[derive(Debug, Clone)]
pub struct PlanDraft {
    pub user_id: String,
    pub request: TravelPlanCreate,
    pub accommodations: Vec<AccommodationDraft>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn placeholder(user_id: &str) -> Self {
        Self {
            id: user_id.to_string(),
            username: format!("user_{}", user_id),
            email: Some(format!("user_{}@example.com", user_id)),
            created_at: Utc::now(),
        }
    }
}

// The onboarding form sometimes sends the city as `{ "name": "..." }`.
fn deserialize_city<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value: serde_json::Value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Object(map) => map
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn deserialize_datetime<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_datetime(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {}", raw)))
}

fn deserialize_optional_datetime<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_datetime(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {}", s))),
    }
}
