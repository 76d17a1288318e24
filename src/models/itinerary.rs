use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::place::Place;
use super::plan::{Accommodation, Flight};

/// One persisted day of a generated itinerary. `itinerary` keeps the raw
/// day object returned by the model after normalisation.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ItineraryDetail {
    pub id: String,
    pub travel_plan_id: String,
    pub day_number: u32,
    pub itinerary: Value,
    #[serde(default)]
    pub recommended_spots: Vec<Value>,
    #[serde(default)]
    pub recommended_restaurants: Vec<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ItineraryDayUpsert {
    pub travel_plan_id: String,
    pub day_number: u32,
    pub itinerary: Value,
    pub recommended_spots: Vec<Value>,
    pub recommended_restaurants: Vec<Value>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GenerateItineraryRequest {
    #[serde(default)]
    pub travel_plan_id: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl GenerateItineraryRequest {
    /// Inclusive day count, `None` when the range is inverted.
    pub fn day_count(&self) -> Option<u32> {
        let days = (self.end_date - self.start_date).num_days();
        if days < 0 {
            None
        } else {
            u32::try_from(days + 1).ok()
        }
    }
}

/// A single draggable card in the itinerary board.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DayItem {
    #[serde(rename = "uniqueId")]
    pub unique_id: String,
    pub name: String,
    pub category: String,
    pub duration: u32,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    /// A string or a list of strings, as written by the model.
    #[serde(default)]
    pub notes: Value,
    #[serde(default)]
    pub commute_from_prev: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct ScheduleStats {
    pub morning: usize,
    pub afternoon: usize,
    pub evening: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct DayStats {
    pub spots: usize,
    pub restaurants: usize,
    pub schedule: ScheduleStats,
}

/// Payload of the `day` stream event.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DaySummary {
    pub day_number: u32,
    pub items: Vec<DayItem>,
    pub stats: DayStats,
}

/// Final payload of a generation, streamed as `result` or returned by the task.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GenerationResult {
    pub success: bool,
    pub travel_plan_id: String,
    pub days: u32,
    pub itinerary_details: Vec<ItineraryDetail>,
    pub attractions: Vec<Place>,
    pub restaurants: Vec<Place>,
    pub flights: Vec<Flight>,
    pub accommodations: Vec<Accommodation>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ItineraryGenerationResponse {
    pub task_id: String,
    pub status: String,
    pub message: String,
}
