#![allow(dead_code)]

use std::sync::Arc;

use actix_web::{web, App};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use travel_planner_api::app::{self, AppState};
use travel_planner_api::config::Settings;
use travel_planner_api::db::MemoryStore;
use travel_planner_api::models::place::{GeoPoint, Place};
use travel_planner_api::services::llm::{ChatModel, LlmError};
use travel_planner_api::services::location::{
    LocationError, LocationService, PlaceProvider, PlaceQuery,
};

pub const API: &str = "/api/v1/travel";

pub const MISSING_PLAN_ID: &str = "507f1f77bcf86cd799439011";

pub const REPLY: &str = r#"```json
{
  "day_1": {
    "theme": "熊猫与老街",
    "schedule": {
      "morning": [{"type": "spot", "name": "成都大熊猫繁育研究基地", "play_time_minutes": 150, "latitude": "30.73", "longitude": 104.14}],
      "afternoon": [{"name": "宽窄巷子", "recommended_time": 90}],
      "evening": [{"type": "restaurant", "name": "蜀大侠火锅", "cuisine": "火锅", "price_range": "100-150"}]
    },
    "tips": "早点出发"
  }
}
```"#;

/// Answers every prompt with the same text, streamed in small pieces.
pub struct ScriptedModel {
    reply: Result<String, String>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
        }
    }

    fn reply(&self) -> Result<String, LlmError> {
        self.reply.clone().map_err(|message| LlmError::Api {
            status: 500,
            message,
        })
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        self.reply()
    }

    async fn stream(
        &self,
        _prompt: &str,
        tokens: mpsc::Sender<String>,
    ) -> Result<String, LlmError> {
        let reply = self.reply()?;
        let chars: Vec<char> = reply.chars().collect();
        for chunk in chars.chunks(24) {
            let piece: String = chunk.iter().collect();
            tokens.send(piece).await.map_err(|_| LlmError::Cancelled)?;
        }
        Ok(reply)
    }
}

/// Place provider with canned answers.
pub struct StaticProvider {
    name: &'static str,
    point: Option<GeoPoint>,
    places: Vec<Place>,
}

impl StaticProvider {
    pub fn new(name: &'static str, point: Option<GeoPoint>, places: Vec<Place>) -> Arc<Self> {
        Arc::new(Self {
            name,
            point,
            places,
        })
    }
}

#[async_trait]
impl PlaceProvider for StaticProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn geocode(&self, _address: &str) -> Result<Option<GeoPoint>, LocationError> {
        Ok(self.point.clone())
    }

    async fn search_places(&self, _query: &PlaceQuery) -> Result<Vec<Place>, LocationError> {
        Ok(self.places.clone())
    }
}

pub fn domestic_places() -> Vec<Place> {
    vec![
        Place {
            name: "武侯祠".to_string(),
            address: Some("武侯祠大街231号".to_string()),
            description: Some("三国文化".to_string()),
            latitude: Some(30.646),
            longitude: Some(104.048),
            ..Default::default()
        },
        Place {
            name: "陈麻婆豆腐".to_string(),
            cuisine_type: Some("川菜".to_string()),
            ..Default::default()
        },
    ]
}

pub fn test_settings() -> Settings {
    Settings::from_lookup(|name| match name {
        "STORE_BACKEND" => Some("memory".to_string()),
        _ => None,
    })
    .expect("memory settings are valid")
}

pub struct TestApp {
    pub state: web::Data<AppState>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_model(ScriptedModel::replying(REPLY))
    }

    pub fn with_model(model: ScriptedModel) -> Self {
        let amap = StaticProvider::new(
            "amap",
            Some(GeoPoint::new(30.657, 104.066)),
            domestic_places(),
        );
        let mapbox = StaticProvider::new("mapbox", None, vec![]);
        let google = StaticProvider::new("google", None, vec![]);
        let locations = Arc::new(LocationService::new(amap, mapbox, google));

        let state = AppState::new(
            test_settings(),
            Arc::new(MemoryStore::new()),
            Arc::new(model),
            locations,
        );
        Self {
            state: web::Data::new(state),
        }
    }

    pub fn create_app(
        &self,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let prefix = self.state.settings.api_prefix.clone();
        App::new()
            .app_data(self.state.clone())
            .configure(move |cfg| app::configure(cfg, &prefix))
    }
}

pub fn plan_payload() -> Value {
    json!({
        "destination": ["成都", "重庆"],
        "budget": {"min": 2000, "max": 8000},
        "interests": ["历史", "熊猫"],
        "foodPreferences": ["川菜"],
        "travelers": "情侣",
        "xiaohongshuNotes": ["http://xhslink.com/o/abc"],
        "addresses": [
            {"city": "成都", "address": "春熙路", "checkInDate": "2025-05-01", "checkOutDate": "2025-05-03"}
        ],
        "flights": [
            {"departureAirport": "PEK", "arrivalAirport": "CTU", "departureTime": "2025-05-01T08:00:00"}
        ]
    })
}
