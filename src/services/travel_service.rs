use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval};

use crate::db::{StoreError, TravelStore};
use crate::models::itinerary::{
    DaySummary, GenerateItineraryRequest, GenerationResult, ItineraryDayUpsert,
};
use crate::models::place::Place;
use crate::models::plan::{AccommodationDraft, PlanDraft, TravelPlan, TravelPlanCreate};
use crate::services::itinerary_builder::{
    build_day_items, build_itinerary_prompt, day_stats, normalize_day, parse_itinerary_response,
    PromptInput,
};
use crate::services::llm::{ChatModel, LlmError};
use crate::services::location::LocationService;
use crate::services::notes;
use crate::sse::{comment_frame, SseEvent};

const RECOMMENDATION_LIMIT: usize = 20;
const DAY_SPOT_LIMIT: usize = 5;
const DAY_RESTAURANT_LIMIT: usize = 3;
const STREAM_BUFFER: usize = 64;
const TOKEN_BUFFER: usize = 256;

#[derive(Debug, Error)]
pub enum TravelError {
    #[error("travel plan {0} not found")]
    PlanNotFound(String),

    #[error("end_date must not be before start_date")]
    InvalidDateRange,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("client disconnected")]
    Disconnected,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Recommendations {
    pub attractions: Vec<Place>,
    pub restaurants: Vec<Place>,
}

/// Writes SSE frames to the response channel. Without a channel every send is a no-op.
struct EventSink<'a> {
    tx: Option<&'a mpsc::Sender<String>>,
}

impl EventSink<'_> {
    fn silent() -> Self {
        EventSink { tx: None }
    }

    async fn raw(&self, frame: String) -> Result<(), TravelError> {
        match self.tx {
            Some(tx) => tx.send(frame).await.map_err(|_| TravelError::Disconnected),
            None => Ok(()),
        }
    }

    async fn emit(&self, event: &str, data: Value) -> Result<(), TravelError> {
        self.raw(SseEvent::new(event, data).to_frame()).await
    }

    async fn progress(&self, stage: &str) -> Result<(), TravelError> {
        self.emit("progress", json!({ "stage": stage })).await
    }

    async fn heartbeat(&self) -> Result<(), TravelError> {
        let ts = Utc::now().timestamp_millis() as f64 / 1000.0;
        self.emit("heartbeat", json!({ "ts": ts })).await
    }
}

/// Resolves on the next periodic heartbeat; never resolves when heartbeats are off.
async fn next_heartbeat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn matches_any(fields: &[Option<&str>], keywords: &[String]) -> bool {
    keywords.iter().any(|keyword| {
        let keyword = keyword.to_lowercase();
        fields
            .iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&keyword))
    })
}

/// Keeps the entries matching any keyword, or everything when nothing matches.
fn filter_or_all<F>(places: Vec<Place>, keywords: &[String], fields: F) -> Vec<Place>
where
    F: Fn(&Place) -> Vec<Option<&str>>,
{
    if keywords.is_empty() {
        return places;
    }
    let filtered: Vec<Place> = places
        .iter()
        .filter(|place| matches_any(&fields(place), keywords))
        .cloned()
        .collect();
    if filtered.is_empty() {
        places
    } else {
        filtered
    }
}

pub struct TravelService {
    store: Arc<dyn TravelStore>,
    model: Arc<dyn ChatModel>,
    locations: Arc<LocationService>,
    heartbeat_interval: Duration,
}

impl TravelService {
    pub fn new(
        store: Arc<dyn TravelStore>,
        model: Arc<dyn ChatModel>,
        locations: Arc<LocationService>,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            store,
            model,
            locations,
            heartbeat_interval,
        }
    }

    pub fn store(&self) -> &Arc<dyn TravelStore> {
        &self.store
    }

    pub fn locations(&self) -> &Arc<LocationService> {
        &self.locations
    }

    /// Geocodes each accommodation within its city, then saves the plan.
    pub async fn create_plan(
        &self,
        user_id: &str,
        request: TravelPlanCreate,
    ) -> Result<TravelPlan, TravelError> {
        let mut accommodations = Vec::with_capacity(request.addresses.len());
        for address in &request.addresses {
            let query = format!("{} {}", address.city, address.address);
            let city = Some(address.city.as_str()).filter(|c| !c.is_empty());
            let coordinates = self
                .locations
                .geocode(query.trim(), city)
                .await
                .map(|p| (p.latitude, p.longitude));
            accommodations.push(AccommodationDraft {
                address: address.clone(),
                coordinates,
            });
        }

        let plan = self
            .store
            .create_plan(PlanDraft {
                user_id: user_id.to_string(),
                request,
                accommodations,
            })
            .await?;
        Ok(plan)
    }

    pub async fn require_plan(&self, plan_id: &str) -> Result<TravelPlan, TravelError> {
        self.store
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| TravelError::PlanNotFound(plan_id.to_string()))
    }

    fn prompt_for(&self, plan: &TravelPlan, request: &GenerateItineraryRequest, days: u32) -> String {
        let start_date = request.start_date.format("%Y-%m-%d").to_string();
        let note_text = notes::collect_note_text(&plan.xiaohongshu_notes);
        build_itinerary_prompt(&PromptInput {
            destination: &plan.destination,
            days,
            start_date: &start_date,
            travelers: &plan.travelers,
            interests: &plan.interests,
            food_preferences: &plan.food_preferences,
            budget_min: plan.budget_min,
            budget_max: plan.budget_max,
            note_text: &note_text,
        })
    }

    /// Fills in missing coordinates by geocoding `"<destination> <name>"`.
    async fn with_coordinates(&self, destination: &str, places: Vec<Place>) -> Vec<Place> {
        let mut enriched = Vec::with_capacity(places.len());
        for mut place in places {
            if !place.has_coordinates() && !place.name.is_empty() {
                let query = format!("{} {}", destination, place.name);
                if let Some(point) = self.locations.geocode(&query, Some(destination)).await {
                    place.latitude = Some(point.latitude);
                    place.longitude = Some(point.longitude);
                }
            }
            enriched.push(place);
        }
        enriched
    }

    /// Parses the model output, persists each day and builds the result.
    /// Progress and per-day events go to `sink`.
    async fn assemble(
        &self,
        plan: &TravelPlan,
        days: u32,
        text: &str,
        sink: &EventSink<'_>,
    ) -> Result<GenerationResult, TravelError> {
        sink.progress("parse_json").await?;
        let mut itinerary = parse_itinerary_response(text, days);

        sink.progress("fetch_recommendations").await?;
        let attractions = self.locations.search_attractions(&plan.destination, None).await;
        let restaurants = self.locations.search_restaurants(&plan.destination, None).await;
        let attractions = self.with_coordinates(&plan.destination, attractions).await;
        let restaurants = self.with_coordinates(&plan.destination, restaurants).await;
        let flights = self.store.list_flights(&plan.id).await?;
        let accommodations = self.store.list_accommodations(&plan.id).await?;

        sink.progress("persist").await?;
        let mut itinerary_details = Vec::with_capacity(days as usize);
        for day_number in 1..=days {
            let mut day = itinerary
                .remove(&format!("day_{}", day_number))
                .unwrap_or_else(|| json!({}));
            let (spots, day_restaurants) = normalize_day(&mut day);

            let detail = self
                .store
                .upsert_itinerary_day(ItineraryDayUpsert {
                    travel_plan_id: plan.id.clone(),
                    day_number,
                    itinerary: day.clone(),
                    recommended_spots: spots.iter().take(DAY_SPOT_LIMIT).cloned().collect(),
                    recommended_restaurants: day_restaurants
                        .iter()
                        .take(DAY_RESTAURANT_LIMIT)
                        .cloned()
                        .collect(),
                })
                .await?;
            itinerary_details.push(detail);

            let summary = DaySummary {
                day_number,
                items: build_day_items(day_number, &spots, &day_restaurants),
                stats: day_stats(&day, &spots, &day_restaurants),
            };
            sink.raw(SseEvent::json("day", &summary).to_frame()).await?;
        }

        log::info!(
            "Generated {}-day itinerary for plan {}",
            days,
            plan.id
        );

        Ok(GenerationResult {
            success: true,
            travel_plan_id: plan.id.clone(),
            days,
            itinerary_details,
            attractions: attractions.into_iter().take(RECOMMENDATION_LIMIT).collect(),
            restaurants: restaurants.into_iter().take(RECOMMENDATION_LIMIT).collect(),
            flights,
            accommodations,
        })
    }

    /// One-shot generation used by background tasks.
    pub async fn generate_itinerary(
        &self,
        plan_id: &str,
        request: &GenerateItineraryRequest,
    ) -> Result<GenerationResult, TravelError> {
        let plan = self.require_plan(plan_id).await?;
        let days = request.day_count().ok_or(TravelError::InvalidDateRange)?;
        let prompt = self.prompt_for(&plan, request, days);
        let text = self.model.complete(&prompt).await?;
        self.assemble(&plan, days, &text, &EventSink::silent()).await
    }

    async fn stream_into(
        &self,
        plan: &TravelPlan,
        request: &GenerateItineraryRequest,
        tx: &mpsc::Sender<String>,
    ) -> Result<(), TravelError> {
        let sink = EventSink { tx: Some(tx) };
        sink.raw(comment_frame().to_string()).await?;
        sink.emit(
            "started",
            json!({ "travel_plan_id": plan.id, "destination": plan.destination }),
        )
        .await?;
        sink.heartbeat().await?;

        let days = request.day_count().ok_or(TravelError::InvalidDateRange)?;
        let prompt = self.prompt_for(plan, request, days);

        sink.progress("llm_stream_start").await?;
        let (token_tx, mut token_rx) = mpsc::channel::<String>(TOKEN_BUFFER);
        let model = Arc::clone(&self.model);
        let llm = actix_web::rt::spawn(async move { model.stream(&prompt, token_tx).await });

        let mut heartbeat = (!self.heartbeat_interval.is_zero()).then(|| {
            interval_at(
                Instant::now() + self.heartbeat_interval,
                self.heartbeat_interval,
            )
        });
        loop {
            tokio::select! {
                token = token_rx.recv() => match token {
                    Some(delta) => sink.emit("token", json!({ "delta": delta })).await?,
                    None => break,
                },
                _ = next_heartbeat(&mut heartbeat) => sink.heartbeat().await?,
            }
        }

        let text = llm
            .await
            .map_err(|e| TravelError::Task(e.to_string()))??;
        sink.progress("llm_stream_end").await?;

        let result = self.assemble(plan, days, &text, &sink).await?;
        sink.raw(SseEvent::json("result", &result).to_frame()).await
    }

    /// Starts a streaming generation and returns the receiving end of its SSE frames.
    /// Dropping the receiver stops the producer at its next send.
    pub fn generate_itinerary_stream(
        self: &Arc<Self>,
        plan: TravelPlan,
        request: GenerateItineraryRequest,
    ) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let service = Arc::clone(self);

        actix_web::rt::spawn(async move {
            match service.stream_into(&plan, &request, &tx).await {
                Ok(()) => {}
                Err(TravelError::Disconnected) | Err(TravelError::Llm(LlmError::Cancelled)) => {
                    log::info!("Itinerary stream for plan {} closed by client", plan.id);
                }
                Err(e) => {
                    log::error!("Itinerary stream for plan {} failed: {}", plan.id, e);
                    let frame = SseEvent::new("error", json!({ "message": e.to_string() }));
                    let _ = tx.send(frame.to_frame()).await;
                }
            }
        });

        rx
    }

    pub async fn get_recommendations(
        &self,
        destination: &str,
        interests: &[String],
        food_preferences: &[String],
    ) -> Recommendations {
        let attractions = self.locations.search_attractions(destination, None).await;
        let restaurants = self.locations.search_restaurants(destination, None).await;

        let attractions = filter_or_all(attractions, interests, |p| {
            vec![Some(p.name.as_str()), p.description.as_deref()]
        });
        let restaurants = filter_or_all(restaurants, food_preferences, |p| {
            vec![Some(p.name.as_str()), p.cuisine_type.as_deref()]
        });

        Recommendations {
            attractions: attractions.into_iter().take(RECOMMENDATION_LIMIT).collect(),
            restaurants: restaurants.into_iter().take(RECOMMENDATION_LIMIT).collect(),
        }
    }

    /// Searches the provider and stores every hit under `city`.
    pub async fn fetch_attractions(
        &self,
        city: &str,
        keyword: Option<&str>,
    ) -> Result<Value, TravelError> {
        let places = self.locations.search_attractions(city, keyword).await;
        let mut saved_count = 0;
        for place in &places {
            self.store
                .create_attraction(place.clone().into_attraction(city))
                .await?;
            saved_count += 1;
        }
        log::info!("Saved {} attractions for {}", saved_count, city);
        Ok(json!({ "success": true, "attractions": places, "saved_count": saved_count }))
    }

    pub async fn fetch_restaurants(
        &self,
        city: &str,
        cuisine_type: Option<&str>,
    ) -> Result<Value, TravelError> {
        let places = self.locations.search_restaurants(city, cuisine_type).await;
        let mut saved_count = 0;
        for place in &places {
            self.store
                .create_restaurant(place.clone().into_restaurant(city, cuisine_type))
                .await?;
            saved_count += 1;
        }
        log::info!("Saved {} restaurants for {}", saved_count, city);
        Ok(json!({ "success": true, "restaurants": places, "saved_count": saved_count }))
    }
}
