use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use thiserror::Error;

use crate::models::conversation::{Conversation, ConversationCreate};
use crate::models::itinerary::{ItineraryDayUpsert, ItineraryDetail};
use crate::models::place::{
    Attraction, AttractionQuery, NewAttraction, NewRestaurant, Restaurant, RestaurantQuery,
};
use crate::models::plan::{Accommodation, Flight, PlanDraft, TravelPlan, User};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Upper bound on rows returned by place searches.
pub const SEARCH_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("failed to encode document: {0}")]
    BsonSer(#[from] mongodb::bson::ser::Error),

    #[error("failed to decode document: {0}")]
    BsonDe(#[from] mongodb::bson::de::Error),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("upsert returned no document for {0}")]
    UpsertFailed(String),
}

/// Validates a caller-supplied id. Both backends use ObjectId hex strings.
pub fn parse_id(id: &str) -> Result<ObjectId, StoreError> {
    ObjectId::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))
}

pub fn new_id() -> String {
    ObjectId::new().to_hex()
}

#[async_trait]
pub trait TravelStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn ensure_user(&self, user_id: &str) -> Result<User, StoreError>;

    /// Persists the plan with its flights and accommodations, creating the user if needed.
    async fn create_plan(&self, draft: PlanDraft) -> Result<TravelPlan, StoreError>;

    async fn get_plan(&self, plan_id: &str) -> Result<Option<TravelPlan>, StoreError>;

    /// Newest first.
    async fn list_plans(&self, user_id: &str) -> Result<Vec<TravelPlan>, StoreError>;

    async fn create_conversation(
        &self,
        user_id: &str,
        input: ConversationCreate,
    ) -> Result<Conversation, StoreError>;

    /// Oldest first.
    async fn list_conversations(&self, plan_id: &str) -> Result<Vec<Conversation>, StoreError>;

    /// One row per (plan, day). An existing row has its contents replaced.
    async fn upsert_itinerary_day(
        &self,
        day: ItineraryDayUpsert,
    ) -> Result<ItineraryDetail, StoreError>;

    async fn list_itinerary_days(&self, plan_id: &str)
        -> Result<Vec<ItineraryDetail>, StoreError>;

    async fn create_attraction(&self, input: NewAttraction) -> Result<Attraction, StoreError>;

    /// City match wins over keyword. Newest first, at most [`SEARCH_LIMIT`].
    async fn search_attractions(&self, query: &AttractionQuery)
        -> Result<Vec<Attraction>, StoreError>;

    async fn create_restaurant(&self, input: NewRestaurant) -> Result<Restaurant, StoreError>;

    /// Every given filter must match. Newest first, at most [`SEARCH_LIMIT`].
    async fn search_restaurants(&self, query: &RestaurantQuery)
        -> Result<Vec<Restaurant>, StoreError>;

    async fn list_flights(&self, plan_id: &str) -> Result<Vec<Flight>, StoreError>;

    async fn list_accommodations(&self, plan_id: &str) -> Result<Vec<Accommodation>, StoreError>;
}

pub(crate) fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}
