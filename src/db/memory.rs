use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::{contains_ci, new_id, parse_id, StoreError, TravelStore, SEARCH_LIMIT};
use crate::models::conversation::{Conversation, ConversationCreate};
use crate::models::itinerary::{ItineraryDayUpsert, ItineraryDetail};
use crate::models::place::{
    Attraction, AttractionQuery, NewAttraction, NewRestaurant, Restaurant, RestaurantQuery,
};
use crate::models::plan::{Accommodation, Flight, PlanDraft, TravelPlan, User};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    plans: Vec<TravelPlan>,
    flights: Vec<Flight>,
    accommodations: Vec<Accommodation>,
    conversations: Vec<Conversation>,
    itinerary_days: Vec<ItineraryDetail>,
    attractions: Vec<Attraction>,
    restaurants: Vec<Restaurant>,
}

/// Process-local store. Rows live in insertion order, so "newest first" is a reverse scan.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn user_entry<'a>(tables: &'a mut Tables, user_id: &str) -> &'a User {
    tables
        .users
        .entry(user_id.to_string())
        .or_insert_with(|| User::placeholder(user_id))
}

#[async_trait]
impl TravelStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn ensure_user(&self, user_id: &str) -> Result<User, StoreError> {
        let mut tables = self.write();
        Ok(user_entry(&mut tables, user_id).clone())
    }

    async fn create_plan(&self, draft: PlanDraft) -> Result<TravelPlan, StoreError> {
        let mut tables = self.write();
        user_entry(&mut tables, &draft.user_id);

        let now = Utc::now();
        let request = draft.request;
        let plan = TravelPlan {
            id: new_id(),
            user_id: draft.user_id.clone(),
            destination: request.primary_destination(),
            budget_min: request.budget.min,
            budget_max: request.budget.max,
            interests: request.interests,
            food_preferences: request.food_preferences,
            travelers: request.travelers,
            xiaohongshu_notes: request.xiaohongshu_notes,
            addresses: request.addresses,
            created_at: now,
            updated_at: now,
        };

        for flight in request.flights {
            tables.flights.push(Flight {
                id: new_id(),
                user_id: draft.user_id.clone(),
                travel_plan_id: Some(plan.id.clone()),
                departure_airport: flight.departure_airport,
                arrival_airport: flight.arrival_airport,
                departure_time: flight.departure_time,
                return_time: flight.return_time,
                latitude: None,
                longitude: None,
            });
        }

        for lodging in draft.accommodations {
            tables.accommodations.push(Accommodation {
                id: new_id(),
                user_id: draft.user_id.clone(),
                travel_plan_id: Some(plan.id.clone()),
                city: lodging.address.city,
                address: lodging.address.address,
                check_in_date: lodging.address.check_in_date,
                check_out_date: lodging.address.check_out_date,
                latitude: lodging.coordinates.map(|(lat, _)| lat),
                longitude: lodging.coordinates.map(|(_, lng)| lng),
            });
        }

        tables.plans.push(plan.clone());
        Ok(plan)
    }

    async fn get_plan(&self, plan_id: &str) -> Result<Option<TravelPlan>, StoreError> {
        parse_id(plan_id)?;
        Ok(self.read().plans.iter().find(|p| p.id == plan_id).cloned())
    }

    async fn list_plans(&self, user_id: &str) -> Result<Vec<TravelPlan>, StoreError> {
        Ok(self
            .read()
            .plans
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_conversation(
        &self,
        user_id: &str,
        input: ConversationCreate,
    ) -> Result<Conversation, StoreError> {
        let conversation = Conversation {
            id: new_id(),
            user_id: user_id.to_string(),
            travel_plan_id: input.travel_plan_id,
            message: input.message,
            sender: input.sender,
            timestamp: Utc::now(),
        };
        self.write().conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn list_conversations(&self, plan_id: &str) -> Result<Vec<Conversation>, StoreError> {
        Ok(self
            .read()
            .conversations
            .iter()
            .filter(|c| c.travel_plan_id.as_deref() == Some(plan_id))
            .cloned()
            .collect())
    }

    async fn upsert_itinerary_day(
        &self,
        day: ItineraryDayUpsert,
    ) -> Result<ItineraryDetail, StoreError> {
        let mut tables = self.write();
        let now = Utc::now();

        if let Some(existing) = tables
            .itinerary_days
            .iter_mut()
            .find(|d| d.travel_plan_id == day.travel_plan_id && d.day_number == day.day_number)
        {
            existing.itinerary = day.itinerary;
            existing.recommended_spots = day.recommended_spots;
            existing.recommended_restaurants = day.recommended_restaurants;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let detail = ItineraryDetail {
            id: new_id(),
            travel_plan_id: day.travel_plan_id,
            day_number: day.day_number,
            itinerary: day.itinerary,
            recommended_spots: day.recommended_spots,
            recommended_restaurants: day.recommended_restaurants,
            created_at: now,
            updated_at: now,
        };
        tables.itinerary_days.push(detail.clone());
        Ok(detail)
    }

    async fn list_itinerary_days(
        &self,
        plan_id: &str,
    ) -> Result<Vec<ItineraryDetail>, StoreError> {
        let mut days: Vec<ItineraryDetail> = self
            .read()
            .itinerary_days
            .iter()
            .filter(|d| d.travel_plan_id == plan_id)
            .cloned()
            .collect();
        days.sort_by_key(|d| d.day_number);
        Ok(days)
    }

    async fn create_attraction(&self, input: NewAttraction) -> Result<Attraction, StoreError> {
        let attraction = Attraction {
            id: new_id(),
            name: input.name,
            city: input.city,
            description: input.description,
            address: input.address,
            latitude: input.latitude,
            longitude: input.longitude,
            rating: input.rating,
            category: input.category,
            created_at: Utc::now(),
        };
        self.write().attractions.push(attraction.clone());
        Ok(attraction)
    }

    async fn search_attractions(
        &self,
        query: &AttractionQuery,
    ) -> Result<Vec<Attraction>, StoreError> {
        let city = query.city.as_deref().filter(|c| !c.is_empty());
        let keyword = query.keyword.as_deref().filter(|k| !k.is_empty());

        Ok(self
            .read()
            .attractions
            .iter()
            .rev()
            .filter(|a| match (city, keyword) {
                (Some(city), _) => a.city == city,
                (None, Some(kw)) => {
                    contains_ci(Some(&a.name), kw) || contains_ci(a.description.as_deref(), kw)
                }
                (None, None) => true,
            })
            .take(SEARCH_LIMIT)
            .cloned()
            .collect())
    }

    async fn create_restaurant(&self, input: NewRestaurant) -> Result<Restaurant, StoreError> {
        let restaurant = Restaurant {
            id: new_id(),
            name: input.name,
            city: input.city,
            cuisine_type: input.cuisine_type,
            description: input.description,
            address: input.address,
            latitude: input.latitude,
            longitude: input.longitude,
            rating: input.rating,
            price_range: input.price_range,
            created_at: Utc::now(),
        };
        self.write().restaurants.push(restaurant.clone());
        Ok(restaurant)
    }

    async fn search_restaurants(
        &self,
        query: &RestaurantQuery,
    ) -> Result<Vec<Restaurant>, StoreError> {
        let city = query.city.as_deref().filter(|c| !c.is_empty());
        let cuisine = query.cuisine_type.as_deref().filter(|c| !c.is_empty());
        let keyword = query.keyword.as_deref().filter(|k| !k.is_empty());

        Ok(self
            .read()
            .restaurants
            .iter()
            .rev()
            .filter(|r| city.map_or(true, |c| r.city == c))
            .filter(|r| cuisine.map_or(true, |c| r.cuisine_type.as_deref() == Some(c)))
            .filter(|r| {
                keyword.map_or(true, |kw| {
                    contains_ci(Some(&r.name), kw) || contains_ci(r.description.as_deref(), kw)
                })
            })
            .take(SEARCH_LIMIT)
            .cloned()
            .collect())
    }

    async fn list_flights(&self, plan_id: &str) -> Result<Vec<Flight>, StoreError> {
        Ok(self
            .read()
            .flights
            .iter()
            .filter(|f| f.travel_plan_id.as_deref() == Some(plan_id))
            .cloned()
            .collect())
    }

    async fn list_accommodations(&self, plan_id: &str) -> Result<Vec<Accommodation>, StoreError> {
        Ok(self
            .read()
            .accommodations
            .iter()
            .filter(|a| a.travel_plan_id.as_deref() == Some(plan_id))
            .cloned()
            .collect())
    }
}
