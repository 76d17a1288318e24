use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId, Bson, Document},
    options::{ClientOptions, ReturnDocument, ServerApi, ServerApiVersion},
    Client, Collection, Database,
};
use serde::{de::DeserializeOwned, Serialize};

use super::{new_id, parse_id, StoreError, TravelStore, SEARCH_LIMIT};
use crate::models::conversation::{Conversation, ConversationCreate};
use crate::models::itinerary::{ItineraryDayUpsert, ItineraryDetail};
use crate::models::place::{
    Attraction, AttractionQuery, NewAttraction, NewRestaurant, Restaurant, RestaurantQuery,
};
use crate::models::plan::{Accommodation, Flight, PlanDraft, TravelPlan, User};

const USERS: &str = "Users";
const PLANS: &str = "Plans";
const FLIGHTS: &str = "Flights";
const ACCOMMODATIONS: &str = "Accommodations";
const CONVERSATIONS: &str = "Conversations";
const ITINERARY_DAYS: &str = "ItineraryDays";
const ATTRACTIONS: &str = "Attractions";
const RESTAURANTS: &str = "Restaurants";

pub async fn create_mongo_client(uri: &str) -> Result<Client, StoreError> {
    log::info!("Connecting to MongoDB");

    let mut client_options = ClientOptions::parse(uri).await?;

    client_options.connect_timeout = Some(Duration::from_secs(10));
    client_options.server_selection_timeout = Some(Duration::from_secs(10));
    client_options.max_pool_size = Some(10);
    client_options.min_pool_size = Some(1);

    let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
    client_options.server_api = Some(server_api);

    Ok(Client::with_options(client_options)?)
}

/// Converts a model into a stored document, moving `id` to `_id`.
/// Hex ids become ObjectIds; anything else (user ids) is kept as a string.
fn to_record<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    let mut record = bson::to_document(value)?;
    if let Some(Bson::String(id)) = record.remove("id") {
        let key = match ObjectId::parse_str(&id) {
            Ok(oid) => Bson::ObjectId(oid),
            Err(_) => Bson::String(id),
        };
        record.insert("_id", key);
    }
    Ok(record)
}

fn from_record<T: DeserializeOwned>(mut record: Document) -> Result<T, StoreError> {
    match record.remove("_id") {
        Some(Bson::ObjectId(oid)) => {
            record.insert("id", oid.to_hex());
        }
        Some(Bson::String(id)) => {
            record.insert("id", id);
        }
        _ => {}
    }
    Ok(bson::from_document(record)?)
}

fn ci_regex(value: &str) -> Document {
    doc! { "$regex": regex::escape(value), "$options": "i" }
}

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        let client = create_mongo_client(uri).await?;
        let store = Self {
            db: client.database(database),
        };

        match store.ping().await {
            Ok(_) => log::info!("Connected to MongoDB database {}", database),
            Err(e) => log::warn!("Connected to MongoDB but ping failed: {}", e),
        }
        Ok(store)
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }

    async fn insert<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        self.collection(name).insert_one(to_record(value)?).await?;
        Ok(())
    }

    async fn find_all<T: DeserializeOwned>(
        &self,
        name: &str,
        filter: Document,
        sort: Document,
        limit: Option<i64>,
    ) -> Result<Vec<T>, StoreError> {
        let collection = self.collection(name);
        let mut find = collection.find(filter).sort(sort);
        if let Some(limit) = limit {
            find = find.limit(limit);
        }
        let records: Vec<Document> = find.await?.try_collect().await?;
        records.into_iter().map(from_record).collect()
    }
}

#[async_trait]
impl TravelStore for MongoStore {
    fn backend_name(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! {"ping": 1}).await?;
        Ok(())
    }

    async fn ensure_user(&self, user_id: &str) -> Result<User, StoreError> {
        let users = self.collection(USERS);
        if let Some(record) = users.find_one(doc! {"_id": user_id}).await? {
            return from_record(record);
        }

        let user = User::placeholder(user_id);
        users.insert_one(to_record(&user)?).await?;
        log::info!("Created placeholder user {}", user_id);
        Ok(user)
    }

    async fn create_plan(&self, draft: PlanDraft) -> Result<TravelPlan, StoreError> {
        self.ensure_user(&draft.user_id).await?;

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
        self.insert(PLANS, &plan).await?;

        for flight in request.flights {
            let flight = Flight {
                id: new_id(),
                user_id: draft.user_id.clone(),
                travel_plan_id: Some(plan.id.clone()),
                departure_airport: flight.departure_airport,
                arrival_airport: flight.arrival_airport,
                departure_time: flight.departure_time,
                return_time: flight.return_time,
                latitude: None,
                longitude: None,
            };
            self.insert(FLIGHTS, &flight).await?;
        }

        for lodging in draft.accommodations {
            let accommodation = Accommodation {
                id: new_id(),
                user_id: draft.user_id.clone(),
                travel_plan_id: Some(plan.id.clone()),
                city: lodging.address.city,
                address: lodging.address.address,
                check_in_date: lodging.address.check_in_date,
                check_out_date: lodging.address.check_out_date,
                latitude: lodging.coordinates.map(|(lat, _)| lat),
                longitude: lodging.coordinates.map(|(_, lng)| lng),
            };
            self.insert(ACCOMMODATIONS, &accommodation).await?;
        }

        log::info!("Created travel plan {} for user {}", plan.id, plan.user_id);
        Ok(plan)
    }

    async fn get_plan(&self, plan_id: &str) -> Result<Option<TravelPlan>, StoreError> {
        let oid = parse_id(plan_id)?;
        match self.collection(PLANS).find_one(doc! {"_id": oid}).await? {
            Some(record) => Ok(Some(from_record(record)?)),
            None => Ok(None),
        }
    }

    async fn list_plans(&self, user_id: &str) -> Result<Vec<TravelPlan>, StoreError> {
        self.find_all(PLANS, doc! {"user_id": user_id}, doc! {"_id": -1}, None)
            .await
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
        self.insert(CONVERSATIONS, &conversation).await?;
        Ok(conversation)
    }

    async fn list_conversations(&self, plan_id: &str) -> Result<Vec<Conversation>, StoreError> {
        self.find_all(
            CONVERSATIONS,
            doc! {"travel_plan_id": plan_id},
            doc! {"_id": 1},
            None,
        )
        .await
    }

    async fn upsert_itinerary_day(
        &self,
        day: ItineraryDayUpsert,
    ) -> Result<ItineraryDetail, StoreError> {
        let now = bson::to_bson(&Utc::now())?;
        let filter = doc! {
            "travel_plan_id": day.travel_plan_id.as_str(),
            "day_number": i64::from(day.day_number),
        };
        let update = doc! {
            "$set": {
                "itinerary": bson::to_bson(&day.itinerary)?,
                "recommended_spots": bson::to_bson(&day.recommended_spots)?,
                "recommended_restaurants": bson::to_bson(&day.recommended_restaurants)?,
                "updated_at": now.clone(),
            },
            "$setOnInsert": { "created_at": now },
        };

        let record = self
            .collection(ITINERARY_DAYS)
            .find_one_and_update(filter, update)
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| {
                StoreError::UpsertFailed(format!("{} day {}", day.travel_plan_id, day.day_number))
            })?;
        from_record(record)
    }

    async fn list_itinerary_days(
        &self,
        plan_id: &str,
    ) -> Result<Vec<ItineraryDetail>, StoreError> {
        self.find_all(
            ITINERARY_DAYS,
            doc! {"travel_plan_id": plan_id},
            doc! {"day_number": 1},
            None,
        )
        .await
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
        self.insert(ATTRACTIONS, &attraction).await?;
        Ok(attraction)
    }

    async fn search_attractions(
        &self,
        query: &AttractionQuery,
    ) -> Result<Vec<Attraction>, StoreError> {
        let city = query.city.as_deref().filter(|c| !c.is_empty());
        let keyword = query.keyword.as_deref().filter(|k| !k.is_empty());

        let filter = match (city, keyword) {
            (Some(city), _) => doc! {"city": city},
            (None, Some(kw)) => doc! {
                "$or": [ {"name": ci_regex(kw)}, {"description": ci_regex(kw)} ]
            },
            (None, None) => doc! {},
        };

        self.find_all(ATTRACTIONS, filter, doc! {"_id": -1}, Some(SEARCH_LIMIT as i64))
            .await
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
        self.insert(RESTAURANTS, &restaurant).await?;
        Ok(restaurant)
    }

    async fn search_restaurants(
        &self,
        query: &RestaurantQuery,
    ) -> Result<Vec<Restaurant>, StoreError> {
        let mut filter = doc! {};
        if let Some(city) = query.city.as_deref().filter(|c| !c.is_empty()) {
            filter.insert("city", city);
        }
        if let Some(cuisine) = query.cuisine_type.as_deref().filter(|c| !c.is_empty()) {
            filter.insert("cuisine_type", cuisine);
        }
        if let Some(kw) = query.keyword.as_deref().filter(|k| !k.is_empty()) {
            filter.insert(
                "$or",
                vec![
                    Bson::Document(doc! {"name": ci_regex(kw)}),
                    Bson::Document(doc! {"description": ci_regex(kw)}),
                ],
            );
        }

        self.find_all(RESTAURANTS, filter, doc! {"_id": -1}, Some(SEARCH_LIMIT as i64))
            .await
    }

    async fn list_flights(&self, plan_id: &str) -> Result<Vec<Flight>, StoreError> {
        self.find_all(FLIGHTS, doc! {"travel_plan_id": plan_id}, doc! {"_id": 1}, None)
            .await
    }

    async fn list_accommodations(&self, plan_id: &str) -> Result<Vec<Accommodation>, StoreError> {
        self.find_all(
            ACCOMMODATIONS,
            doc! {"travel_plan_id": plan_id},
            doc! {"_id": 1},
            None,
        )
        .await
    }
}
