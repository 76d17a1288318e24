use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::app::AppState;
use crate::db::TravelStore;
use crate::error::ApiError;
use crate::models::itinerary::ItineraryGenerationResponse;
use crate::models::place::{AttractionQuery, RestaurantQuery};

#[derive(Deserialize)]
pub struct GeocodeParams {
    address: String,
    location: Option<String>,
}

#[derive(Deserialize)]
pub struct RecommendationParams {
    destination: String,
    interests: Option<String>,
    food_preferences: Option<String>,
}

#[derive(Deserialize)]
pub struct AttractionFetch {
    city: String,
    keyword: Option<String>,
}

#[derive(Deserialize)]
pub struct RestaurantFetch {
    city: String,
    cuisine_type: Option<String>,
}

/// Splits `a,b,c` query values, dropping blanks.
fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn submitted(task_id: String) -> HttpResponse {
    HttpResponse::Ok().json(ItineraryGenerationResponse {
        task_id,
        status: "pending".to_string(),
        message: "任务已提交，请使用task_id查询进度".to_string(),
    })
}

/*
    GET /travel/geocode?address=&location=
*/
pub async fn geocode(
    state: web::Data<AppState>,
    params: web::Query<GeocodeParams>,
) -> Result<HttpResponse, ApiError> {
    let point = state
        .travel
        .locations()
        .geocode(&params.address, params.location.as_deref())
        .await
        .ok_or_else(|| ApiError::NotFound("无法解析该地址".to_string()))?;
    Ok(HttpResponse::Ok().json(point))
}

/*
    GET /travel/attractions?city=&keyword=
*/
pub async fn search_attractions(
    state: web::Data<AppState>,
    params: web::Query<AttractionQuery>,
) -> Result<HttpResponse, ApiError> {
    let attractions = state.store().search_attractions(&params).await?;
    Ok(HttpResponse::Ok().json(attractions))
}

/*
    GET /travel/restaurants?city=&cuisine_type=&keyword=
*/
pub async fn search_restaurants(
    state: web::Data<AppState>,
    params: web::Query<RestaurantQuery>,
) -> Result<HttpResponse, ApiError> {
    let restaurants = state.store().search_restaurants(&params).await?;
    Ok(HttpResponse::Ok().json(restaurants))
}

/*
    POST /travel/attractions/fetch
*/
pub async fn fetch_attractions(
    state: web::Data<AppState>,
    body: web::Json<AttractionFetch>,
) -> HttpResponse {
    let body = body.into_inner();
    let task_id = state
        .tasks
        .spawn_attraction_fetch(state.travel.clone(), body.city, body.keyword);
    submitted(task_id)
}

/*
    POST /travel/restaurants/fetch
*/
pub async fn fetch_restaurants(
    state: web::Data<AppState>,
    body: web::Json<RestaurantFetch>,
) -> HttpResponse {
    let body = body.into_inner();
    let task_id = state
        .tasks
        .spawn_restaurant_fetch(state.travel.clone(), body.city, body.cuisine_type);
    submitted(task_id)
}

/*
    GET /travel/recommendations?destination=&interests=a,b&food_preferences=c
*/
pub async fn recommendations(
    state: web::Data<AppState>,
    params: web::Query<RecommendationParams>,
) -> HttpResponse {
    let interests = split_list(params.interests.as_deref());
    let food_preferences = split_list(params.food_preferences.as_deref());
    let recommendations = state
        .travel
        .get_recommendations(&params.destination, &interests, &food_preferences)
        .await;
    HttpResponse::Ok().json(recommendations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(Some("熊猫, 博物馆,,")), vec!["熊猫", "博物馆"]);
        assert!(split_list(None).is_empty());
        assert!(split_list(Some("")).is_empty());
    }
}
