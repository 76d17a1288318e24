use std::convert::Infallible;

use actix_web::{http::header, web, HttpResponse};
use futures::stream;

use crate::app::AppState;
use crate::db::TravelStore;
use crate::error::ApiError;
use crate::models::itinerary::{GenerateItineraryRequest, ItineraryGenerationResponse};
use crate::services::travel_service::TravelError;

fn check_dates(request: &GenerateItineraryRequest) -> Result<(), ApiError> {
    match request.day_count() {
        Some(_) => Ok(()),
        None => Err(TravelError::InvalidDateRange.into()),
    }
}

/*
    POST /travel/plans/{plan_id}/generate-itinerary
*/
pub async fn generate(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<GenerateItineraryRequest>,
) -> Result<HttpResponse, ApiError> {
    let plan = state.travel.require_plan(&path.into_inner()).await?;
    let request = body.into_inner();
    check_dates(&request)?;

    let task_id = state
        .tasks
        .spawn_generation(state.travel.clone(), plan.id, request);

    Ok(HttpResponse::Ok().json(ItineraryGenerationResponse {
        task_id,
        status: "pending".to_string(),
        message: "路线生成任务已提交，请使用task_id查询进度".to_string(),
    }))
}

/*
    POST /travel/plans/{plan_id}/generate-itinerary/stream
*/
pub async fn generate_stream(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<GenerateItineraryRequest>,
) -> Result<HttpResponse, ApiError> {
    let plan = state.travel.require_plan(&path.into_inner()).await?;
    let request = body.into_inner();
    check_dates(&request)?;

    log::info!("Streaming itinerary for plan {} ({})", plan.id, plan.destination);
    let frames = state.travel.generate_itinerary_stream(plan, request);
    let body = stream::unfold(frames, |mut frames| async move {
        let frame = frames.recv().await?;
        Some((Ok::<_, Infallible>(web::Bytes::from(frame)), frames))
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(body))
}

/*
    GET /travel/plans/{plan_id}/itinerary
*/
pub async fn get_details(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let details = state.store().list_itinerary_days(&path.into_inner()).await?;
    if details.is_empty() {
        return Err(ApiError::NotFound("路线详情不存在".to_string()));
    }
    Ok(HttpResponse::Ok().json(details))
}
