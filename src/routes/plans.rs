use actix_web::{web, HttpResponse};

use crate::app::AppState;
use crate::db::TravelStore;
use crate::error::ApiError;
use crate::middleware::current_user::CurrentUser;
use crate::models::plan::TravelPlanCreate;

/*
    POST /travel/plans
*/
pub async fn create(
    state: web::Data<AppState>,
    user: CurrentUser,
    body: web::Json<TravelPlanCreate>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    request.validate().map_err(ApiError::Validation)?;

    let plan = state.travel.create_plan(&user.user_id, request).await?;
    log::info!("Created travel plan {} for user {}", plan.id, user.user_id);
    Ok(HttpResponse::Created().json(plan))
}

/*
    GET /travel/plans
*/
pub async fn list(state: web::Data<AppState>, user: CurrentUser) -> Result<HttpResponse, ApiError> {
    let plans = state.store().list_plans(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(plans))
}

/*
    GET /travel/plans/{plan_id}
*/
pub async fn get_by_id(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let plan = state.travel.require_plan(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(plan))
}
