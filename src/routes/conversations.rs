use actix_web::{web, HttpResponse};

use crate::app::AppState;
use crate::db::TravelStore;
use crate::error::ApiError;
use crate::middleware::current_user::CurrentUser;
use crate::models::conversation::ConversationCreate;

/*
    POST /travel/conversations
*/
pub async fn create(
    state: web::Data<AppState>,
    user: CurrentUser,
    body: web::Json<ConversationCreate>,
) -> Result<HttpResponse, ApiError> {
    let conversation = state
        .store()
        .create_conversation(&user.user_id, body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(conversation))
}

/*
    GET /travel/plans/{plan_id}/conversations
*/
pub async fn list_for_plan(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let conversations = state.store().list_conversations(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(conversations))
}
