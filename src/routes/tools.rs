use actix_web::{web, HttpResponse, Responder};
use serde_json::{Map, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::tools;

/*
    GET /travel/tools
*/
pub async fn list() -> impl Responder {
    HttpResponse::Ok().json(tools::all_schemas())
}

/*
    POST /travel/tools/{name}
*/
pub async fn execute(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<Map<String, Value>>,
) -> Result<HttpResponse, ApiError> {
    let name = path.into_inner();
    let output = state.tools.execute(&name, &body).await?;
    Ok(HttpResponse::Ok().json(output))
}
