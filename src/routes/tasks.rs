use actix_web::{web, HttpResponse, Responder};

use crate::app::AppState;

/*
    GET /travel/tasks/{task_id}/status
*/
pub async fn status(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    HttpResponse::Ok().json(state.tasks.status(&path.into_inner()))
}
