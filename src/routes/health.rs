use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use serde_json::json;

use crate::app::AppState;
use crate::db::TravelStore;

#[derive(Serialize)]
struct HealthStatus<'a> {
    status: &'a str,
    service: &'a str,
    store: &'a str,
}

/*
    /
*/
pub async fn root(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "message": format!("Welcome to {}", state.settings.project_name),
        "version": state.settings.version,
        "docs": "/docs",
    }))
}

/*
    /health
*/
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store = state.store();
    let status = match store.ping().await {
        Ok(()) => "healthy",
        Err(e) => {
            log::warn!("Health check: {} ping failed: {}", store.backend_name(), e);
            "degraded"
        }
    };

    HttpResponse::Ok().json(HealthStatus {
        status,
        service: &state.settings.project_name,
        store: store.backend_name(),
    })
}
