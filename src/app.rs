use std::sync::Arc;

use actix_web::{error::InternalError, web, HttpRequest, HttpResponse};

use crate::config::Settings;
use crate::db::TravelStore;
use crate::error::ApiError;
use crate::routes;
use crate::services::llm::ChatModel;
use crate::services::location::LocationService;
use crate::services::task_registry::TaskRegistry;
use crate::services::tools::ToolExecutor;
use crate::services::travel_service::TravelService;

/// Everything a handler needs, shared across workers through `web::Data`.
pub struct AppState {
    pub settings: Settings,
    pub travel: Arc<TravelService>,
    pub tasks: Arc<TaskRegistry>,
    pub tools: ToolExecutor,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: Arc<dyn TravelStore>,
        model: Arc<dyn ChatModel>,
        locations: Arc<LocationService>,
    ) -> Self {
        let travel = Arc::new(TravelService::new(
            store,
            model,
            locations.clone(),
            settings.heartbeat_interval,
        ));
        Self {
            settings,
            travel,
            tasks: Arc::new(TaskRegistry::new()),
            tools: ToolExecutor::new(locations),
        }
    }

    pub fn store(&self) -> &Arc<dyn TravelStore> {
        self.travel.store()
    }
}

/// Malformed JSON bodies and query strings answer 422 with a `detail` body.
fn validation_error(message: String) -> actix_web::Error {
    let response = actix_web::ResponseError::error_response(&ApiError::Validation(message.clone()));
    InternalError::from_response(message, response).into()
}

fn json_error(err: actix_web::error::JsonPayloadError, _: &HttpRequest) -> actix_web::Error {
    validation_error(err.to_string())
}

fn query_error(err: actix_web::error::QueryPayloadError, _: &HttpRequest) -> actix_web::Error {
    validation_error(err.to_string())
}

async fn not_found() -> HttpResponse {
    actix_web::ResponseError::error_response(&ApiError::NotFound("Not Found".to_string()))
}

/// Mounts every route. `api_prefix` is usually `/api/v1`.
pub fn configure(cfg: &mut web::ServiceConfig, api_prefix: &str) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .route("/", web::get().to(routes::health::root))
        .route("/health", web::get().to(routes::health::health_check))
        .service(
            web::scope(api_prefix).service(
                web::scope("/travel")
                    .route("/geocode", web::get().to(routes::places::geocode))
                    .service(
                        web::scope("/plans")
                            .route("", web::post().to(routes::plans::create))
                            .route("", web::get().to(routes::plans::list))
                            .route("/{plan_id}", web::get().to(routes::plans::get_by_id))
                            .route(
                                "/{plan_id}/generate-itinerary",
                                web::post().to(routes::itinerary::generate),
                            )
                            .route(
                                "/{plan_id}/generate-itinerary/stream",
                                web::post().to(routes::itinerary::generate_stream),
                            )
                            .route(
                                "/{plan_id}/itinerary",
                                web::get().to(routes::itinerary::get_details),
                            )
                            .route(
                                "/{plan_id}/conversations",
                                web::get().to(routes::conversations::list_for_plan),
                            ),
                    )
                    .route("/conversations", web::post().to(routes::conversations::create))
                    .route("/attractions", web::get().to(routes::places::search_attractions))
                    .route(
                        "/attractions/fetch",
                        web::post().to(routes::places::fetch_attractions),
                    )
                    .route("/restaurants", web::get().to(routes::places::search_restaurants))
                    .route(
                        "/restaurants/fetch",
                        web::post().to(routes::places::fetch_restaurants),
                    )
                    .route(
                        "/recommendations",
                        web::get().to(routes::places::recommendations),
                    )
                    .route("/tasks/{task_id}/status", web::get().to(routes::tasks::status))
                    .route("/tools", web::get().to(routes::tools::list))
                    .route("/tools/{name}", web::post().to(routes::tools::execute)),
            ),
        )
        .default_service(web::to(not_found));
}
