use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;

use travel_planner_api::app::{self, AppState};
use travel_planner_api::config::{Settings, StoreBackend};
use travel_planner_api::db::{MemoryStore, MongoStore, TravelStore};
use travel_planner_api::services::llm::OpenAiCompatibleClient;
use travel_planner_api::services::location::LocationService;

fn invalid_setup<E: std::fmt::Display>(e: E) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let settings = Settings::from_env().map_err(invalid_setup)?;
    log::info!("{} {} starting", settings.project_name, settings.version);

    let store: Arc<dyn TravelStore> = match &settings.store {
        StoreBackend::Mongo { uri, database } => {
            log::info!("Connecting to MongoDB database {}", database);
            Arc::new(MongoStore::connect(uri, database).await.map_err(invalid_setup)?)
        }
        StoreBackend::Memory => {
            log::warn!("Using the in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    if settings.llm.api_key.is_none() {
        log::warn!("DEEPSEEK_API_KEY is not set, itinerary generation will fail");
    }
    let model = Arc::new(OpenAiCompatibleClient::new(&settings.llm).map_err(invalid_setup)?);
    let locations = Arc::new(LocationService::from_settings(&settings));

    let host = settings.host.clone();
    let port = settings.port;
    let api_prefix = settings.api_prefix.clone();
    let cors_origins = settings.cors_origins.clone();
    let state = web::Data::new(AppState::new(settings, store, model, locations));

    log::info!("Listening on {}:{}{}", host, port, api_prefix);

    HttpServer::new(move || {
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(|cfg| app::configure(cfg, &api_prefix))
    })
    .bind((host, port))?
    .run()
    .await
}
