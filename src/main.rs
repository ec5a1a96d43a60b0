// src/main.rs
use std::sync::Arc;

use actix_web::{App, HttpServer, middleware, web};
use log::info;

use kisskin::config;
use kisskin::errors::KisskinError;
use kisskin::handlers::{AppState, analyze, health_check};
use kisskin::services::LLMService;

// Selfie data URLs routinely exceed actix's default JSON payload limit.
const JSON_PAYLOAD_LIMIT: usize = 25 * 1024 * 1024;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting KisSkin gateway...");

    let app_state = AppState {
        llm: Arc::new(LLMService::new(config::provider_base_url())),
    };

    let bind_addr = config::bind_addr();
    info!("Starting HTTP server on {bind_addr}");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(
                web::JsonConfig::default()
                    .limit(JSON_PAYLOAD_LIMIT)
                    .error_handler(|err, _req| {
                        KisskinError::Validation(err.to_string()).into()
                    }),
            )
            .wrap(middleware::Logger::default())
            .service(web::scope("/api").route("/analyze", web::post().to(analyze)))
            .route("/health", web::get().to(health_check))
    })
    .bind(bind_addr)?
    .run()
    .await
}
