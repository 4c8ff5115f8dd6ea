use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use dotenvy::dotenv;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod service;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::utils::{identity_filter, settings_cache};
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let (config, config_warnings) = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");
    for warning in &config_warnings {
        tracing::warn!("{}", warning);
    }

    settings_cache::init(config.settings_cache_ttl);

    let pool = init_db(&config).await.map_err(|e| {
        tracing::error!("Database initialisation failed: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e)
    })?;

    let pool_for_filter_warmup = pool.clone();
    let pool_for_settings_warmup = pool.clone();
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    actix_web::rt::spawn(async move {
        if let Err(e) = identity_filter::warmup_identity_filter(&pool_for_filter_warmup, 500).await {
            log::error!("Failed to warm up identity filter: {:?}", e);
        }
    });

    actix_web::rt::spawn(async move {
        if let Err(e) = service::settings::ensure_defaults(&pool_for_settings_warmup).await {
            log::warn!("Failed to seed default settings: {}", e);
        }
        if let Err(e) = settings_cache::warmup_settings_cache(&pool_for_settings_warmup).await {
            log::error!("Failed to warm up settings cache: {:?}", e);
        }
    });

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                // wildcard so the UI's JS and CSS assets resolve
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
