use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;

mod api;
mod attendance;
mod auth;
mod config;
mod db;
mod docs;
mod geo;
mod model;
mod models;
mod routes;
mod utils;

use crate::attendance::service::AttendanceService;
use crate::attendance::store::mysql::MySqlStore;
use crate::docs::ApiDoc;
use crate::geo::GeofencePolicy;
use crate::geo::geocode::Geocoder;
use config::Config;
use db::init_db;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Site Attendance API"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let pool = init_db(&config.database_url).await?;

    let geocoder = Geocoder::new(config.geocoders.clone(), config.geocode_timeout)
        .context("failed to build geocoding client")?;
    if !geocoder.is_enabled() {
        warn!("Reverse geocoding disabled; addresses fall back to raw coordinates");
    }

    let service = Data::new(AttendanceService::new(
        MySqlStore::new(pool.clone()),
        GeofencePolicy::new(config.geofence_radius_km),
        config.same_day_policy,
    ));
    info!(
        radius_km = config.geofence_radius_km,
        same_day = %config.same_day_policy,
        "Attendance service ready"
    );

    let pool = Data::new(pool);
    let geocoder = Data::new(geocoder);
    let config = Data::new(config);
    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                // wildcard so the UI's JS/CSS assets resolve
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(pool.clone())
            .app_data(config.clone())
            .app_data(geocoder.clone())
            .app_data(service.clone())
            .service(index)
            .configure(|cfg| routes::configure(cfg, &config))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
