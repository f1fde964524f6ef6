mod config;
mod db;
mod error;
mod logging;
mod models;
mod routes;
mod services;
mod utils;
#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::services::delivery_ledger::SeaOrmDeliveryLedger;
use crate::services::delivery_service::DeliveryService;
use crate::services::employee_directory::SeaOrmEmployeeDirectory;
use crate::services::sweeper::spawn_sweeper;
use crate::services::token_lifecycle::TokenLifecycle;
use crate::services::token_store::SeaOrmTokenStore;
use crate::services::QrLifecycle;
use crate::utils::clock::{Clock, SystemClock};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;
    logging::init_logging(config.log_format).map_err(std::io::Error::other)?;

    info!("connecting to database");
    let db = db::establish_connection(&config).await.map_err(|e| {
        error!("failed to connect to database: {e}");
        std::io::Error::other(e)
    })?;
    info!("database connected");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let lifecycle: web::Data<QrLifecycle> = web::Data::new(TokenLifecycle::new(
        SeaOrmTokenStore::new(db.clone()),
        SeaOrmEmployeeDirectory::new(db.clone()),
        SeaOrmDeliveryLedger::new(db.clone()),
        clock.clone(),
        config.qr.clone(),
    ));
    let deliveries = web::Data::new(DeliveryService::new(db.clone(), clock));

    if config.qr.sweep_interval_secs > 0 {
        spawn_sweeper(
            lifecycle.clone().into_inner(),
            Duration::from_secs(config.qr.sweep_interval_secs),
        );
    }

    info!(host = %config.host, port = config.port, "starting server");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(lifecycle.clone())
            .app_data(deliveries.clone())
            .configure(routes::configure_routes)
    })
        .bind((config.host.as_str(), config.port))?
        .run()
        .await
}
