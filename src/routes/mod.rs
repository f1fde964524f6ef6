pub mod health;
pub mod qr;
pub mod entregas;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .configure(qr::qr_routes)
            .configure(entregas::entregas_routes)
    );
}
