use actix_web::{post, web, HttpResponse};
use serde_json::json;
use tracing::error;
use validator::Validate;

use crate::error::DeliveryError;
use crate::models::dto::RegistrarEntregaRequest;
use crate::routes::qr::consume_error_response;
use crate::services::delivery_service::{DeliveryRequest, DeliveryService};

/// POST /api/entregas/registrar-seguro - Registrar una entrega escaneada por QR
#[post("/registrar-seguro")]
pub async fn registrar_seguro(
    service: web::Data<DeliveryService>,
    body: web::Json<RegistrarEntregaRequest>,
) -> HttpResponse {
    if let Err(errors) = body.validate() {
        return HttpResponse::BadRequest().json(errors);
    }

    let body = body.into_inner();
    let request = DeliveryRequest {
        token_id: body.qr_token_id,
        user_id: body.usuario_id,
        period_id: body.periodo_id,
        device_id: body.dispositivo_id,
        ip_address: body.ip_address,
        latitude: body.latitud,
        longitude: body.longitud,
        notes: body.observaciones,
    };

    match service.register(request).await {
        Ok(registered) => HttpResponse::Created().json(json!({
            "success": true,
            "mensaje": "Entrega registrada exitosamente",
            "entrega_id": registered.entrega.id,
            "empleado": {
                "id": registered.employee.id,
                "rut": registered.employee.rut,
                "nombre_completo": registered.employee.full_name(),
            },
            "tipo_caja": registered.entrega.tipo_caja,
            "duracion_escaneo_segundos": registered.entrega.duracion_escaneo,
            "timestamp": registered.entrega.fecha_hora,
        })),
        Err(DeliveryError::Consume(e)) => consume_error_response(&e),
        Err(e @ DeliveryError::AlreadyDelivered { .. }) => {
            HttpResponse::Conflict().json(json!({ "error": e.to_string(), "codigo": "ALREADY_DELIVERED" }))
        }
        Err(e @ DeliveryError::EmployeeInactive(_)) => {
            HttpResponse::Conflict().json(json!({ "error": e.to_string(), "codigo": "EMPLOYEE_INACTIVE" }))
        }
        Err(e @ DeliveryError::EmployeeNotFound(_)) => {
            HttpResponse::NotFound().json(json!({ "error": e.to_string() }))
        }
        Err(DeliveryError::Database(e)) => {
            error!("delivery registration failed: {e}");
            HttpResponse::InternalServerError().json(json!({ "error": "Error al registrar entrega" }))
        }
    }
}

pub fn entregas_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/entregas").service(registrar_seguro));
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{http::StatusCode, test, App};
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::Value;

    use super::*;
    use crate::services::token_store::{NewToken, SeaOrmTokenStore, TokenStore};
    use crate::test_support;
    use crate::utils::clock::ManualClock;

    #[actix_web::test]
    async fn test_registrar_seguro_once() {
        let db = test_support::sqlite_db().await;
        test_support::insert_employee(&db, 7, true, "PLANTA").await;
        let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let token = SeaOrmTokenStore::new(db.clone())
            .insert(NewToken {
                employee_id: 7,
                secret: "para-entregar".into(),
                integrity_hash: "h".into(),
                issued_at: t0,
                expires_at: t0 + Duration::minutes(60),
            })
            .await
            .unwrap();

        let clock = Arc::new(ManualClock::new(t0 + Duration::seconds(45)));
        let service = web::Data::new(DeliveryService::new(db, clock));
        let app = test::init_service(
            App::new()
                .app_data(service)
                .service(web::scope("/api").configure(entregas_routes)),
        )
        .await;

        let payload = json!({ "qr_token_id": token.id, "periodo_id": 3, "dispositivo_id": "scanner-9" });

        let req = test::TestRequest::post()
            .uri("/api/entregas/registrar-seguro")
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["duracion_escaneo_segundos"], 45);
        assert_eq!(body["tipo_caja"], "PLANTA");

        let req = test::TestRequest::post()
            .uri("/api/entregas/registrar-seguro")
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post()
            .uri("/api/entregas/registrar-seguro")
            .set_json(json!({ "qr_token_id": 0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_registrar_seguro_inactive_employee_is_conflict() {
        let db = test_support::sqlite_db().await;
        test_support::insert_employee(&db, 5, false, "PLANTA").await;
        let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let token = SeaOrmTokenStore::new(db.clone())
            .insert(NewToken {
                employee_id: 5,
                secret: "de-inactivo".into(),
                integrity_hash: "h".into(),
                issued_at: t0,
                expires_at: t0 + Duration::minutes(60),
            })
            .await
            .unwrap();

        let clock = Arc::new(ManualClock::new(t0 + Duration::minutes(1)));
        let service = web::Data::new(DeliveryService::new(db.clone(), clock));
        let app = test::init_service(
            App::new()
                .app_data(service)
                .service(web::scope("/api").configure(entregas_routes)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/entregas/registrar-seguro")
            .set_json(json!({ "qr_token_id": token.id, "periodo_id": 3 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["codigo"], "EMPLOYEE_INACTIVE");

        let stored = SeaOrmTokenStore::new(db).find_by_id(token.id).await.unwrap().unwrap();
        assert!(!stored.consumed);
    }
}
