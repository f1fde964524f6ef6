use std::collections::BTreeSet;

use actix_web::{get, post, web, HttpResponse};
use serde_json::json;
use tracing::error;
use validator::Validate;

use crate::error::{BulkIssueError, ConsumeError, IssueError};
use crate::models::dto::{
    ConsumirQrRequest, GenerarMasivoQuery, GenerarMasivoRequest, GenerarQrQuery, ValidarQrRequest,
};
use crate::services::bulk_issuer::{BulkIssuer, BulkTarget};
use crate::services::employee_directory::EmployeeFilter;
use crate::services::token_lifecycle::{TokenPayload, ValidationOutcome};
use crate::services::token_store::ConsumptionContext;
use crate::services::QrLifecycle;
use crate::utils::qr;

fn payload_json(payload: &TokenPayload) -> serde_json::Value {
    json!({
        "token_id": payload.token_id,
        "qr_data": {
            "token": payload.secret,
            "empleado_id": payload.employee_id,
            "rut": payload.rut,
            "nombre": payload.full_name,
            "tipo_contrato": payload.tipo_contrato,
            "expira": payload.expires_at,
            "hash": payload.hash,
        },
        "qr_string": payload.qr_string,
        "expira_en_minutos": payload.ttl_minutes,
    })
}

fn issue_error_response(err: &IssueError) -> HttpResponse {
    let body = json!({ "error": err.to_string(), "codigo": err.code() });
    match err {
        IssueError::InvalidTtl { .. } => HttpResponse::BadRequest().json(body),
        IssueError::EmployeeNotFound(_) => HttpResponse::NotFound().json(body),
        IssueError::EmployeeInactive(_) => HttpResponse::Conflict().json(body),
        IssueError::Exhausted { .. } | IssueError::Store(_) | IssueError::Directory(_) => {
            error!("QR issuance failed: {err}");
            HttpResponse::InternalServerError().json(body)
        }
    }
}

/// POST /api/qr/generar/{empleado_id} - Emitir un QR de un solo uso
#[post("/generar/{empleado_id}")]
pub async fn generar_qr(
    lifecycle: web::Data<QrLifecycle>,
    path: web::Path<i32>,
    query: web::Query<GenerarQrQuery>,
) -> HttpResponse {
    let empleado_id = path.into_inner();
    let ttl = query
        .duracion_minutos
        .unwrap_or(lifecycle.config().default_ttl_minutes);

    match lifecycle.issue(empleado_id, ttl).await {
        Ok(payload) => {
            let mut body = payload_json(&payload);
            body["success"] = json!(true);
            body["mensaje"] = json!(format!("QR generado para {}", payload.full_name));
            HttpResponse::Created().json(body)
        }
        Err(e) => issue_error_response(&e),
    }
}

fn outcome_json(outcome: &ValidationOutcome) -> serde_json::Value {
    let mut body = json!({
        "valido": outcome.is_valid(),
        "codigo": outcome.code(),
        "mensaje": outcome.message(),
    });

    match outcome {
        ValidationOutcome::Valid(valid) => {
            body["empleado"] = json!(valid.employee);
            body["token_id"] = json!(valid.token_id);
            body["tiempo_restante_minutos"] = json!(valid.remaining_minutes);
        }
        ValidationOutcome::AlreadyConsumed { consumed_at } => {
            body["fecha_uso"] = json!(consumed_at);
        }
        ValidationOutcome::Expired { expires_at } => {
            body["expiro"] = json!(expires_at);
        }
        ValidationOutcome::AlreadyDelivered { delivered_at } => {
            body["fecha_retiro"] = json!(delivered_at);
        }
        ValidationOutcome::TokenNotFound | ValidationOutcome::EmployeeInactive => {}
    }

    body
}

/// POST /api/qr/validar - Chequeo previo al escaneo (sin efectos)
#[post("/validar")]
pub async fn validar_qr(
    lifecycle: web::Data<QrLifecycle>,
    body: web::Json<ValidarQrRequest>,
) -> HttpResponse {
    if let Err(errors) = body.validate() {
        return HttpResponse::BadRequest().json(errors);
    }

    // Un QR de otro sistema o mal formado no puede existir en la tabla
    let outcome = match qr::extract_secret(&lifecycle.config().prefix, &body.token) {
        Ok(secret) => match lifecycle.validate(&secret, body.periodo_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("QR validation failed: {e}");
                return HttpResponse::InternalServerError().json(json!({
                    "error": "Error al validar QR"
                }));
            }
        },
        Err(_) => ValidationOutcome::TokenNotFound,
    };

    HttpResponse::Ok().json(outcome_json(&outcome))
}

/// POST /api/qr/consumir/{token_id} - Marcar el token como usado
#[post("/consumir/{token_id}")]
pub async fn consumir_qr(
    lifecycle: web::Data<QrLifecycle>,
    path: web::Path<i32>,
    body: Option<web::Json<ConsumirQrRequest>>,
) -> HttpResponse {
    let request = body.map(web::Json::into_inner).unwrap_or_default();
    if let Err(errors) = request.validate() {
        return HttpResponse::BadRequest().json(errors);
    }

    let context = ConsumptionContext {
        ip_address: request.ip_address,
        device_id: request.dispositivo_id,
    };

    match lifecycle.consume(path.into_inner(), context).await {
        Ok(token) => HttpResponse::Ok().json(json!({
            "success": true,
            "token_id": token.id,
            "empleado_id": token.employee_id,
            "fecha_uso": token.consumed_at,
        })),
        Err(e) => consume_error_response(&e),
    }
}

pub(crate) fn consume_error_response(err: &ConsumeError) -> HttpResponse {
    let body = json!({ "error": err.to_string() });
    match err {
        ConsumeError::NotFound => HttpResponse::NotFound().json(body),
        ConsumeError::AlreadyConsumed => HttpResponse::Conflict().json(body),
        ConsumeError::Expired => HttpResponse::Gone().json(body),
        ConsumeError::Store(e) => {
            error!("QR consumption failed: {e}");
            HttpResponse::InternalServerError().json(json!({ "error": "Error al consumir QR" }))
        }
    }
}

/// POST /api/qr/generar-masivo - Emitir QR para varios empleados
#[post("/generar-masivo")]
pub async fn generar_masivo(
    lifecycle: web::Data<QrLifecycle>,
    query: web::Query<GenerarMasivoQuery>,
    body: Option<web::Json<GenerarMasivoRequest>>,
) -> HttpResponse {
    let query = query.into_inner();
    let request = body.map(web::Json::into_inner).unwrap_or_default();
    let ttl = query
        .duracion_minutos
        .unwrap_or(lifecycle.config().default_ttl_minutes);

    // Ids explícitos tienen prioridad sobre los filtros; una lista vacía no cuenta
    let target = match request.empleados_ids {
        Some(ids) if !ids.is_empty() => {
            BulkTarget::Employees(ids.into_iter().collect::<BTreeSet<i32>>())
        }
        _ => BulkTarget::Filter(EmployeeFilter {
            sucursal_id: query.sucursal_id,
            tipo_contrato: query.tipo_contrato,
        }),
    };

    match BulkIssuer::new(lifecycle.get_ref()).issue_for(target, ttl).await {
        Ok(report) => {
            let qr_data: Vec<_> = report.issued.iter().map(payload_json).collect();
            let expira = report.issued.iter().map(|p| p.expires_at).max();
            HttpResponse::Ok().json(json!({
                "success": true,
                "total_empleados": report.total,
                "qr_generados": report.issued.len(),
                "qr_fallidos": report.failed.len(),
                "duracion_minutos": ttl,
                "expira": expira,
                "qr_data": qr_data,
                "errores": report.failed,
                "mensaje": format!(
                    "Se generaron {} QR de {} empleados",
                    report.issued.len(),
                    report.total
                ),
            }))
        }
        Err(e @ BulkIssueError::InvalidTtl { .. }) => {
            HttpResponse::BadRequest().json(json!({ "error": e.to_string(), "codigo": "INVALID_TTL" }))
        }
        Err(e @ BulkIssueError::NoCandidates) => {
            HttpResponse::NotFound().json(json!({ "error": e.to_string() }))
        }
        Err(BulkIssueError::Directory(e)) => {
            error!("bulk issuance failed: {e}");
            HttpResponse::InternalServerError().json(json!({ "error": "Error al generar QR masivo" }))
        }
    }
}

/// POST /api/qr/limpiar-expirados - Borrar tokens expirados sin usar
#[post("/limpiar-expirados")]
pub async fn limpiar_expirados(lifecycle: web::Data<QrLifecycle>) -> HttpResponse {
    match lifecycle.sweep_expired(lifecycle.now()).await {
        Ok(removed) => HttpResponse::Ok().json(json!({
            "success": true,
            "tokens_eliminados": removed,
        })),
        Err(e) => {
            error!("expired token sweep failed: {e}");
            HttpResponse::InternalServerError().json(json!({ "error": "Error al limpiar tokens" }))
        }
    }
}

/// GET /api/qr/estadisticas
#[get("/estadisticas")]
pub async fn estadisticas(lifecycle: web::Data<QrLifecycle>) -> HttpResponse {
    match lifecycle.stats().await {
        Ok(stats) => HttpResponse::Ok().json(json!({
            "total_generados": stats.total,
            "activos": stats.active,
            "usados": stats.consumed,
            "expirados": stats.expired,
        })),
        Err(e) => {
            error!("token stats failed: {e}");
            HttpResponse::InternalServerError().json(json!({ "error": "Error al obtener estadísticas" }))
        }
    }
}

pub fn qr_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/qr")
            .service(generar_qr)
            .service(validar_qr)
            .service(consumir_qr)
            .service(generar_masivo)
            .service(limpiar_expirados)
            .service(estadisticas),
    );
}
