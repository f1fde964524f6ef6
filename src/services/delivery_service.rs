// ============================================================================
// SERVICIO : REGISTRO DE ENTREGAS POR QR
// ============================================================================
//
// Descripción:
//   El consumo del token y el alta de la entrega van en la misma transacción:
//   o quedan ambos, o ninguno.
//
// Puntos de atención:
//   - La fila del empleado queda bloqueada (FOR UPDATE) durante la transacción
//   - A lo más una entrega COMPLETADO por empleado y período
// ============================================================================

use std::sync::Arc;

use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::{info, warn};

use crate::error::{ConsumeError, DeliveryError};
use crate::models::entregas;
use crate::services::delivery_ledger::{self, NewDelivery};
use crate::services::employee_directory::{self, Employee};
use crate::services::token_lifecycle::consume_in;
use crate::services::token_store::{
    ConsumptionContext, SeaOrmTokenStore, Token, TokenState, TokenStore,
};
use crate::utils::clock::Clock;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryRequest {
    pub token_id: i32,
    pub user_id: Option<i32>,
    pub period_id: Option<i32>,
    pub device_id: Option<String>,
    pub ip_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegisteredDelivery {
    pub entrega: entregas::Model,
    pub employee: Employee,
    pub token: Token,
}

#[derive(Clone)]
pub struct DeliveryService {
    db: DatabaseConnection,
    clock: Arc<dyn Clock>,
}

impl DeliveryService {
    pub fn new(db: DatabaseConnection, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn register(&self, request: DeliveryRequest) -> Result<RegisteredDelivery, DeliveryError> {
        let now = self.clock.now();
        let txn = self.db.begin().await?;
        let store = SeaOrmTokenStore::new(txn);

        let token = store
            .find_by_id(request.token_id)
            .await?
            .ok_or(ConsumeError::NotFound)?;

        match token.state(now) {
            TokenState::Consumed => return Err(ConsumeError::AlreadyConsumed.into()),
            TokenState::Expired => return Err(ConsumeError::Expired.into()),
            TokenState::Issued => {}
        }

        // Bloquea al empleado antes de buscar entregas previas del período
        let employee = employee_directory::lock_employee(store.connection(), token.employee_id)
            .await?
            .ok_or(DeliveryError::EmployeeNotFound(token.employee_id))?;

        if !employee.activo {
            warn!(employee_id = employee.id, token_id = token.id, "delivery refused for inactive employee");
            return Err(DeliveryError::EmployeeInactive(employee.id));
        }

        if let Some(period_id) = request.period_id {
            let prior =
                delivery_ledger::find_completed_delivery(store.connection(), employee.id, period_id)
                    .await?;
            if let Some(prior) = prior {
                warn!(
                    employee_id = employee.id,
                    period_id, "employee already received the benefit in this period"
                );
                return Err(DeliveryError::AlreadyDelivered {
                    delivered_at: prior.delivered_at,
                });
            }
        }

        let context = ConsumptionContext {
            ip_address: request.ip_address.clone(),
            device_id: request.device_id.clone(),
        };
        let token = consume_in(&store, token.id, context, now).await?;

        // Tiempo desde la emisión hasta el escaneo
        let scan_duration_secs =
            i32::try_from((now - token.issued_at).num_seconds()).unwrap_or(i32::MAX);

        let entrega = delivery_ledger::record_delivery(
            store.connection(),
            NewDelivery {
                employee_id: employee.id,
                user_id: request.user_id,
                period_id: request.period_id,
                token_id: token.id,
                delivered_at: now,
                device_id: request.device_id,
                ip_address: request.ip_address,
                latitude: request.latitude,
                longitude: request.longitude,
                scan_duration_secs,
                box_type: employee.box_type().to_string(),
                notes: request.notes,
            },
        )
        .await?;

        store.into_inner().commit().await?;

        info!(
            entrega_id = entrega.id,
            employee_id = employee.id,
            token_id = token.id,
            "delivery registered"
        );

        Ok(RegisteredDelivery {
            entrega,
            employee,
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use sea_orm::ConnectionTrait;
    use testresult::TestResult;

    use super::*;
    use crate::services::delivery_ledger::{ESTADO_COMPLETADO, METODO_QR_SEGURO};
    use crate::services::token_store::NewToken;
    use crate::test_support;
    use crate::utils::clock::ManualClock;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    async fn setup() -> (DatabaseConnection, DeliveryService, Arc<ManualClock>, Token) {
        let db = test_support::sqlite_db().await;
        test_support::insert_employee(&db, 7, true, "PLAZO_FIJO").await;
        let token = SeaOrmTokenStore::new(db.clone())
            .insert(NewToken {
                employee_id: 7,
                secret: "secreto-entrega".into(),
                integrity_hash: "h".into(),
                issued_at: t0(),
                expires_at: t0() + Duration::minutes(60),
            })
            .await
            .unwrap();

        let clock = Arc::new(ManualClock::new(t0()));
        clock.advance(Duration::seconds(90));
        let service = DeliveryService::new(db.clone(), clock.clone());
        (db, service, clock, token)
    }

    fn request(token_id: i32) -> DeliveryRequest {
        DeliveryRequest {
            token_id,
            user_id: Some(4),
            period_id: Some(3),
            device_id: Some("scanner-2".into()),
            ip_address: Some("10.1.1.5".into()),
            latitude: Some(-33.45),
            longitude: Some(-70.66),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_register_consumes_token_and_records_delivery() -> TestResult {
        let (db, service, _, token) = setup().await;

        let registered = service.register(request(token.id)).await?;

        assert_eq!(registered.entrega.empleado_id, 7);
        assert_eq!(registered.entrega.qr_token_id, Some(token.id));
        assert_eq!(registered.entrega.duracion_escaneo, Some(90));
        assert_eq!(registered.entrega.tipo_caja, "PLAZO_FIJO");
        assert_eq!(registered.entrega.metodo, METODO_QR_SEGURO);
        assert_eq!(registered.entrega.estado, ESTADO_COMPLETADO);
        assert!(registered.token.consumed);

        let stored = SeaOrmTokenStore::new(db).find_by_id(token.id).await?.unwrap();
        assert!(stored.consumed);
        assert_eq!(stored.context.device_id.as_deref(), Some("scanner-2"));
        Ok(())
    }

    #[tokio::test]
    async fn test_second_registration_is_rejected() -> TestResult {
        let (_, service, _, token) = setup().await;
        service.register(request(token.id)).await?;

        let second = service.register(request(token.id)).await;

        assert!(
            matches!(second, Err(DeliveryError::Consume(ConsumeError::AlreadyConsumed))),
            "got {second:?}"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_and_unknown_tokens() -> TestResult {
        let (_, service, clock, token) = setup().await;

        let missing = service.register(request(999)).await;
        assert!(matches!(missing, Err(DeliveryError::Consume(ConsumeError::NotFound))), "got {missing:?}");

        clock.advance(Duration::hours(1));
        let expired = service.register(request(token.id)).await;
        assert!(matches!(expired, Err(DeliveryError::Consume(ConsumeError::Expired))), "got {expired:?}");
        Ok(())
    }

    #[tokio::test]
    async fn test_prior_delivery_in_period_blocks_registration() -> TestResult {
        let (db, service, _, token) = setup().await;
        let yesterday = t0() - Duration::days(1);
        test_support::insert_delivery(&db, 7, 3, ESTADO_COMPLETADO, yesterday).await;

        let result = service.register(request(token.id)).await;

        assert!(
            matches!(result, Err(DeliveryError::AlreadyDelivered { delivered_at }) if delivered_at == yesterday),
            "got {result:?}"
        );

        // El token sigue disponible
        let stored = SeaOrmTokenStore::new(db).find_by_id(token.id).await?.unwrap();
        assert!(!stored.consumed);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back_consumption() -> TestResult {
        let (db, service, _, token) = setup().await;
        db.execute_unprepared("DROP TABLE entregas").await?;

        let result = service.register(DeliveryRequest {
            period_id: None,
            ..request(token.id)
        })
        .await;
        assert!(matches!(result, Err(DeliveryError::Database(_))), "got {result:?}");

        let stored = SeaOrmTokenStore::new(db).find_by_id(token.id).await?.unwrap();
        assert!(!stored.consumed);
        assert_eq!(stored.consumed_at, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_inactive_employee_cannot_collect() -> TestResult {
        let (db, service, _, token) = setup().await;
        // Desactivado después de emitido el token
        db.execute_unprepared("UPDATE empleados SET activo = 0 WHERE id = 7").await?;

        let result = service.register(request(token.id)).await;

        assert!(matches!(result, Err(DeliveryError::EmployeeInactive(7))), "got {result:?}");

        let stored = SeaOrmTokenStore::new(db.clone()).find_by_id(token.id).await?.unwrap();
        assert!(!stored.consumed);
        let deliveries = delivery_ledger::find_completed_delivery(&db, 7, 3).await?;
        assert_eq!(deliveries, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_second_token_same_period_is_already_delivered() -> TestResult {
        let (db, service, _, first) = setup().await;
        let second = SeaOrmTokenStore::new(db.clone())
            .insert(NewToken {
                employee_id: 7,
                secret: "otro-secreto".into(),
                integrity_hash: "h2".into(),
                issued_at: t0(),
                expires_at: t0() + Duration::minutes(60),
            })
            .await?;

        let registered = service.register(request(first.id)).await?;
        let result = service.register(request(second.id)).await;

        assert!(
            matches!(result, Err(DeliveryError::AlreadyDelivered { delivered_at }) if delivered_at == registered.entrega.fecha_hora),
            "got {result:?}"
        );
        let stored = SeaOrmTokenStore::new(db).find_by_id(second.id).await?.unwrap();
        assert!(!stored.consumed);
        Ok(())
    }
}
