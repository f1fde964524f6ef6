// ============================================================================
// SERVICIO : CICLO DE VIDA DE TOKENS - EMISIÓN, VALIDACIÓN, CONSUMO Y LIMPIEZA
// ============================================================================
//
// Descripción:
//   Reglas de negocio de los tokens QR sobre TokenStore, EmployeeDirectory
//   y DeliveryLedger inyectados.
//
// Estados:
//   ISSUED -> CONSUMED, o ISSUED -> EXPIRED. Ambos finales son terminales.
//
// Puntos de atención:
//   - El único escritor de los campos de consumo es `consume_in`
//   - `validate` no escribe nada
// ============================================================================

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::QrConfig;
use crate::error::{ConsumeError, IssueError, LifecycleError, StoreError};
use crate::services::delivery_ledger::DeliveryLedger;
use crate::services::employee_directory::{Employee, EmployeeDirectory};
use crate::services::token_store::{ConsumptionContext, NewToken, Token, TokenStats, TokenStore};
use crate::utils::clock::Clock;
use crate::utils::qr::{self, QrPayload};

/// Resultado de una emisión: lo necesario para dibujar e imprimir el QR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPayload {
    pub token_id: i32,
    /// Credencial portadora. No se vuelve a enviar después de la emisión.
    pub secret: String,
    pub qr_string: String,
    pub employee_id: i32,
    pub rut: String,
    pub full_name: String,
    pub tipo_contrato: String,
    /// Primeros caracteres del hash de integridad
    pub hash: String,
    pub expires_at: DateTime<Utc>,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeSummary {
    pub id: i32,
    pub rut: String,
    pub nombre: String,
    pub apellido: String,
    pub nombre_completo: String,
    pub tipo_contrato: String,
    pub tipo_caja: String,
    pub sucursal_id: Option<i32>,
}

impl From<&Employee> for EmployeeSummary {
    fn from(employee: &Employee) -> Self {
        Self {
            id: employee.id,
            rut: employee.rut.clone(),
            nombre: employee.nombre.clone(),
            apellido: employee.apellido.clone(),
            nombre_completo: employee.full_name(),
            tipo_contrato: employee.tipo_contrato.clone(),
            tipo_caja: employee.box_type().to_string(),
            sucursal_id: employee.sucursal_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    Ok,
    TokenNotFound,
    AlreadyConsumed,
    Expired,
    EmployeeInactive,
    AlreadyDelivered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidToken {
    /// Referencia opaca para el consumo posterior (nunca el secret)
    pub token_id: i32,
    pub employee: EmployeeSummary,
    pub remaining_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid(ValidToken),
    TokenNotFound,
    AlreadyConsumed { consumed_at: Option<DateTime<Utc>> },
    Expired { expires_at: DateTime<Utc> },
    EmployeeInactive,
    AlreadyDelivered { delivered_at: DateTime<Utc> },
}

impl ValidationOutcome {
    pub fn code(&self) -> ValidationCode {
        match self {
            ValidationOutcome::Valid(_) => ValidationCode::Ok,
            ValidationOutcome::TokenNotFound => ValidationCode::TokenNotFound,
            ValidationOutcome::AlreadyConsumed { .. } => ValidationCode::AlreadyConsumed,
            ValidationOutcome::Expired { .. } => ValidationCode::Expired,
            ValidationOutcome::EmployeeInactive => ValidationCode::EmployeeInactive,
            ValidationOutcome::AlreadyDelivered { .. } => ValidationCode::AlreadyDelivered,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid(_))
    }

    /// Mensaje para mostrar en el escáner
    pub fn message(&self) -> String {
        match self {
            ValidationOutcome::Valid(_) => "QR válido - Puede proceder con el registro".to_string(),
            ValidationOutcome::TokenNotFound => "QR inválido o no encontrado".to_string(),
            ValidationOutcome::AlreadyConsumed { consumed_at: Some(at) } => {
                format!("Este QR ya fue utilizado el {}", at.to_rfc3339())
            }
            ValidationOutcome::AlreadyConsumed { consumed_at: None } => {
                "Este QR ya fue utilizado".to_string()
            }
            ValidationOutcome::Expired { .. } => "Este QR ha expirado. Genera uno nuevo.".to_string(),
            ValidationOutcome::EmployeeInactive => "Empleado inactivo o no encontrado".to_string(),
            ValidationOutcome::AlreadyDelivered { delivered_at } => format!(
                "Este empleado ya retiró su beneficio el {}",
                delivered_at.to_rfc3339()
            ),
        }
    }
}

pub struct TokenLifecycle<S, E, D> {
    store: S,
    employees: E,
    deliveries: D,
    clock: Arc<dyn Clock>,
    config: QrConfig,
}

impl<S, E, D> TokenLifecycle<S, E, D>
where
    S: TokenStore,
    E: EmployeeDirectory,
    D: DeliveryLedger,
{
    pub fn new(store: S, employees: E, deliveries: D, clock: Arc<dyn Clock>, config: QrConfig) -> Self {
        Self {
            store,
            employees,
            deliveries,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &QrConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn employees(&self) -> &E {
        &self.employees
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn ttl_in_range(&self, ttl_minutes: i64) -> bool {
        ttl_minutes > 0 && ttl_minutes <= self.config.max_ttl_minutes
    }

    /// Emite un token de un solo uso para un empleado activo.
    ///
    /// Si el secret choca con uno existente se regenera, hasta
    /// `max_issue_attempts` intentos.
    pub async fn issue(&self, employee_id: i32, ttl_minutes: i64) -> Result<TokenPayload, IssueError> {
        if !self.ttl_in_range(ttl_minutes) {
            return Err(IssueError::InvalidTtl {
                ttl: ttl_minutes,
                max: self.config.max_ttl_minutes,
            });
        }

        let employee = self
            .employees
            .get_employee(employee_id)
            .await
            .map_err(IssueError::Directory)?
            .ok_or(IssueError::EmployeeNotFound(employee_id))?;

        if !employee.activo {
            return Err(IssueError::EmployeeInactive(employee_id));
        }

        let attempts = self.config.max_issue_attempts;
        for attempt in 1..=attempts {
            let issued_at = self.clock.now();
            let secret = qr::generate_secret();
            let new_token = NewToken {
                employee_id,
                integrity_hash: qr::integrity_hash(&secret, employee_id, issued_at),
                secret,
                issued_at,
                expires_at: issued_at + Duration::minutes(ttl_minutes),
            };

            match self.store.insert(new_token).await {
                Ok(token) => {
                    info!(token_id = token.id, employee_id, ttl_minutes, "QR token issued");
                    return Ok(self.payload(&token, &employee, ttl_minutes));
                }
                Err(StoreError::Conflict) => {
                    warn!(employee_id, attempt, "secret collision, regenerating");
                }
                Err(e) => return Err(IssueError::Store(e)),
            }
        }

        error!(employee_id, attempts, "could not generate a unique secret");
        Err(IssueError::Exhausted { attempts })
    }

    fn payload(&self, token: &Token, employee: &Employee, ttl_minutes: i64) -> TokenPayload {
        TokenPayload {
            token_id: token.id,
            secret: token.secret.clone(),
            qr_string: QrPayload::new(&self.config.prefix, &token.secret, employee.id).to_string(),
            employee_id: employee.id,
            rut: employee.rut.clone(),
            full_name: employee.full_name(),
            tipo_contrato: employee.tipo_contrato.clone(),
            hash: qr::display_hash(&token.integrity_hash).to_string(),
            expires_at: token.expires_at,
            ttl_minutes,
        }
    }

    /// Chequeo previo al escaneo. Solo lectura: se puede repetir sin efectos.
    ///
    /// Orden: existe → no usado → no expirado → empleado activo → sin
    /// entrega previa en el período (si se indica).
    pub async fn validate(
        &self,
        secret: &str,
        periodo_id: Option<i32>,
    ) -> Result<ValidationOutcome, LifecycleError> {
        let now = self.clock.now();

        let Some(token) = self.store.find_by_secret(secret).await? else {
            return Ok(ValidationOutcome::TokenNotFound);
        };

        if token.consumed {
            return Ok(ValidationOutcome::AlreadyConsumed {
                consumed_at: token.consumed_at,
            });
        }

        if now >= token.expires_at {
            return Ok(ValidationOutcome::Expired {
                expires_at: token.expires_at,
            });
        }

        let employee = match self
            .employees
            .get_employee(token.employee_id)
            .await
            .map_err(LifecycleError::Directory)?
        {
            Some(employee) if employee.activo => employee,
            _ => return Ok(ValidationOutcome::EmployeeInactive),
        };

        if let Some(periodo_id) = periodo_id {
            let prior = self
                .deliveries
                .completed_delivery(token.employee_id, periodo_id)
                .await
                .map_err(LifecycleError::Ledger)?;

            if let Some(prior) = prior {
                return Ok(ValidationOutcome::AlreadyDelivered {
                    delivered_at: prior.delivered_at,
                });
            }
        }

        Ok(ValidationOutcome::Valid(ValidToken {
            token_id: token.id,
            employee: EmployeeSummary::from(&employee),
            remaining_minutes: (token.expires_at - now).num_minutes(),
        }))
    }

    /// Marca el token como usado. Debe llamarse una sola vez por entrega.
    pub async fn consume(
        &self,
        token_id: i32,
        context: ConsumptionContext,
    ) -> Result<Token, ConsumeError> {
        consume_in(&self.store, token_id, context, self.clock.now()).await
    }

    /// Borra los tokens expirados que nunca se usaron.
    pub async fn sweep_expired(&self, as_of: DateTime<Utc>) -> Result<u64, LifecycleError> {
        let removed = self.store.delete_expired_unconsumed(as_of).await?;
        if removed > 0 {
            info!(removed, %as_of, "expired QR tokens removed");
        }
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<TokenStats, LifecycleError> {
        Ok(self.store.stats(self.clock.now()).await?)
    }
}

/// Consumo sobre un store cualquiera, incluido uno ligado a una transacción.
///
/// La verificación de usado/expirado la hace la escritura condicional del
/// store, no una lectura previa: de dos consumos simultáneos solo uno gana.
pub async fn consume_in<S>(
    store: &S,
    token_id: i32,
    context: ConsumptionContext,
    now: DateTime<Utc>,
) -> Result<Token, ConsumeError>
where
    S: TokenStore + ?Sized,
{
    match store.mark_consumed(token_id, now, context).await {
        Ok(token) => {
            info!(token_id, employee_id = token.employee_id, "QR token consumed");
            Ok(token)
        }
        Err(e) => {
            let e = ConsumeError::from(e);
            match &e {
                ConsumeError::Store(db_err) => error!(token_id, "failed to consume token: {db_err}"),
                other => warn!(token_id, "token not consumed: {other}"),
            }
            Err(e)
        }
    }
}
