// Errores por capa. Los resultados de la validación (usado, expirado)
// no son errores: viajan como ValidationOutcome.

use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use thiserror::Error;

/// Errores de la capa de persistencia de tokens.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token not found")]
    NotFound,

    /// Secret duplicado al insertar, o token ya consumido al marcarlo.
    #[error("token conflict")]
    Conflict,

    #[error("token expired")]
    Expired,

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("duration must be between 1 and {max} minutes, got {ttl}")]
    InvalidTtl { ttl: i64, max: i64 },

    #[error("employee {0} not found")]
    EmployeeNotFound(i32),

    #[error("employee {0} is inactive")]
    EmployeeInactive(i32),

    #[error("could not generate a unique token after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("token store error: {0}")]
    Store(#[source] StoreError),

    #[error("employee lookup failed: {0}")]
    Directory(#[source] DbErr),
}

impl IssueError {
    /// Código estable para clientes y para el reporte de la generación masiva.
    pub fn code(&self) -> &'static str {
        match self {
            IssueError::InvalidTtl { .. } => "INVALID_TTL",
            IssueError::EmployeeNotFound(_) => "EMPLOYEE_NOT_FOUND",
            IssueError::EmployeeInactive(_) => "EMPLOYEE_INACTIVE",
            IssueError::Exhausted { .. } => "ISSUANCE_FAILED",
            IssueError::Store(_) | IssueError::Directory(_) => "STORAGE_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("token not found")]
    NotFound,

    #[error("token already consumed")]
    AlreadyConsumed,

    #[error("token expired")]
    Expired,

    #[error("token store error: {0}")]
    Store(#[source] DbErr),
}

impl From<StoreError> for ConsumeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ConsumeError::NotFound,
            StoreError::Conflict => ConsumeError::AlreadyConsumed,
            StoreError::Expired => ConsumeError::Expired,
            StoreError::Database(e) => ConsumeError::Store(e),
        }
    }
}

/// Fallas de infraestructura en operaciones de solo lectura o de limpieza.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("token store error: {0}")]
    Store(#[from] StoreError),

    #[error("employee lookup failed: {0}")]
    Directory(#[source] DbErr),

    #[error("delivery lookup failed: {0}")]
    Ledger(#[source] DbErr),
}

#[derive(Debug, Error)]
pub enum BulkIssueError {
    #[error("duration must be between 1 and {max} minutes, got {ttl}")]
    InvalidTtl { ttl: i64, max: i64 },

    #[error("no active employees matched the request")]
    NoCandidates,

    #[error("employee lookup failed: {0}")]
    Directory(#[source] DbErr),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Consume(#[from] ConsumeError),

    #[error("employee already received the benefit on {delivered_at}")]
    AlreadyDelivered { delivered_at: DateTime<Utc> },

    #[error("employee {0} not found")]
    EmployeeNotFound(i32),

    #[error("employee {0} is inactive")]
    EmployeeInactive(i32),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl From<StoreError> for DeliveryError {
    fn from(err: StoreError) -> Self {
        DeliveryError::Consume(err.into())
    }
}
