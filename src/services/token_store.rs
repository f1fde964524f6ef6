// ============================================================================
// SERVICIO : PERSISTENCIA DE TOKENS QR
// ============================================================================
//
// Descripción:
//   Sin reglas de negocio: cada llamada toca una sola fila, salvo la limpieza
//   y las estadísticas.
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set, SqlErr,
};
use serde::Serialize;

use crate::error::StoreError;
use crate::models::qr_tokens;

/// Metadata de auditoría capturada al consumir un token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsumptionContext {
    pub ip_address: Option<String>,
    pub device_id: Option<String>,
}

/// Token listo para insertar; el id lo asigna el store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewToken {
    pub employee_id: i32,
    pub secret: String,
    pub integrity_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenState {
    Issued,
    Expired,
    Consumed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: i32,
    pub employee_id: i32,
    pub secret: String,
    pub integrity_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    pub consumed_at: Option<DateTime<Utc>>,
    pub context: ConsumptionContext,
}

impl Token {
    /// Estado lógico del token en el instante `now`.
    /// CONSUMED y EXPIRED son terminales.
    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        if self.consumed {
            TokenState::Consumed
        } else if now >= self.expires_at {
            TokenState::Expired
        } else {
            TokenState::Issued
        }
    }
}

impl From<qr_tokens::Model> for Token {
    fn from(model: qr_tokens::Model) -> Self {
        Self {
            id: model.id,
            employee_id: model.empleado_id,
            secret: model.token,
            integrity_hash: model.hash_seguridad,
            issued_at: model.fecha_generacion,
            expires_at: model.fecha_expiracion,
            consumed: model.usado,
            consumed_at: model.fecha_uso,
            context: ConsumptionContext {
                ip_address: model.ip_uso,
                device_id: model.dispositivo_uso,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenStats {
    pub total: u64,
    pub active: u64,
    pub consumed: u64,
    pub expired: u64,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Falla con `Conflict` si el secret ya existe.
    async fn insert(&self, token: NewToken) -> Result<Token, StoreError>;

    async fn find_by_secret(&self, secret: &str) -> Result<Option<Token>, StoreError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Token>, StoreError>;

    /// Escritura condicional única: solo marca el token si sigue sin usar y
    /// no expiró a `consumed_at`. Falla con `NotFound`, `Conflict` (ya usado)
    /// o `Expired`.
    async fn mark_consumed(
        &self,
        id: i32,
        consumed_at: DateTime<Utc>,
        context: ConsumptionContext,
    ) -> Result<Token, StoreError>;

    /// Borra los tokens sin usar con `expires_at < as_of`. Devuelve cuántos.
    async fn delete_expired_unconsumed(&self, as_of: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn stats(&self, as_of: DateTime<Utc>) -> Result<TokenStats, StoreError>;
}

/// Implementación sobre SeaORM. `C` puede ser la conexión del pool o una
/// transacción abierta.
#[derive(Debug, Clone)]
pub struct SeaOrmTokenStore<C = DatabaseConnection> {
    conn: C,
}

impl<C> SeaOrmTokenStore<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn into_inner(self) -> C {
        self.conn
    }
}

#[async_trait]
impl<C> TokenStore for SeaOrmTokenStore<C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn insert(&self, token: NewToken) -> Result<Token, StoreError> {
        let new_token = qr_tokens::ActiveModel {
            empleado_id: Set(token.employee_id),
            token: Set(token.secret),
            hash_seguridad: Set(token.integrity_hash),
            fecha_generacion: Set(token.issued_at),
            fecha_expiracion: Set(token.expires_at),
            usado: Set(false),
            fecha_uso: Set(None),
            ip_uso: Set(None),
            dispositivo_uso: Set(None),
            ..Default::default()
        };

        match new_token.insert(&self.conn).await {
            Ok(model) => Ok(model.into()),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(StoreError::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_secret(&self, secret: &str) -> Result<Option<Token>, StoreError> {
        let model = qr_tokens::Entity::find()
            .filter(qr_tokens::Column::Token.eq(secret))
            .one(&self.conn)
            .await?;

        Ok(model.map(Token::from))
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Token>, StoreError> {
        let model = qr_tokens::Entity::find_by_id(id).one(&self.conn).await?;
        Ok(model.map(Token::from))
    }

    async fn mark_consumed(
        &self,
        id: i32,
        consumed_at: DateTime<Utc>,
        context: ConsumptionContext,
    ) -> Result<Token, StoreError> {
        // UPDATE ... WHERE id = ? AND usado = false AND fecha_expiracion > ?
        let result = qr_tokens::Entity::update_many()
            .set(qr_tokens::ActiveModel {
                usado: Set(true),
                fecha_uso: Set(Some(consumed_at)),
                ip_uso: Set(context.ip_address),
                dispositivo_uso: Set(context.device_id),
                ..Default::default()
            })
            .filter(qr_tokens::Column::Id.eq(id))
            .filter(qr_tokens::Column::Usado.eq(false))
            .filter(qr_tokens::Column::FechaExpiracion.gt(consumed_at))
            .exec(&self.conn)
            .await?;

        let current = self.find_by_id(id).await?.ok_or(StoreError::NotFound)?;

        if result.rows_affected == 1 {
            return Ok(current);
        }

        // Ninguna fila actualizada: averiguar por qué
        if current.consumed {
            Err(StoreError::Conflict)
        } else {
            Err(StoreError::Expired)
        }
    }

    async fn delete_expired_unconsumed(&self, as_of: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = qr_tokens::Entity::delete_many()
            .filter(qr_tokens::Column::Usado.eq(false))
            .filter(qr_tokens::Column::FechaExpiracion.lt(as_of))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected)
    }

    async fn stats(&self, as_of: DateTime<Utc>) -> Result<TokenStats, StoreError> {
        let total = qr_tokens::Entity::find().count(&self.conn).await?;

        let consumed = qr_tokens::Entity::find()
            .filter(qr_tokens::Column::Usado.eq(true))
            .count(&self.conn)
            .await?;

        let active = qr_tokens::Entity::find()
            .filter(qr_tokens::Column::Usado.eq(false))
            .filter(qr_tokens::Column::FechaExpiracion.gt(as_of))
            .count(&self.conn)
            .await?;

        let expired = qr_tokens::Entity::find()
            .filter(qr_tokens::Column::Usado.eq(false))
            .filter(qr_tokens::Column::FechaExpiracion.lte(as_of))
            .count(&self.conn)
            .await?;

        Ok(TokenStats {
            total,
            active,
            consumed,
            expired,
        })
    }
}
