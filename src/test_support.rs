// Fixtures de test: SQLite con el esquema de las entidades SeaORM,
// y un TokenStore en memoria

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema, Set,
};

use crate::error::StoreError;
use crate::models::{empleados, entregas, qr_tokens};
use crate::services::token_store::{ConsumptionContext, NewToken, Token, TokenStats, TokenStore};

pub async fn sqlite_db() -> DatabaseConnection {
    // Una sola conexión: cada conexión a :memory: es una base distinta
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    connect_with_schema(options).await
}

/// Base SQLite en un archivo, con varias conexiones reales en el pool.
pub async fn sqlite_file_db(path: &Path, max_connections: u32) -> DatabaseConnection {
    let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
    options
        .max_connections(max_connections)
        .sqlx_logging(false);

    connect_with_schema(options).await
}

async fn connect_with_schema(options: ConnectOptions) -> DatabaseConnection {
    let db = Database::connect(options).await.unwrap();
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    db.execute(backend.build(&schema.create_table_from_entity(empleados::Entity)))
        .await
        .unwrap();
    db.execute(backend.build(&schema.create_table_from_entity(qr_tokens::Entity)))
        .await
        .unwrap();
    db.execute(backend.build(&schema.create_table_from_entity(entregas::Entity)))
        .await
        .unwrap();

    db
}

pub async fn insert_employee(db: &DatabaseConnection, id: i32, activo: bool, tipo_contrato: &str) {
    insert_employee_at(db, id, activo, tipo_contrato, Some(1)).await;
}

pub async fn insert_employee_at(
    db: &DatabaseConnection,
    id: i32,
    activo: bool,
    tipo_contrato: &str,
    sucursal_id: Option<i32>,
) {
    empleados::ActiveModel {
        id: Set(id),
        rut: Set(format!("{id}-K")),
        nombre: Set(format!("Nombre{id}")),
        apellido: Set(format!("Apellido{id}")),
        tipo_contrato: Set(tipo_contrato.to_string()),
        sucursal_id: Set(sucursal_id),
        activo: Set(activo),
    }
    .insert(db)
    .await
    .unwrap();
}

pub async fn insert_delivery(
    db: &DatabaseConnection,
    employee_id: i32,
    period_id: i32,
    estado: &str,
    at: DateTime<Utc>,
) -> entregas::Model {
    entregas::ActiveModel {
        empleado_id: Set(employee_id),
        usuario_id: Set(None),
        periodo_id: Set(Some(period_id)),
        qr_token_id: Set(None),
        fecha_hora: Set(at),
        dispositivo_id: Set(None),
        ip_address: Set(None),
        latitud: Set(None),
        longitud: Set(None),
        duracion_escaneo: Set(None),
        tipo_caja: Set("PLANTA".to_string()),
        metodo: Set("MANUAL".to_string()),
        estado: Set(estado.to_string()),
        observaciones: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Store en memoria con las mismas garantías que la tabla: secret único y
/// consumo condicional bajo un solo lock.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i32,
    tokens: Vec<Token>,
}

impl MemoryTokenStore {
    pub fn snapshot(&self) -> Vec<Token> {
        self.inner.lock().unwrap().tokens.clone()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert(&self, token: NewToken) -> Result<Token, StoreError> {
        let mut state = self.inner.lock().unwrap();
        if state.tokens.iter().any(|t| t.secret == token.secret) {
            return Err(StoreError::Conflict);
        }

        state.next_id += 1;
        let stored = Token {
            id: state.next_id,
            employee_id: token.employee_id,
            secret: token.secret,
            integrity_hash: token.integrity_hash,
            issued_at: token.issued_at,
            expires_at: token.expires_at,
            consumed: false,
            consumed_at: None,
            context: ConsumptionContext::default(),
        };
        state.tokens.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_secret(&self, secret: &str) -> Result<Option<Token>, StoreError> {
        let state = self.inner.lock().unwrap();
        Ok(state.tokens.iter().find(|t| t.secret == secret).cloned())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Token>, StoreError> {
        let state = self.inner.lock().unwrap();
        Ok(state.tokens.iter().find(|t| t.id == id).cloned())
    }

    async fn mark_consumed(
        &self,
        id: i32,
        consumed_at: DateTime<Utc>,
        context: ConsumptionContext,
    ) -> Result<Token, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let token = state
            .tokens
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound)?;

        if token.consumed {
            return Err(StoreError::Conflict);
        }
        if token.expires_at <= consumed_at {
            return Err(StoreError::Expired);
        }

        token.consumed = true;
        token.consumed_at = Some(consumed_at);
        token.context = context;
        Ok(token.clone())
    }

    async fn delete_expired_unconsumed(&self, as_of: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let before = state.tokens.len();
        state
            .tokens
            .retain(|t| t.consumed || t.expires_at >= as_of);
        Ok((before - state.tokens.len()) as u64)
    }

    async fn stats(&self, as_of: DateTime<Utc>) -> Result<TokenStats, StoreError> {
        let state = self.inner.lock().unwrap();
        let mut stats = TokenStats {
            total: state.tokens.len() as u64,
            ..Default::default()
        };
        for token in &state.tokens {
            if token.consumed {
                stats.consumed += 1;
            } else if token.expires_at > as_of {
                stats.active += 1;
            } else {
                stats.expired += 1;
            }
        }
        Ok(stats)
    }
}
