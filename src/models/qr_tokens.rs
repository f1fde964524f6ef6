// ============================================================================
// MODELO : QR TOKENS
// ============================================================================
//
// Descripción:
//   Tabla qr_tokens. Una fila por token QR de un solo uso emitido para un
//   empleado.
//
// Columnas de la tabla qr_tokens:
//   - id (INTEGER, PRIMARY KEY, SERIAL)
//   - empleado_id (INTEGER, NOT NULL, FK hacia empleados)
//   - token (VARCHAR, UNIQUE, NOT NULL) - 32 bytes aleatorios, base64 URL-safe
//   - hash_seguridad (VARCHAR, NOT NULL) - sha256(token:empleado_id:fecha)
//   - fecha_generacion (TIMESTAMPTZ, NOT NULL)
//   - fecha_expiracion (TIMESTAMPTZ, NOT NULL)
//   - usado (BOOLEAN, DEFAULT FALSE, NOT NULL)
//   - fecha_uso (TIMESTAMPTZ, NULL)
//   - ip_uso (VARCHAR, NULL)
//   - dispositivo_uso (VARCHAR, NULL)
//
// Puntos de atención:
//   - usado solo pasa de false a true, nunca al revés
//   - fecha_uso, ip_uso y dispositivo_uso se escriben una sola vez, al consumir
//   - la limpieza solo borra filas con usado = false y ya expiradas
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "qr_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub empleado_id: i32,

    #[sea_orm(unique)]
    #[serde(skip_serializing)]
    pub token: String,

    pub hash_seguridad: String,

    pub fecha_generacion: DateTimeUtc,

    pub fecha_expiracion: DateTimeUtc,

    pub usado: bool,

    pub fecha_uso: Option<DateTimeUtc>,

    pub ip_uso: Option<String>,

    pub dispositivo_uso: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::empleados::Entity",
        from = "Column::EmpleadoId",
        to = "super::empleados::Column::Id"
    )]
    Empleado,

    #[sea_orm(has_many = "super::entregas::Entity")]
    Entregas,
}

impl Related<super::empleados::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Empleado.def()
    }
}

impl Related<super::entregas::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entregas.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
