use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "entregas")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub empleado_id: i32,
    pub usuario_id: Option<i32>,          // Guardia que registró la entrega
    pub periodo_id: Option<i32>,
    pub qr_token_id: Option<i32>,         // NULL para entregas manuales
    pub fecha_hora: DateTimeUtc,
    pub dispositivo_id: Option<String>,
    pub ip_address: Option<String>,
    pub latitud: Option<f64>,
    pub longitud: Option<f64>,
    pub duracion_escaneo: Option<i32>,    // Segundos entre generación del QR y entrega
    pub tipo_caja: String,                // 'PLANTA' o 'PLAZO_FIJO'
    pub metodo: String,                   // 'QR_SEGURO', 'MANUAL', ...
    pub estado: String,                   // 'COMPLETADO', ...
    pub observaciones: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::empleados::Entity",
        from = "Column::EmpleadoId",
        to = "super::empleados::Column::Id"
    )]
    Empleado,

    #[sea_orm(
        belongs_to = "super::qr_tokens::Entity",
        from = "Column::QrTokenId",
        to = "super::qr_tokens::Column::Id"
    )]
    QrToken,
}

impl Related<super::empleados::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Empleado.def()
    }
}

impl Related<super::qr_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QrToken.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
