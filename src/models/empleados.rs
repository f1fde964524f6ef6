use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "empleados")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub rut: String,
    pub nombre: String,
    pub apellido: String,
    pub tipo_contrato: String, // 'PLANTA', 'PLAZO_FIJO', ...
    pub sucursal_id: Option<i32>,
    pub activo: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::qr_tokens::Entity")]
    QrTokens,

    #[sea_orm(has_many = "super::entregas::Entity")]
    Entregas,
}

impl Related<super::qr_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QrTokens.def()
    }
}

impl Related<super::entregas::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entregas.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
