// Registro de entregas: consulta de entregas previas y alta de nuevas

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::models::entregas;

pub const ESTADO_COMPLETADO: &str = "COMPLETADO";
pub const METODO_QR_SEGURO: &str = "QR_SEGURO";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub id: i32,
    pub delivered_at: DateTime<Utc>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DeliveryLedger: Send + Sync {
    /// Entrega COMPLETADO del empleado en el período, si existe.
    async fn completed_delivery(
        &self,
        employee_id: i32,
        period_id: i32,
    ) -> Result<Option<DeliveryRecord>, DbErr>;
}

#[derive(Debug, Clone)]
pub struct SeaOrmDeliveryLedger<C = DatabaseConnection> {
    conn: C,
}

impl<C> SeaOrmDeliveryLedger<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<C> DeliveryLedger for SeaOrmDeliveryLedger<C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn completed_delivery(
        &self,
        employee_id: i32,
        period_id: i32,
    ) -> Result<Option<DeliveryRecord>, DbErr> {
        find_completed_delivery(&self.conn, employee_id, period_id).await
    }
}

pub async fn find_completed_delivery<C>(
    conn: &C,
    employee_id: i32,
    period_id: i32,
) -> Result<Option<DeliveryRecord>, DbErr>
where
    C: ConnectionTrait,
{
    let entrega = entregas::Entity::find()
        .filter(entregas::Column::EmpleadoId.eq(employee_id))
        .filter(entregas::Column::PeriodoId.eq(period_id))
        .filter(entregas::Column::Estado.eq(ESTADO_COMPLETADO))
        .order_by_asc(entregas::Column::FechaHora)
        .one(conn)
        .await?;

    Ok(entrega.map(|e| DeliveryRecord {
        id: e.id,
        delivered_at: e.fecha_hora,
    }))
}

/// Datos de una entrega verificada por QR.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDelivery {
    pub employee_id: i32,
    pub user_id: Option<i32>,
    pub period_id: Option<i32>,
    pub token_id: i32,
    pub delivered_at: DateTime<Utc>,
    pub device_id: Option<String>,
    pub ip_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub scan_duration_secs: i32,
    pub box_type: String,
    pub notes: Option<String>,
}

pub async fn record_delivery<C>(conn: &C, delivery: NewDelivery) -> Result<entregas::Model, DbErr>
where
    C: ConnectionTrait,
{
    let entrega = entregas::ActiveModel {
        empleado_id: Set(delivery.employee_id),
        usuario_id: Set(delivery.user_id),
        periodo_id: Set(delivery.period_id),
        qr_token_id: Set(Some(delivery.token_id)),
        fecha_hora: Set(delivery.delivered_at),
        dispositivo_id: Set(delivery.device_id),
        ip_address: Set(delivery.ip_address),
        latitud: Set(delivery.latitude),
        longitud: Set(delivery.longitude),
        duracion_escaneo: Set(Some(delivery.scan_duration_secs)),
        tipo_caja: Set(delivery.box_type),
        metodo: Set(METODO_QR_SEGURO.to_string()),
        estado: Set(ESTADO_COMPLETADO.to_string()),
        observaciones: Set(delivery.notes),
        ..Default::default()
    };

    entrega.insert(conn).await
}
