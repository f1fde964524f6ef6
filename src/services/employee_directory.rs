// Acceso a la tabla de empleados: lecturas y bloqueo de fila para entregas

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Select,
};
use serde::Serialize;

use crate::models::empleados;

pub const CONTRATO_PLANTA: &str = "PLANTA";
pub const CAJA_PLAZO_FIJO: &str = "PLAZO_FIJO";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Employee {
    pub id: i32,
    pub rut: String,
    pub nombre: String,
    pub apellido: String,
    pub tipo_contrato: String,
    pub sucursal_id: Option<i32>,
    pub activo: bool,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.nombre, self.apellido)
    }

    /// Tipo de caja que le corresponde: PLANTA recibe caja de planta,
    /// cualquier otro contrato recibe caja de plazo fijo.
    pub fn box_type(&self) -> &'static str {
        if self.tipo_contrato == CONTRATO_PLANTA {
            CONTRATO_PLANTA
        } else {
            CAJA_PLAZO_FIJO
        }
    }
}

impl From<empleados::Model> for Employee {
    fn from(model: empleados::Model) -> Self {
        Self {
            id: model.id,
            rut: model.rut,
            nombre: model.nombre,
            apellido: model.apellido,
            tipo_contrato: model.tipo_contrato,
            sucursal_id: model.sucursal_id,
            activo: model.activo,
        }
    }
}

/// Filtro de la generación masiva. Campos vacíos no filtran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmployeeFilter {
    pub sucursal_id: Option<i32>,
    pub tipo_contrato: Option<String>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn get_employee(&self, id: i32) -> Result<Option<Employee>, DbErr>;

    /// Empleados activos que cumplen el filtro, ordenados por id.
    async fn find_active(&self, filter: EmployeeFilter) -> Result<Vec<Employee>, DbErr>;
}

#[derive(Debug, Clone)]
pub struct SeaOrmEmployeeDirectory<C = DatabaseConnection> {
    conn: C,
}

impl<C> SeaOrmEmployeeDirectory<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<C> EmployeeDirectory for SeaOrmEmployeeDirectory<C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn get_employee(&self, id: i32) -> Result<Option<Employee>, DbErr> {
        find_employee(&self.conn, id).await
    }

    async fn find_active(&self, filter: EmployeeFilter) -> Result<Vec<Employee>, DbErr> {
        let mut query = empleados::Entity::find().filter(empleados::Column::Activo.eq(true));

        if let Some(sucursal_id) = filter.sucursal_id {
            query = query.filter(empleados::Column::SucursalId.eq(sucursal_id));
        }

        if let Some(tipo_contrato) = filter.tipo_contrato {
            query = query.filter(empleados::Column::TipoContrato.eq(tipo_contrato.trim().to_uppercase()));
        }

        let found = query
            .order_by_asc(empleados::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(found.into_iter().map(Employee::from).collect())
    }
}

/// Busca un empleado sobre cualquier conexión (también dentro de una transacción).
pub async fn find_employee<C>(conn: &C, id: i32) -> Result<Option<Employee>, DbErr>
where
    C: ConnectionTrait,
{
    let model = empleados::Entity::find_by_id(id).one(conn).await?;
    Ok(model.map(Employee::from))
}

fn locked_employee_query(id: i32) -> Select<empleados::Entity> {
    empleados::Entity::find_by_id(id).lock_exclusive()
}

/// Lee el empleado con `SELECT ... FOR UPDATE`. Dentro de una transacción,
/// la fila queda bloqueada hasta el commit o el rollback: dos registros de
/// entrega del mismo empleado se ejecutan uno después del otro.
pub async fn lock_employee<C>(conn: &C, id: i32) -> Result<Option<Employee>, DbErr>
where
    C: ConnectionTrait,
{
    let model = locked_employee_query(id).one(conn).await?;
    Ok(model.map(Employee::from))
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use sea_orm::{DbBackend, QueryTrait};

    use super::*;
    use crate::test_support;

    #[test]
    fn test_employee_lock_is_a_row_lock_on_postgres() {
        let sql = locked_employee_query(7).build(DbBackend::Postgres).to_string();

        assert!(sql.contains(r#"FROM "empleados""#), "{sql}");
        assert!(sql.ends_with("FOR UPDATE"), "{sql}");
    }

    #[tokio::test]
    async fn test_lock_employee_reads_the_row() -> TestResult {
        let db = test_support::sqlite_db().await;
        test_support::insert_employee(&db, 7, true, "PLANTA").await;

        let employee = lock_employee(&db, 7).await?;
        assert_eq!(employee.map(|e| e.id), Some(7));
        assert_eq!(lock_employee(&db, 8).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_find_active_applies_filters() -> TestResult {
        let db = test_support::sqlite_db().await;
        test_support::insert_employee_at(&db, 1, true, "PLANTA", Some(10)).await;
        test_support::insert_employee_at(&db, 2, false, "PLANTA", Some(10)).await;
        test_support::insert_employee_at(&db, 3, true, "PLAZO_FIJO", Some(10)).await;
        test_support::insert_employee_at(&db, 4, true, "PLANTA", Some(20)).await;
        let directory = SeaOrmEmployeeDirectory::new(db);

        let all: Vec<i32> = directory
            .find_active(EmployeeFilter::default())
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(all, vec![1, 3, 4]);

        let planta_10: Vec<i32> = directory
            .find_active(EmployeeFilter {
                sucursal_id: Some(10),
                tipo_contrato: Some("planta".into()),
            })
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(planta_10, vec![1]);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_employee() -> TestResult {
        let db = test_support::sqlite_db().await;
        test_support::insert_employee(&db, 7, false, "PLAZO_FIJO").await;
        let directory = SeaOrmEmployeeDirectory::new(db);

        let employee = directory.get_employee(7).await?.unwrap();
        assert!(!employee.activo);
        assert_eq!(employee.box_type(), CAJA_PLAZO_FIJO);
        assert_eq!(directory.get_employee(8).await?, None);
        Ok(())
    }
}
