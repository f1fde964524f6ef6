// ============================================================================
// MODELS - MÓDULO PRINCIPAL
// ============================================================================
//
// Descripción:
//   Punto de entrada de los modelos. Cada entidad corresponde a una tabla
//   PostgreSQL mapeada con SeaORM.
//
// Lista de módulos:
//   - health : Health check de la API
//   - dto : Requests tipados de la API QR
//   - empleados : Empleados (colaborador, solo lectura)
//   - qr_tokens : Tokens QR de un solo uso
//   - entregas : Entregas de cajas (una por empleado y período)
//
// ============================================================================

pub mod health;
pub mod dto;
pub mod empleados;
pub mod qr_tokens;
pub mod entregas;
