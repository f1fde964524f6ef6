// Requests de la API QR (validados en el borde antes de llegar a los servicios)
use serde::Deserialize;
use validator::Validate;

// Query de POST /api/qr/generar/{empleado_id}
#[derive(Debug, Deserialize)]
pub struct GenerarQrQuery {
    pub duracion_minutos: Option<i64>,
}

// Body de POST /api/qr/validar
#[derive(Debug, Deserialize, Validate)]
pub struct ValidarQrRequest {
    /// Secret solo, o el string completo leído del QR (PREFIJO:secret:empleado_id)
    #[validate(length(min = 1, max = 512))]
    pub token: String,
    #[validate(range(min = 1))]
    pub periodo_id: Option<i32>,
}

// Body de POST /api/qr/consumir/{token_id}
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ConsumirQrRequest {
    #[validate(length(max = 64))]
    pub ip_address: Option<String>,
    #[validate(length(max = 128))]
    pub dispositivo_id: Option<String>,
}

// Query de POST /api/qr/generar-masivo
#[derive(Debug, Deserialize)]
pub struct GenerarMasivoQuery {
    pub sucursal_id: Option<i32>,
    pub tipo_contrato: Option<String>,
    pub duracion_minutos: Option<i64>,
}

// Body de POST /api/qr/generar-masivo
#[derive(Debug, Default, Deserialize)]
pub struct GenerarMasivoRequest {
    pub empleados_ids: Option<Vec<i32>>,
}

// Body de POST /api/entregas/registrar-seguro
#[derive(Debug, Deserialize, Validate)]
pub struct RegistrarEntregaRequest {
    #[validate(range(min = 1))]
    pub qr_token_id: i32,
    pub usuario_id: Option<i32>,
    #[validate(range(min = 1))]
    pub periodo_id: Option<i32>,
    #[validate(length(max = 128))]
    pub dispositivo_id: Option<String>,
    #[validate(length(max = 64))]
    pub ip_address: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitud: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitud: Option<f64>,
    #[validate(length(max = 1000))]
    pub observaciones: Option<String>,
}
