use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Bytes aleatorios del secret (256 bits de entropía)
const SECRET_BYTES: usize = 32;

/// Caracteres del hash que se muestran para verificación visual
pub const DISPLAY_HASH_LEN: usize = 16;

/// Genera un secret aleatorio en base64 URL-safe sin padding (43 caracteres).
/// El alfabeto no incluye ':' así que el string QR siempre se puede separar.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash de integridad: sha256("secret:empleado_id:fecha_generacion") en hex.
/// Solo se usa para auditoría y verificación visual, nunca se valida.
pub fn integrity_hash(secret: &str, employee_id: i32, issued_at: DateTime<Utc>) -> String {
    let data = format!(
        "{}:{}:{}",
        secret,
        employee_id,
        issued_at.to_rfc3339_opts(SecondsFormat::Micros, true)
    );
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// Primeros caracteres del hash para mostrar junto al QR
pub fn display_hash(hash: &str) -> &str {
    hash.get(..DISPLAY_HASH_LEN).unwrap_or(hash)
}

fn is_url_safe(secret: &str) -> bool {
    !secret.is_empty()
        && secret
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QrPayloadError {
    #[error("QR does not belong to this system")]
    WrongPrefix,

    #[error("malformed QR payload")]
    Malformed,

    #[error("invalid employee id in QR payload")]
    InvalidEmployeeId,
}

/// Contenido del QR: `PREFIJO:secret:empleado_id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrPayload {
    pub prefix: String,
    pub secret: String,
    pub employee_id: i32,
}

impl QrPayload {
    pub fn new(prefix: &str, secret: &str, employee_id: i32) -> Self {
        Self {
            prefix: prefix.to_string(),
            secret: secret.to_string(),
            employee_id,
        }
    }

    /// Parsea el string leído por el escáner. Exige exactamente tres campos.
    pub fn parse(prefix: &str, raw: &str) -> Result<Self, QrPayloadError> {
        let parts: Vec<&str> = raw.trim().split(':').collect();
        let [found_prefix, secret, employee_id] = parts.as_slice() else {
            return Err(QrPayloadError::Malformed);
        };

        if *found_prefix != prefix {
            return Err(QrPayloadError::WrongPrefix);
        }
        if !is_url_safe(secret) {
            return Err(QrPayloadError::Malformed);
        }

        let employee_id = employee_id
            .parse::<i32>()
            .map_err(|_| QrPayloadError::InvalidEmployeeId)?;

        Ok(Self::new(prefix, secret, employee_id))
    }
}

impl fmt::Display for QrPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.prefix, self.secret, self.employee_id)
    }
}

/// Acepta el secret solo o el string QR completo y devuelve el secret.
pub fn extract_secret(prefix: &str, raw: &str) -> Result<String, QrPayloadError> {
    let raw = raw.trim();
    if raw.contains(':') {
        return QrPayload::parse(prefix, raw).map(|payload| payload.secret);
    }
    if is_url_safe(raw) {
        Ok(raw.to_string())
    } else {
        Err(QrPayloadError::Malformed)
    }
}
