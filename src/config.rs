// Configuración del servidor, leída una vez desde el entorno (.env)

use std::env;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in .env file")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// Parámetros del ciclo de vida de los tokens QR.
#[derive(Debug, Clone)]
pub struct QrConfig {
    /// Prefijo fijo del string QR (`PREFIJO:secret:empleado_id`).
    pub prefix: String,
    pub default_ttl_minutes: i64,
    pub max_ttl_minutes: i64,
    /// Intentos de inserción ante colisión del secret.
    pub max_issue_attempts: u32,
    /// Emisiones simultáneas en la generación masiva.
    pub bulk_concurrency: usize,
    /// 0 desactiva la limpieza periódica.
    pub sweep_interval_secs: u64,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            prefix: "CLIPCONTROL".into(),
            default_ttl_minutes: 60,
            max_ttl_minutes: 1440,
            max_issue_attempts: 5,
            bulk_concurrency: 8,
            sweep_interval_secs: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
    pub qr: QrConfig,
}

impl AppConfig {
    /// Lee la configuración desde las variables de entorno.
    /// Llamar después de `dotenv::dotenv()`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let defaults = QrConfig::default();

        let qr = QrConfig {
            prefix: lookup("QR_PREFIX").unwrap_or(defaults.prefix),
            default_ttl_minutes: parse_or(&lookup, "QR_DEFAULT_TTL_MINUTES", defaults.default_ttl_minutes)?,
            max_ttl_minutes: parse_or(&lookup, "QR_MAX_TTL_MINUTES", defaults.max_ttl_minutes)?,
            max_issue_attempts: parse_or(&lookup, "QR_MAX_ISSUE_ATTEMPTS", defaults.max_issue_attempts)?,
            bulk_concurrency: parse_or(&lookup, "QR_BULK_CONCURRENCY", defaults.bulk_concurrency)?,
            sweep_interval_secs: parse_or(&lookup, "QR_SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)?,
        };

        // El prefijo no puede contener ':' o el formato deja de ser separable
        if qr.prefix.is_empty() || qr.prefix.contains(':') {
            return Err(ConfigError::Invalid { key: "QR_PREFIX", value: qr.prefix });
        }
        if qr.default_ttl_minutes <= 0 || qr.default_ttl_minutes > qr.max_ttl_minutes {
            return Err(ConfigError::Invalid {
                key: "QR_DEFAULT_TTL_MINUTES",
                value: qr.default_ttl_minutes.to_string(),
            });
        }
        if qr.max_issue_attempts == 0 {
            return Err(ConfigError::Invalid { key: "QR_MAX_ISSUE_ATTEMPTS", value: "0".into() });
        }
        if qr.bulk_concurrency == 0 {
            return Err(ConfigError::Invalid { key: "QR_BULK_CONCURRENCY", value: "0".into() });
        }

        Ok(Self {
            database_url,
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Compact)?,
            qr,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
