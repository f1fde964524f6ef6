// Limpieza periódica de tokens expirados sin usar

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::services::delivery_ledger::DeliveryLedger;
use crate::services::employee_directory::EmployeeDirectory;
use crate::services::token_lifecycle::TokenLifecycle;
use crate::services::token_store::TokenStore;

/// Lanza la tarea de limpieza. Una falla se registra y se reintenta en el
/// siguiente ciclo.
pub fn spawn_sweeper<S, E, D>(lifecycle: Arc<TokenLifecycle<S, E, D>>, every: Duration) -> JoinHandle<()>
where
    S: TokenStore + 'static,
    E: EmployeeDirectory + 'static,
    D: DeliveryLedger + 'static,
{
    info!(interval_secs = every.as_secs(), "expired token sweeper started");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // El primer tick es inmediato
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = lifecycle.sweep_expired(lifecycle.now()).await {
                error!("expired token sweep failed: {e}");
            }
        }
    })
}
