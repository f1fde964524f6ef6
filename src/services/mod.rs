pub mod token_store;
pub mod employee_directory;
pub mod delivery_ledger;
pub mod token_lifecycle;
pub mod bulk_issuer;
pub mod delivery_service;
pub mod sweeper;

use token_lifecycle::TokenLifecycle;
use token_store::SeaOrmTokenStore;
use employee_directory::SeaOrmEmployeeDirectory;
use delivery_ledger::SeaOrmDeliveryLedger;

/// Ciclo de vida sobre PostgreSQL, compartido por todos los workers.
pub type QrLifecycle = TokenLifecycle<SeaOrmTokenStore, SeaOrmEmployeeDirectory, SeaOrmDeliveryLedger>;
