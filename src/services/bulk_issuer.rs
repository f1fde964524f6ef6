// ============================================================================
// SERVICIO : GENERACIÓN MASIVA DE QR
// ============================================================================
//
// Descripción:
//   Cada empleado se emite de forma independiente: una falla no detiene ni
//   revierte a los demás.
// ============================================================================

use std::collections::BTreeSet;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::BulkIssueError;
use crate::services::delivery_ledger::DeliveryLedger;
use crate::services::employee_directory::{EmployeeDirectory, EmployeeFilter};
use crate::services::token_lifecycle::{TokenLifecycle, TokenPayload};
use crate::services::token_store::TokenStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkTarget {
    /// Ids explícitos (ya deduplicados)
    Employees(BTreeSet<i32>),
    /// Todos los empleados activos que cumplen el filtro
    Filter(EmployeeFilter),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    pub empleado_id: i32,
    pub codigo: &'static str,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct BulkIssueReport {
    pub total: usize,
    pub issued: Vec<TokenPayload>,
    pub failed: Vec<BulkFailure>,
}

pub struct BulkIssuer<'a, S, E, D> {
    lifecycle: &'a TokenLifecycle<S, E, D>,
}

impl<'a, S, E, D> BulkIssuer<'a, S, E, D>
where
    S: TokenStore,
    E: EmployeeDirectory,
    D: DeliveryLedger,
{
    pub fn new(lifecycle: &'a TokenLifecycle<S, E, D>) -> Self {
        Self { lifecycle }
    }

    pub async fn issue_for(
        &self,
        target: BulkTarget,
        ttl_minutes: i64,
    ) -> Result<BulkIssueReport, BulkIssueError> {
        if !self.lifecycle.ttl_in_range(ttl_minutes) {
            return Err(BulkIssueError::InvalidTtl {
                ttl: ttl_minutes,
                max: self.lifecycle.config().max_ttl_minutes,
            });
        }

        let candidates: Vec<i32> = match target {
            BulkTarget::Employees(ids) => ids.into_iter().collect(),
            BulkTarget::Filter(filter) => self
                .lifecycle
                .employees()
                .find_active(filter)
                .await
                .map_err(BulkIssueError::Directory)?
                .into_iter()
                .map(|employee| employee.id)
                .collect(),
        };

        if candidates.is_empty() {
            return Err(BulkIssueError::NoCandidates);
        }

        let total = candidates.len();
        let concurrency = self.lifecycle.config().bulk_concurrency;

        let results: Vec<_> = stream::iter(candidates)
            .map(|employee_id| async move {
                (employee_id, self.lifecycle.issue(employee_id, ttl_minutes).await)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut report = BulkIssueReport {
            total,
            ..Default::default()
        };
        for (employee_id, result) in results {
            match result {
                Ok(payload) => report.issued.push(payload),
                Err(e) => {
                    warn!(employee_id, "bulk issuance skipped employee: {e}");
                    report.failed.push(BulkFailure {
                        empleado_id: employee_id,
                        codigo: e.code(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report.issued.sort_by_key(|payload| payload.employee_id);
        report.failed.sort_by_key(|failure| failure.empleado_id);

        info!(
            total,
            issued = report.issued.len(),
            failed = report.failed.len(),
            "bulk issuance finished"
        );
        Ok(report)
    }
}
