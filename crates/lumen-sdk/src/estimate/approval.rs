//! Estimate approval with its follow-up writes
//!
//! Approving can touch three records: the estimate, its project and a new
//! invoice. The steps run in that order under one idempotency key. A failure
//! part-way undoes the writes already made, newest first.

use super::model::{Estimate, StatusRequest};
use crate::board::{write_project_status, PROJECTS_TABLE};
use crate::derive::{money_string, round_money};
use crate::error::{Result, SdkError};
use crate::gateway::{echoed, DataGateway};
use crate::notify::{self, Notice, Notifier};
use crate::status::{from_durable, BoardColumn, EstimateStatus};
use lumen_gateway::RowQuery;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub(crate) const UPDATE_ESTIMATE_STATUS: &str = "update_estimate_status";
pub(crate) const CREATE_PROJECT_FROM_ESTIMATE: &str = "create_project_from_estimate";
pub(crate) const CREATE_INVOICE_FROM_ESTIMATE: &str = "create_invoice_from_estimate";

/// Key under which an estimate's approval runs at most once
pub fn idempotency_key(estimate_id: Uuid) -> String {
    format!("approve:{}", estimate_id)
}

/// Write an estimate status and return the status the store reports.
/// A missing or unknown echo comes back as `None`.
pub(crate) async fn write_estimate_status(
    gateway: &dyn DataGateway,
    estimate_id: Uuid,
    status: EstimateStatus,
) -> Result<Option<EstimateStatus>> {
    let result = gateway
        .rpc(
            UPDATE_ESTIMATE_STATUS,
            json!({"p_estimate_id": estimate_id, "p_status": status.as_str()}),
        )
        .await?;
    Ok(echoed(&result, "status")
        .and_then(Value::as_str)
        .and_then(EstimateStatus::parse))
}

fn echoed_uuid(result: &Value, fields: &[&str]) -> Option<Uuid> {
    fields
        .iter()
        .filter_map(|field| echoed(result, field))
        .filter_map(Value::as_str)
        .find_map(|raw| Uuid::parse_str(raw).ok())
}

/// What a completed approval did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalReport {
    pub key: String,
    pub estimate_id: Uuid,
    /// Amount invoiced (or that would have been)
    pub amount: Decimal,
    pub project_id: Option<Uuid>,
    pub project_created: bool,
    pub invoice_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Completed(ApprovalReport),
    /// This key already completed; nothing was sent
    AlreadyCompleted(ApprovalReport),
    /// The same approval is running right now; nothing was sent
    InProgress,
}

#[derive(Debug, Clone, Copy)]
enum Undo {
    RestoreEstimate { id: Uuid, status: EstimateStatus },
    RestoreProject { id: Uuid, column: BoardColumn },
    DeleteProject { id: Uuid },
}

/// Removes the running key when the run ends, even if the future is dropped
struct RunningGuard<'a> {
    running: &'a Mutex<HashSet<String>>,
    key: String,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock() {
            running.remove(&self.key);
        }
    }
}

pub struct ApprovalWorkflow {
    gateway: Arc<dyn DataGateway>,
    notifier: Arc<dyn Notifier>,
    completed: Mutex<HashMap<String, ApprovalReport>>,
    running: Mutex<HashSet<String>>,
}

impl ApprovalWorkflow {
    pub fn new(gateway: Arc<dyn DataGateway>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            gateway,
            notifier,
            completed: Mutex::new(HashMap::new()),
            running: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_completed(&self, estimate_id: Uuid) -> bool {
        self.completed
            .lock()
            .map(|c| c.contains_key(&idempotency_key(estimate_id)))
            .unwrap_or(false)
    }

    /// Approve `estimate` and run the requested side effects.
    pub async fn run(&self, estimate: &Estimate, request: &StatusRequest) -> Result<ApprovalOutcome> {
        let key = idempotency_key(estimate.id);

        let done = self
            .completed
            .lock()
            .ok()
            .and_then(|c| c.get(&key).cloned());
        if let Some(report) = done {
            tracing::debug!(key = %key, "approval already completed");
            return Ok(ApprovalOutcome::AlreadyCompleted(report));
        }

        let claimed = self
            .running
            .lock()
            .map(|mut r| r.insert(key.clone()))
            .unwrap_or(false);
        if !claimed {
            return Ok(ApprovalOutcome::InProgress);
        }
        let _guard = RunningGuard {
            running: &self.running,
            key: key.clone(),
        };

        match self.execute(&key, estimate, request).await {
            Ok(report) => {
                if let Ok(mut completed) = self.completed.lock() {
                    completed.insert(key.clone(), report.clone());
                }
                tracing::info!(
                    key = %key,
                    project_id = ?report.project_id,
                    invoice_id = ?report.invoice_id,
                    amount = %report.amount,
                    "estimate approved"
                );
                self.notifier.notify(Notice::success("Estimate approved"));
                Ok(ApprovalOutcome::Completed(report))
            }
            Err(e) => {
                notify::report(self.notifier.as_ref(), "approve estimate", &e);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        key: &str,
        estimate: &Estimate,
        request: &StatusRequest,
    ) -> Result<ApprovalReport> {
        let amount = round_money(request.effective_amount(estimate));
        if request.options.create_invoice && amount <= Decimal::ZERO {
            return Err(SdkError::validation(
                "amount",
                "invoice amount must be greater than zero",
            ));
        }

        let mut undo = Vec::new();
        let mut report = ApprovalReport {
            key: key.to_string(),
            estimate_id: estimate.id,
            amount,
            project_id: estimate.project_id,
            project_created: false,
            invoice_id: None,
        };

        match self.steps(key, estimate, request, &mut report, &mut undo).await {
            Ok(()) => Ok(report),
            Err(e) => {
                tracing::warn!(key, error = %e, steps = undo.len(), "approval failed, compensating");
                self.compensate(undo).await;
                Err(e)
            }
        }
    }

    async fn steps(
        &self,
        key: &str,
        estimate: &Estimate,
        request: &StatusRequest,
        report: &mut ApprovalReport,
        undo: &mut Vec<Undo>,
    ) -> Result<()> {
        let gateway = self.gateway.as_ref();

        if estimate.status != EstimateStatus::Approved {
            let echo = write_estimate_status(gateway, estimate.id, EstimateStatus::Approved).await?;
            undo.push(Undo::RestoreEstimate {
                id: estimate.id,
                status: estimate.status,
            });
            if echo != Some(EstimateStatus::Approved) {
                return Err(SdkError::Verification {
                    entity: format!("estimate status {}", estimate.id),
                    expected: EstimateStatus::Approved.to_string(),
                    actual: echo.map(|s| s.to_string()).unwrap_or_else(|| "nothing".into()),
                });
            }
        }

        if request.options.move_project {
            let (project_id, current) = match estimate.project_id {
                Some(id) => (id, self.project_column(id).await?),
                None => {
                    let (id, column) = self.create_project(estimate.id).await?;
                    undo.push(Undo::DeleteProject { id });
                    report.project_id = Some(id);
                    report.project_created = true;
                    (id, column)
                }
            };

            if current != BoardColumn::PreProduction {
                let echo = write_project_status(gateway, project_id, BoardColumn::PreProduction).await?;
                if !report.project_created {
                    undo.push(Undo::RestoreProject {
                        id: project_id,
                        column: current,
                    });
                }
                if echo != Some(BoardColumn::PreProduction) {
                    return Err(SdkError::Verification {
                        entity: format!("project status {}", project_id),
                        expected: BoardColumn::PreProduction.to_string(),
                        actual: echo.map_or_else(|| "nothing".to_string(), |c| c.to_string()),
                    });
                }
            }
        }

        if request.options.create_invoice {
            let result = gateway
                .rpc(
                    CREATE_INVOICE_FROM_ESTIMATE,
                    json!({
                        "p_estimate_id": estimate.id,
                        "p_amount": money_string(report.amount),
                        "p_idempotency_key": key,
                    }),
                )
                .await?;
            report.invoice_id = echoed_uuid(&result, &["invoice_id", "id"]);
        }

        Ok(())
    }

    async fn project_column(&self, project_id: Uuid) -> Result<BoardColumn> {
        let rows = self
            .gateway
            .select(
                PROJECTS_TABLE,
                &RowQuery::new().columns(&["id", "status"]).eq("id", project_id),
            )
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| SdkError::NotFound(format!("project {}", project_id)))?;
        Ok(from_durable(row.get("status").and_then(Value::as_str)))
    }

    async fn create_project(&self, estimate_id: Uuid) -> Result<(Uuid, BoardColumn)> {
        let result = self
            .gateway
            .rpc(
                CREATE_PROJECT_FROM_ESTIMATE,
                json!({"p_estimate_id": estimate_id}),
            )
            .await?;
        let id = echoed_uuid(&result, &["project_id", "id"]).ok_or_else(|| SdkError::Rpc {
            name: CREATE_PROJECT_FROM_ESTIMATE.to_string(),
            code: None,
            message: "no project id returned".to_string(),
        })?;
        let column = from_durable(echoed(&result, "status").and_then(Value::as_str));
        tracing::info!(estimate_id = %estimate_id, project_id = %id, "project created from estimate");
        Ok((id, column))
    }

    async fn compensate(&self, undo: Vec<Undo>) {
        let gateway = self.gateway.as_ref();
        for step in undo.into_iter().rev() {
            let result = match step {
                Undo::RestoreEstimate { id, status } => {
                    write_estimate_status(gateway, id, status).await.map(|_| ())
                }
                Undo::RestoreProject { id, column } => {
                    write_project_status(gateway, id, column).await.map(|_| ())
                }
                Undo::DeleteProject { id } => gateway
                    .delete(PROJECTS_TABLE, &[lumen_gateway::Filter::eq("id", id)])
                    .await
                    .map(|_| ()),
            };
            if let Err(e) = result {
                tracing::error!(step = ?step, error = %e, "compensating write failed");
            }
        }
    }
}
