use super::approval::{write_estimate_status, ApprovalOutcome, ApprovalWorkflow};
use super::model::{Estimate, EstimateDraft, EstimateRow, Pricing, StatusChange};
use crate::derive::money_string;
use crate::error::{Result, SdkError};
use crate::gateway::{decode_rows, echoed, DataGateway};
use crate::identity::IdentityProvider;
use crate::notify::{self, Notifier};
use crate::optimistic::{MutationOutcome, OptimisticController};
use crate::status::EstimateStatus;
use lumen_gateway::{Order, RowQuery};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

pub(crate) const ESTIMATES_TABLE: &str = "estimates";
const CREATE_PROJECT_ESTIMATION: &str = "create_project_estimation";

/// Result of [`EstimateService::change_status`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChangeOutcome {
    /// Plain status write through the optimistic controller
    Status(MutationOutcome<EstimateStatus>),
    /// Approval with side effects
    Approval(ApprovalOutcome),
}

pub struct EstimateService {
    gateway: Arc<dyn DataGateway>,
    identity: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn Notifier>,
    estimates: Mutex<Vec<Estimate>>,
    statuses: OptimisticController<Uuid, EstimateStatus>,
    approvals: ApprovalWorkflow,
}

impl EstimateService {
    pub fn new(
        gateway: Arc<dyn DataGateway>,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            approvals: ApprovalWorkflow::new(gateway.clone(), notifier.clone()),
            statuses: OptimisticController::new("estimate status", notifier.clone()),
            gateway,
            identity,
            notifier,
            estimates: Mutex::new(Vec::new()),
        }
    }

    /// Fetch the owner's estimates, newest first
    pub async fn load(&self) -> Result<usize> {
        match self.fetch().await {
            Ok(estimates) => {
                self.statuses
                    .replace_all(estimates.iter().map(|e| (e.id, e.status)));
                let count = estimates.len();
                *self.lock() = estimates;
                Ok(count)
            }
            Err(e) => {
                notify::report(self.notifier.as_ref(), "load estimates", &e);
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<Estimate>> {
        let identity = self.identity.current().await?;
        let rows = self
            .gateway
            .select(
                ESTIMATES_TABLE,
                &RowQuery::new()
                    .eq("user_id", identity.user_id)
                    .order_by("created_at", Order::Desc),
            )
            .await?;
        Ok(decode_rows::<EstimateRow>(rows)?
            .into_iter()
            .map(Estimate::from)
            .collect())
    }

    pub fn estimates(&self) -> Vec<Estimate> {
        let statuses = self.statuses.snapshot();
        self.lock()
            .iter()
            .cloned()
            .map(|mut e| {
                if let Some(status) = statuses.get(&e.id) {
                    e.status = *status;
                }
                e
            })
            .collect()
    }

    pub fn get(&self, id: Uuid) -> Option<Estimate> {
        let mut estimate = self.lock().iter().find(|e| e.id == id).cloned()?;
        if let Some(status) = self.statuses.get(&id) {
            estimate.status = status;
        }
        Some(estimate)
    }

    /// Create an estimate (and its project) remotely.
    ///
    /// The estimate is listed immediately under a provisional id, which is
    /// swapped for the store's id once the call returns. Invalid drafts are
    /// refused before anything is sent.
    pub async fn create(&self, draft: EstimateDraft) -> Result<Estimate> {
        draft.validate().into_result()?;

        let identity = match self.identity.current().await {
            Ok(identity) => identity,
            Err(e) => {
                notify::report(self.notifier.as_ref(), "create estimate", &e);
                return Err(e);
            }
        };

        let provisional = Estimate {
            id: Uuid::new_v4(),
            client: draft.client.clone(),
            pricing: draft.pricing.clone(),
            status: EstimateStatus::Pending,
            project_id: None,
            created_at: Some(chrono::Utc::now()),
        };
        self.lock().insert(0, provisional.clone());
        self.statuses.insert(provisional.id, provisional.status);

        let (items, packages, selected) = match &draft.pricing {
            Pricing::Items(items) => (json!(items), json!([]), Value::Null),
            Pricing::Package { packages, selected } => (json!([]), json!(packages), json!(selected)),
        };
        let args = json!({
            "p_user_id": identity.user_id,
            "p_client_ref": provisional.id,
            "p_client_name": draft.client.name,
            "p_client_email": draft.client.email,
            "p_client_phone": draft.client.phone,
            "p_items": items,
            "p_packages": packages,
            "p_selected_package": selected,
            "p_amount": money_string(provisional.amount()),
        });

        let durable = match self.gateway.rpc(CREATE_PROJECT_ESTIMATION, args).await {
            Ok(result) => Self::durable_ids(&result),
            Err(e) => Err(e),
        };

        match durable {
            Ok((id, project_id)) => {
                let mut created = provisional.clone();
                created.id = id;
                created.project_id = project_id;
                if let Some(slot) = self.lock().iter_mut().find(|e| e.id == provisional.id) {
                    *slot = created.clone();
                }
                self.statuses.remove(&provisional.id);
                self.statuses.insert(created.id, created.status);
                tracing::info!(estimate_id = %created.id, project_id = ?created.project_id, "estimate created");
                Ok(created)
            }
            Err(e) => {
                self.lock().retain(|est| est.id != provisional.id);
                self.statuses.remove(&provisional.id);
                notify::report(self.notifier.as_ref(), "create estimate", &e);
                Err(e)
            }
        }
    }

    fn durable_ids(result: &Value) -> Result<(Uuid, Option<Uuid>)> {
        let id = ["estimate_id", "id"]
            .iter()
            .filter_map(|field| echoed(result, field))
            .filter_map(Value::as_str)
            .find_map(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| SdkError::Rpc {
                name: CREATE_PROJECT_ESTIMATION.to_string(),
                code: None,
                message: "no estimate id returned".to_string(),
            })?;

        // A bare id answer carries no project.
        let project_id = if result.is_string() {
            None
        } else {
            echoed(result, "project_id")
                .and_then(Value::as_str)
                .and_then(|raw| Uuid::parse_str(raw).ok())
        };
        Ok((id, project_id))
    }

    /// Change an estimate's status.
    ///
    /// Approvals that ask for side effects run the approval workflow; every
    /// other change is a single optimistic status write.
    pub async fn change_status(&self, id: Uuid, change: StatusChange) -> Result<StatusChangeOutcome> {
        let Some(estimate) = self.get(id) else {
            let err = SdkError::NotFound(format!("estimate {}", id));
            notify::report(self.notifier.as_ref(), "change estimate status", &err);
            return Err(err);
        };
        let request = change.resolve();

        if request.is_approval_workflow() {
            let outcome = self.approvals.run(&estimate, &request).await?;
            if let ApprovalOutcome::Completed(report) = &outcome {
                self.statuses.insert(id, EstimateStatus::Approved);
                if let Some(slot) = self.lock().iter_mut().find(|e| e.id == id) {
                    slot.status = EstimateStatus::Approved;
                    slot.project_id = report.project_id.or(slot.project_id);
                }
            }
            return Ok(StatusChangeOutcome::Approval(outcome));
        }

        let gateway = self.gateway.clone();
        let outcome = self
            .statuses
            .mutate(id, request.status, |target| async move {
                let echo = write_estimate_status(gateway.as_ref(), id, target).await?;
                echo.ok_or_else(|| SdkError::Verification {
                    entity: format!("estimate status {}", id),
                    expected: target.to_string(),
                    actual: "nothing".to_string(),
                })
            })
            .await?;
        Ok(StatusChangeOutcome::Status(outcome))
    }

    /// The view owning this list went away
    pub fn detach(&self) {
        self.statuses.detach();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Estimate>> {
        match self.estimates.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::LineItem;
    use crate::estimate::model::ClientContact;
    use crate::gateway::{FailureKind, MockGateway};
    use crate::identity::{BypassIdentity, Role};
    use crate::notify::RecordingNotifier;

    const OWNER: &str = "7f9c2d2e-4c1b-4f53-9f0e-0d6f7b1c2a11";
    const ESTIMATE: &str = "4c0e8a1d-6b2f-4e39-9a7c-1d2e3f4a5b6c";

    fn service(gateway: Arc<MockGateway>, notifier: Arc<RecordingNotifier>) -> EstimateService {
        EstimateService::new(
            gateway,
            Arc::new(BypassIdentity::new(Uuid::parse_str(OWNER).unwrap(), Role::Owner)),
            notifier,
        )
    }

    fn draft() -> EstimateDraft {
        EstimateDraft {
            client: ClientContact {
                name: "Asha Mehta".into(),
                email: Some("asha@example.com".into()),
                phone: None,
            },
            pricing: Pricing::Items(vec![
                LineItem::new("Coverage", "₹4,000.00"),
                LineItem::new("Album", "₹1,000.00"),
            ]),
        }
    }

    #[tokio::test]
    async fn test_create_swaps_provisional_id() {
        let gateway = Arc::new(MockGateway::new().with_rpc(CREATE_PROJECT_ESTIMATION, |_, _| {
            Ok(json!({
                "success": true,
                "data": {
                    "estimate_id": ESTIMATE,
                    "project_id": "2b1e4c0a-9a63-4d8e-8f57-5b8a1c3f9d01"
                }
            }))
        }));
        let svc = service(gateway.clone(), Arc::new(RecordingNotifier::new()));

        let created = svc.create(draft()).await.unwrap();
        assert_eq!(created.id.to_string(), ESTIMATE);
        assert!(created.project_id.is_some());
        assert_eq!(svc.estimates().len(), 1);
        assert!(svc.get(created.id).is_some());

        let call = &gateway.calls_to("rpc:create_project_estimation")[0];
        assert_eq!(call.payload["p_amount"], "5000.00");
        assert_eq!(call.payload["p_user_id"], OWNER);
    }

    #[tokio::test]
    async fn test_create_failure_removes_provisional() {
        let gateway = Arc::new(MockGateway::new().with_rpc(CREATE_PROJECT_ESTIMATION, |_, _| {
            Ok(json!({"success": true}))
        }));
        gateway.fail_next(
            "rpc:create_project_estimation",
            FailureKind::Rpc {
                code: Some("23505".into()),
                message: "duplicate estimate".into(),
            },
        );
        let notifier = Arc::new(RecordingNotifier::new());
        let svc = service(gateway.clone(), notifier.clone());

        assert!(svc.create(draft()).await.is_err());
        assert!(svc.estimates().is_empty());
        assert_eq!(notifier.errors().len(), 1);

        // A success envelope without an id is still a failure
        assert!(svc.create(draft()).await.is_err());
        assert!(svc.estimates().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_draft_never_reaches_store() {
        let gateway = Arc::new(MockGateway::new());
        let svc = service(gateway.clone(), Arc::new(RecordingNotifier::new()));

        let mut bad = draft();
        bad.client.name = " ".into();
        let err = svc.create(bad).await.unwrap_err();
        assert!(matches!(err, SdkError::Validation { .. }));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_simple_status_change_is_optimistic() {
        let gateway = Arc::new(
            MockGateway::new()
                .with_rows(
                    ESTIMATES_TABLE,
                    vec![json!({"id": ESTIMATE, "user_id": OWNER, "client_name": "Asha", "status": "pending"})],
                )
                .with_rpc("update_estimate_status", |_, args| {
                    Ok(json!({"status": args["p_status"]}))
                }),
        );
        let svc = service(gateway.clone(), Arc::new(RecordingNotifier::new()));
        svc.load().await.unwrap();
        let id = Uuid::parse_str(ESTIMATE).unwrap();

        let outcome = svc
            .change_status(id, StatusChange::Simple { status: EstimateStatus::Declined })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            StatusChangeOutcome::Status(MutationOutcome::Committed(EstimateStatus::Declined))
        );
        assert_eq!(svc.get(id).unwrap().status, EstimateStatus::Declined);

        gateway.fail_next("rpc:update_estimate_status", FailureKind::Network);
        assert!(svc
            .change_status(id, StatusChange::Simple { status: EstimateStatus::Negotiating })
            .await
            .is_err());
        assert_eq!(svc.get(id).unwrap().status, EstimateStatus::Declined);
    }

    #[tokio::test]
    async fn test_unknown_estimate() {
        let svc = service(Arc::new(MockGateway::new()), Arc::new(RecordingNotifier::new()));
        let err = svc
            .change_status(Uuid::new_v4(), StatusChange::Simple { status: EstimateStatus::Declined })
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::NotFound(_)));
    }
}
