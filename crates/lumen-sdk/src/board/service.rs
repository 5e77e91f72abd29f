use super::project::{BoardLane, Project};
use crate::error::{Result, SdkError};
use crate::gateway::{decode_rows, echoed, DataGateway};
use crate::identity::IdentityProvider;
use crate::notify::{self, Notifier};
use crate::optimistic::{MutationOutcome, OptimisticController};
use crate::status::{parse_durable, to_durable, BoardColumn};
use lumen_gateway::{Filter, Order, RowQuery};
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

pub(crate) const PROJECTS_TABLE: &str = "projects";
pub(crate) const UPDATE_PROJECT_STATUS: &str = "update_project_status";

/// Ask the store to move a project and return the column it now reports.
/// A missing or unknown echo comes back as `None`.
pub(crate) async fn write_project_status(
    gateway: &dyn DataGateway,
    project_id: Uuid,
    column: BoardColumn,
) -> Result<Option<BoardColumn>> {
    let result = gateway
        .rpc(
            UPDATE_PROJECT_STATUS,
            json!({"p_project_id": project_id, "p_status": to_durable(column)}),
        )
        .await?;
    Ok(echoed(&result, "status")
        .and_then(|v| v.as_str())
        .and_then(parse_durable))
}

/// Kanban view of the current owner's projects.
///
/// Status moves go through an [`OptimisticController`]; everything else
/// waits for the store.
pub struct ProjectBoard {
    gateway: Arc<dyn DataGateway>,
    identity: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn Notifier>,
    projects: Mutex<Vec<Project>>,
    statuses: OptimisticController<Uuid, BoardColumn>,
}

impl ProjectBoard {
    pub fn new(
        gateway: Arc<dyn DataGateway>,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            gateway,
            identity,
            statuses: OptimisticController::new("project status", notifier.clone()),
            notifier,
            projects: Mutex::new(Vec::new()),
        }
    }

    /// Fetch the owner's projects and replace local state
    pub async fn load(&self) -> Result<usize> {
        match self.fetch().await {
            Ok(projects) => {
                let count = projects.len();
                self.statuses
                    .replace_all(projects.iter().map(|p| (p.id, p.column())));
                *self.lock() = projects;
                tracing::debug!(count, "project board loaded");
                Ok(count)
            }
            Err(e) => {
                notify::report(self.notifier.as_ref(), "load projects", &e);
                Err(e)
            }
        }
    }

    /// Full refetch, discarding local optimistic state
    pub async fn reconcile(&self) -> Result<usize> {
        tracing::info!("reconciling project board");
        self.load().await
    }

    async fn fetch(&self) -> Result<Vec<Project>> {
        let identity = self.identity.current().await?;
        let rows = self
            .gateway
            .select(
                PROJECTS_TABLE,
                &RowQuery::new()
                    .eq("user_id", identity.user_id)
                    .order_by("created_at", Order::Desc),
            )
            .await?;
        decode_rows(rows)
    }

    /// Every column in lifecycle order, including empty ones
    pub fn columns(&self) -> Vec<BoardLane> {
        let statuses = self.statuses.snapshot();
        let projects = self.lock().clone();

        BoardColumn::ALL
            .into_iter()
            .map(|column| BoardLane {
                column,
                projects: projects
                    .iter()
                    .filter(|p| statuses.get(&p.id).copied().unwrap_or_default() == column)
                    .cloned()
                    .map(|mut p| {
                        p.status = Some(to_durable(column).to_string());
                        p
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn project(&self, id: Uuid) -> Option<Project> {
        let mut project = self.lock().iter().find(|p| p.id == id).cloned()?;
        if let Some(column) = self.statuses.get(&id) {
            project.status = Some(to_durable(column).to_string());
        }
        Some(project)
    }

    pub fn column_of(&self, id: Uuid) -> Option<BoardColumn> {
        self.statuses.get(&id)
    }

    /// Drag a project to another column
    pub async fn move_project(
        &self,
        id: Uuid,
        column: BoardColumn,
    ) -> Result<MutationOutcome<BoardColumn>> {
        let gateway = self.gateway.clone();
        let outcome = self
            .statuses
            .mutate(id, column, |target| async move {
                let echo = write_project_status(gateway.as_ref(), id, target).await?;
                echo.ok_or_else(|| SdkError::Verification {
                    entity: format!("project status {}", id),
                    expected: target.to_string(),
                    actual: "nothing".to_string(),
                })
            })
            .await?;

        if outcome.is_committed() {
            tracing::info!(project_id = %id, column = %column, "project moved");
        }
        Ok(outcome)
    }

    /// Delete remotely, then drop the project from the board
    pub async fn delete_project(&self, id: Uuid) -> Result<()> {
        if self.statuses.is_in_flight(&id) {
            let err = SdkError::validation("project", "a status change is still saving");
            notify::report(self.notifier.as_ref(), "delete project", &err);
            return Err(err);
        }

        if let Err(e) = self
            .gateway
            .delete(PROJECTS_TABLE, &[Filter::eq("id", id)])
            .await
        {
            notify::report(self.notifier.as_ref(), "delete project", &e);
            return Err(e);
        }

        self.lock().retain(|p| p.id != id);
        self.statuses.remove(&id);
        tracing::info!(project_id = %id, "project deleted");
        Ok(())
    }

    /// The view owning this board went away
    pub fn detach(&self) {
        self.statuses.detach();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Project>> {
        match self.projects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{FailureKind, MockGateway};
    use crate::identity::{BypassIdentity, Role};
    use crate::notify::RecordingNotifier;

    const OWNER: &str = "7f9c2d2e-4c1b-4f53-9f0e-0d6f7b1c2a11";
    const P1: &str = "2b1e4c0a-9a63-4d8e-8f57-5b8a1c3f9d01";
    const P2: &str = "9d3f6a2b-1c4e-4b7a-8e90-3f2a1b0c9d02";

    fn gateway() -> Arc<MockGateway> {
        let gateway = MockGateway::new()
            .with_rows(
                PROJECTS_TABLE,
                vec![
                    json!({"id": P1, "title": "Mehta wedding", "status": "upcoming", "user_id": OWNER, "created_at": "2024-03-01T10:00:00Z"}),
                    json!({"id": P2, "title": "Catalog shoot", "status": "editing", "user_id": OWNER, "created_at": "2024-02-01T10:00:00Z"}),
                ],
            )
            .with_rpc(UPDATE_PROJECT_STATUS, |tables, args| {
                let id = args["p_project_id"].clone();
                let status = args["p_status"].clone();
                let rows = tables.entry(PROJECTS_TABLE.to_string()).or_default();
                let row = rows
                    .iter_mut()
                    .find(|r| r["id"] == id)
                    .ok_or_else(|| SdkError::NotFound("project".into()))?;
                row["status"] = status;
                Ok(row.clone())
            });
        Arc::new(gateway)
    }

    fn board(gateway: Arc<MockGateway>, notifier: Arc<RecordingNotifier>) -> ProjectBoard {
        let owner = Uuid::parse_str(OWNER).unwrap();
        ProjectBoard::new(
            gateway,
            Arc::new(BypassIdentity::new(owner, Role::Owner)),
            notifier,
        )
    }

    fn p1() -> Uuid {
        Uuid::parse_str(P1).unwrap()
    }

    #[tokio::test]
    async fn test_load_groups_by_column() {
        let board = board(gateway(), Arc::new(RecordingNotifier::new()));
        assert_eq!(board.load().await.unwrap(), 2);

        let lanes = board.columns();
        assert_eq!(lanes.len(), 5);
        assert_eq!(lanes[0].column, BoardColumn::Upcoming);
        assert_eq!(lanes[0].projects[0].title, "Mehta wedding");
        assert_eq!(lanes[3].projects[0].status.as_deref(), Some("post-production"));
    }

    #[tokio::test]
    async fn test_move_commits_with_one_call() {
        let gateway = gateway();
        let board = board(gateway.clone(), Arc::new(RecordingNotifier::new()));
        board.load().await.unwrap();

        let outcome = board.move_project(p1(), BoardColumn::Shoot).await.unwrap();
        assert_eq!(outcome, MutationOutcome::Committed(BoardColumn::Shoot));
        assert_eq!(board.column_of(p1()), Some(BoardColumn::Shoot));

        let calls = gateway.calls_to("rpc:update_project_status");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].payload["p_status"], "shoot");
    }

    #[tokio::test]
    async fn test_move_to_same_column_is_noop() {
        let gateway = gateway();
        let board = board(gateway.clone(), Arc::new(RecordingNotifier::new()));
        board.load().await.unwrap();

        let outcome = board
            .move_project(p1(), BoardColumn::Upcoming)
            .await
            .unwrap();
        assert_eq!(outcome, MutationOutcome::NoOp);
        assert_eq!(gateway.call_count("rpc:update_project_status"), 0);
    }

    #[tokio::test]
    async fn test_rejected_move_rolls_back() {
        let gateway = gateway();
        let notifier = Arc::new(RecordingNotifier::new());
        let board = board(gateway.clone(), notifier.clone());
        board.load().await.unwrap();

        gateway.fail_next("rpc:update_project_status", FailureKind::Unauthorized);
        let err = board
            .move_project(p1(), BoardColumn::Delivered)
            .await
            .unwrap_err();

        assert!(matches!(err, SdkError::Unauthorized(_)));
        assert_eq!(board.column_of(p1()), Some(BoardColumn::Upcoming));
        assert_eq!(notifier.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_store_echo_mismatch_rolls_back() {
        let gateway = gateway();
        gateway.register_rpc(UPDATE_PROJECT_STATUS, |_, _| {
            Ok(json!({"success": true, "data": {"status": "upcoming"}}))
        });
        let board = board(gateway.clone(), Arc::new(RecordingNotifier::new()));
        board.load().await.unwrap();

        let err = board.move_project(p1(), BoardColumn::Shoot).await.unwrap_err();
        assert!(matches!(err, SdkError::Verification { .. }));
        assert_eq!(board.column_of(p1()), Some(BoardColumn::Upcoming));
    }

    #[tokio::test]
    async fn test_unconfirmed_move_to_default_column_rolls_back() {
        let gateway = gateway();
        let notifier = Arc::new(RecordingNotifier::new());
        let board = board(gateway.clone(), notifier.clone());
        board.load().await.unwrap();
        let p2 = Uuid::parse_str(P2).unwrap();
        board.move_project(p2, BoardColumn::Shoot).await.unwrap();

        gateway.register_rpc(UPDATE_PROJECT_STATUS, |_, _| Ok(json!({"success": true})));
        let err = board.move_project(p2, BoardColumn::Upcoming).await.unwrap_err();
        assert!(matches!(err, SdkError::Verification { .. }));
        assert_eq!(board.column_of(p2), Some(BoardColumn::Shoot));

        gateway.register_rpc(UPDATE_PROJECT_STATUS, |_, _| {
            Ok(json!({"data": {"status": "archived"}}))
        });
        let err = board.move_project(p2, BoardColumn::Upcoming).await.unwrap_err();
        assert!(matches!(err, SdkError::Verification { .. }));
        assert_eq!(board.column_of(p2), Some(BoardColumn::Shoot));
        assert_eq!(notifier.errors().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_waits_for_store() {
        let gateway = gateway();
        let notifier = Arc::new(RecordingNotifier::new());
        let board = board(gateway.clone(), notifier.clone());
        board.load().await.unwrap();

        gateway.fail_next("delete:projects", FailureKind::Network);
        assert!(board.delete_project(p1()).await.is_err());
        assert!(board.project(p1()).is_some());

        board.delete_project(p1()).await.unwrap();
        assert!(board.project(p1()).is_none());
        assert_eq!(gateway.rows(PROJECTS_TABLE).len(), 1);
        assert_eq!(notifier.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_picks_up_remote_changes() {
        let gateway = gateway();
        let board = board(gateway.clone(), Arc::new(RecordingNotifier::new()));
        board.load().await.unwrap();

        gateway
            .update(PROJECTS_TABLE, &[Filter::eq("id", P1)], json!({"status": "done"}))
            .await
            .unwrap();
        assert_eq!(board.column_of(p1()), Some(BoardColumn::Upcoming));

        board.reconcile().await.unwrap();
        assert_eq!(board.column_of(p1()), Some(BoardColumn::Delivered));
        assert_eq!(gateway.call_count("select:projects"), 2);
    }
}
