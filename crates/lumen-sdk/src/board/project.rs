//! Project records as stored in the `projects` table

use crate::status::{from_durable, BoardColumn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    #[serde(default)]
    pub title: String,
    /// Durable status string, possibly a legacy spelling
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn column(&self) -> BoardColumn {
        from_durable(self.status.as_deref())
    }
}

/// One board column with its projects, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct BoardLane {
    pub column: BoardColumn,
    pub projects: Vec<Project>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_sparse_row() {
        let project: Project = serde_json::from_value(json!({
            "id": "2b1e4c0a-9a63-4d8e-8f57-5b8a1c3f9d01",
            "title": "Mehta wedding",
            "status": "booked",
            "created_at": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(project.column(), BoardColumn::PreProduction);
        assert!(project.client_name.is_none());
    }

    #[test]
    fn test_null_status_is_upcoming() {
        let project: Project = serde_json::from_value(json!({
            "id": "2b1e4c0a-9a63-4d8e-8f57-5b8a1c3f9d01",
            "status": null
        }))
        .unwrap();
        assert_eq!(project.column(), BoardColumn::Upcoming);
    }
}
