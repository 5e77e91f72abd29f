//! Project board columns and the durable project status vocabulary
//!
//! The board works in [`BoardColumn`]s. The store keeps a status string that
//! has accumulated several spellings over time; [`from_durable`] is the only
//! place those aliases are reconciled.

use serde::{Deserialize, Serialize};

/// Project lifecycle stage as shown on the board, earliest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardColumn {
    Upcoming,
    PreProduction,
    Shoot,
    PostProduction,
    Delivered,
}

impl BoardColumn {
    /// All columns in board order
    pub const ALL: [BoardColumn; 5] = [
        BoardColumn::Upcoming,
        BoardColumn::PreProduction,
        BoardColumn::Shoot,
        BoardColumn::PostProduction,
        BoardColumn::Delivered,
    ];

    /// Stage used for rows whose stored status is missing or unknown
    pub const DEFAULT: BoardColumn = BoardColumn::Upcoming;

    /// UI identifier
    pub fn as_id(&self) -> &'static str {
        match self {
            BoardColumn::Upcoming => "upcoming",
            BoardColumn::PreProduction => "pre_production",
            BoardColumn::Shoot => "shoot",
            BoardColumn::PostProduction => "post_production",
            BoardColumn::Delivered => "delivered",
        }
    }

    /// Parse a UI identifier (exact match only)
    pub fn parse_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_id() == id)
    }

    pub fn label(&self) -> &'static str {
        match self {
            BoardColumn::Upcoming => "Upcoming",
            BoardColumn::PreProduction => "Pre-Production",
            BoardColumn::Shoot => "Shoot",
            BoardColumn::PostProduction => "Post-Production",
            BoardColumn::Delivered => "Delivered",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == BoardColumn::Delivered
    }
}

impl Default for BoardColumn {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for BoardColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_id())
    }
}

/// Forward map: board column to the status string written to the store
pub fn to_durable(column: BoardColumn) -> &'static str {
    match column {
        BoardColumn::Upcoming => "upcoming",
        BoardColumn::PreProduction => "pre-production",
        BoardColumn::Shoot => "shoot",
        BoardColumn::PostProduction => "post-production",
        BoardColumn::Delivered => "delivered",
    }
}

/// Inverse map: stored status (current or legacy spelling) to board column.
///
/// Never fails; null and unrecognized values land in [`BoardColumn::DEFAULT`].
pub fn from_durable(status: Option<&str>) -> BoardColumn {
    status.and_then(parse_durable).unwrap_or(BoardColumn::DEFAULT)
}

/// Strict inverse map: `None` unless `status` is a known spelling.
pub fn parse_durable(status: &str) -> Option<BoardColumn> {
    let column = match status.trim().to_lowercase().as_str() {
        "upcoming" | "new" | "inquiry" | "pending" | "lead" => BoardColumn::Upcoming,
        "pre-production" | "pre_production" | "preproduction" | "planning" | "booked" => {
            BoardColumn::PreProduction
        }
        "shoot" | "production" | "in_progress" | "shooting" => BoardColumn::Shoot,
        "post-production" | "post_production" | "editing" | "review" => {
            BoardColumn::PostProduction
        }
        "delivered" | "completed" | "done" | "closed" => BoardColumn::Delivered,
        _ => return None,
    };
    Some(column)
}
