//! Project board
//!
//! Projects grouped into lifecycle columns. Moving a card is optimistic;
//! deleting one is not.

mod project;
mod service;

pub use project::{BoardLane, Project};
pub use service::ProjectBoard;

pub(crate) use service::{write_project_status, PROJECTS_TABLE};
