//! Status vocabularies and mapping tables
//!
//! Pure and stateless. Board columns map to and from the store's project
//! status strings; estimate and invoice statuses are closed enums.

mod billing;
mod project;

pub use billing::{EstimateStatus, InvoiceStatus};
pub use project::{from_durable, parse_durable, to_durable, BoardColumn};
