//! Estimate lifecycle
//!
//! Creation through the `create_project_estimation` procedure, plain status
//! changes through the optimistic controller, and approval through
//! [`ApprovalWorkflow`].

mod approval;
mod model;
mod service;

pub use approval::{idempotency_key, ApprovalOutcome, ApprovalReport, ApprovalWorkflow};
pub use model::{
    ApprovalOptions, ClientContact, Estimate, EstimateDraft, Package, Pricing, StatusChange,
    StatusRequest,
};
pub use service::{EstimateService, StatusChangeOutcome};
