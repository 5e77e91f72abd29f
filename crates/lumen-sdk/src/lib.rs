//! Lumen SDK - studio business-management client core
//!
//! Everything durable lives on the hosted platform; this crate is the
//! client side of it.
//!
//! # Architecture
//!
//! - **Derivation**: pure subtotal/tax/total/balance arithmetic over
//!   currency-formatted strings ([`derive`])
//! - **Status maps**: board columns to stored status strings and back
//!   ([`status`])
//! - **Optimistic controller**: local patch, one remote call, verify or roll
//!   back ([`optimistic`])
//! - **Services**: project board, estimates (with approval), invoices, image
//!   upload, all talking to a [`DataGateway`]
//!
//! Control flow for a status change:
//! view → controller (local patch) → gateway → controller (verify / rollback)
//! → view.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lumen_sdk::{BoardColumn, BypassIdentity, ProjectBoard, Role, TracingNotifier};
//! use lumen_gateway::{GatewayClient, GatewayConfig};
//!
//! # async fn example() -> lumen_sdk::Result<()> {
//! let gateway = Arc::new(GatewayClient::new(GatewayConfig::default())?);
//! let identity = Arc::new(BypassIdentity::new(uuid::Uuid::new_v4(), Role::Owner));
//! let board = ProjectBoard::new(gateway, identity, Arc::new(TracingNotifier));
//!
//! board.load().await?;
//! for lane in board.columns() {
//!     println!("{}: {}", lane.column.label(), lane.projects.len());
//! }
//! # Ok(())
//! # }
//! ```

// Pure derivation and status vocabularies
pub mod derive;
pub mod status;

// Optimistic mutations
pub mod optimistic;

// Remote access
pub mod gateway;
pub mod identity;

// Feature services
pub mod board;
pub mod estimate;
pub mod invoice;
pub mod upload;

// Ambient
pub mod config;
pub mod error;
pub mod notify;
pub mod validation;

// Re-export derivation
pub use derive::{format_currency, LineItem, TotalGuard, Totals};

// Re-export status maps
pub use status::{
    from_durable, parse_durable, to_durable, BoardColumn, EstimateStatus, InvoiceStatus,
};

// Re-export controller
pub use optimistic::{MutationOutcome, OptimisticController};

// Re-export gateway and identity
pub use gateway::{DataGateway, MockGateway};
pub use identity::{BypassIdentity, Identity, IdentityProvider, LiveIdentity, Role};

// Re-export services
pub use board::{BoardLane, Project, ProjectBoard};
pub use estimate::{
    ApprovalOptions, ApprovalOutcome, ApprovalWorkflow, Estimate, EstimateDraft, EstimateService,
    Pricing, StatusChange, StatusChangeOutcome,
};
pub use invoice::{Invoice, InvoiceForm, InvoiceService, InvoiceType, Payment};
pub use upload::{Album, Image, ImageUpload, ImageUploadService};

// Re-export ambient types
pub use config::{AuthMode, LumenConfig};
pub use error::{Result, SdkError};
pub use notify::{Notice, NoticeLevel, Notifier, RecordingNotifier, TracingNotifier};
pub use validation::{FieldError, FieldErrors};

// Re-export from the gateway crate
pub use lumen_gateway::{GatewayClient, GatewayConfig};
