//! Rust client for the hosted data platform behind Lumen
//!
//! The platform owns durable state and authorization. This crate only speaks
//! its HTTP surface: session auth, row CRUD, named remote procedures and
//! object storage.
//!
//! # Example
//!
//! ```rust,no_run
//! use lumen_gateway::{GatewayClient, GatewayConfig, Filter};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GatewayClient::new(GatewayConfig {
//!     base_url: "https://studio.example.com".into(),
//!     api_key: "public-anon-key".into(),
//!     ..Default::default()
//! })?;
//!
//! // Remote procedure with an envelope result
//! let row = client
//!     .rpc("update_project_status", &json!({"p_project_id": "p1", "p_status": "shoot"}))
//!     .await?;
//!
//! // Plain row update
//! client
//!     .update("projects", &[Filter::eq("id", "p1")], &json!({"title": "Wedding"}))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod types;

// Re-export main types
pub use client::GatewayClient;
pub use error::{GatewayError, Result};
pub use types::*;
