//! Remote data gateway abstraction
//!
//! The hosted platform is the source of truth. Everything in the SDK talks to
//! it through [`DataGateway`] so that services can run against the HTTP
//! client in production and against [`MockGateway`] in tests.

mod http;
mod mock;

pub use mock::{FailureKind, GatewayCall, GatewayOp, MockGateway, RpcHandler, Tables};

use crate::error::Result;
use async_trait::async_trait;
use lumen_gateway::{Filter, RowQuery, StoredObject};
use serde_json::Value;

/// Row, procedure and object-storage operations against the hosted store
#[async_trait]
pub trait DataGateway: Send + Sync {
    /// Select rows from a table
    async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>>;

    /// Insert one row (object) or several (array); returns the stored rows
    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>>;

    /// Patch matching rows; returns the updated rows
    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>>;

    /// Delete matching rows; returns the deleted rows
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>>;

    /// Call a named remote procedure. Envelope failures are already errors.
    async fn rpc(&self, name: &str, args: Value) -> Result<Value>;

    /// Upload an object and return where it landed
    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        mime_type: &str,
    ) -> Result<StoredObject>;

    /// Remove objects from a bucket
    async fn remove_objects(&self, bucket: &str, paths: &[String]) -> Result<()>;
}

/// Decode rows returned by the gateway into typed records
pub(crate) fn decode_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Into::into))
        .collect()
}

/// Find `field` in a procedure result.
///
/// Procedures answer either with an envelope (`{success, data: {...}}`), a
/// raw row, a list of rows or a bare value; all are accepted.
pub(crate) fn echoed<'a>(result: &'a Value, field: &str) -> Option<&'a Value> {
    match result {
        Value::Object(map) => map
            .get(field)
            .or_else(|| map.get("data").and_then(|data| echoed(data, field))),
        Value::Array(rows) => rows.first().and_then(|row| echoed(row, field)),
        Value::Null => None,
        bare => Some(bare),
    }
}
