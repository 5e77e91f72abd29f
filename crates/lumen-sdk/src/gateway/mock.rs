//! In-memory gateway for testing.

use super::DataGateway;
use crate::error::{Result, SdkError};
use async_trait::async_trait;
use lumen_gateway::{Filter, Order, RowQuery, StoredObject};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// Table name to rows
pub type Tables = HashMap<String, Vec<Value>>;

/// Scripted remote procedure. Runs with the table lock held.
pub type RpcHandler = Arc<dyn Fn(&mut Tables, &Value) -> Result<Value> + Send + Sync>;

/// Kind of gateway operation recorded in the call log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayOp {
    Select,
    Insert,
    Update,
    Delete,
    Rpc,
    Upload,
    Remove,
}

impl GatewayOp {
    fn prefix(&self) -> &'static str {
        match self {
            GatewayOp::Select => "select",
            GatewayOp::Insert => "insert",
            GatewayOp::Update => "update",
            GatewayOp::Delete => "delete",
            GatewayOp::Rpc => "rpc",
            GatewayOp::Upload => "upload",
            GatewayOp::Remove => "remove",
        }
    }
}

/// One recorded gateway call
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayCall {
    pub op: GatewayOp,
    /// Table, procedure or bucket name
    pub target: String,
    pub payload: Value,
}

impl GatewayCall {
    /// `"{op}:{target}"`, the key used for failure injection and holds
    pub fn key(&self) -> String {
        format!("{}:{}", self.op.prefix(), self.target)
    }
}

/// Failure to inject into the next call on a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Unauthorized,
    Rpc { code: Option<String>, message: String },
    Server(String),
}

impl FailureKind {
    fn into_error(self, target: &str) -> SdkError {
        match self {
            FailureKind::Network => SdkError::Network("connection reset".into()),
            FailureKind::Unauthorized => {
                SdkError::Unauthorized("permission denied for current session".into())
            }
            FailureKind::Rpc { code, message } => SdkError::Rpc {
                name: target.to_string(),
                code,
                message,
            },
            FailureKind::Server(message) => SdkError::Network(message),
        }
    }
}

#[derive(Default)]
struct MockState {
    tables: Tables,
    objects: HashMap<(String, String), Vec<u8>>,
    calls: Vec<GatewayCall>,
    failures: HashMap<String, VecDeque<FailureKind>>,
    sticky_failures: HashMap<String, FailureKind>,
}

/// Mock gateway for testing.
///
/// Rows live in memory, procedures are scripted with [`MockGateway::with_rpc`],
/// every call is logged, and failures can be injected per `"{op}:{target}"`
/// key (e.g. `"rpc:update_project_status"`, `"insert:images"`).
#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
    rpc_handlers: Mutex<HashMap<String, RpcHandler>>,
    holds: Mutex<HashMap<String, Arc<Notify>>>,
}

impl MockGateway {
    /// Create an empty mock gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table with rows.
    pub fn with_rows(self, table: &str, rows: Vec<Value>) -> Self {
        self.lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
        self
    }

    /// Script a remote procedure.
    pub fn with_rpc<F>(self, name: &str, handler: F) -> Self
    where
        F: Fn(&mut Tables, &Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.register_rpc(name, handler);
        self
    }

    /// Script a remote procedure on a shared gateway.
    pub fn register_rpc<F>(&self, name: &str, handler: F)
    where
        F: Fn(&mut Tables, &Value) -> Result<Value> + Send + Sync + 'static,
    {
        if let Ok(mut handlers) = self.rpc_handlers.lock() {
            handlers.insert(name.to_string(), Arc::new(handler));
        }
    }

    /// Fail the next call on `key` once.
    pub fn fail_next(&self, key: &str, kind: FailureKind) {
        self.lock()
            .failures
            .entry(key.to_string())
            .or_default()
            .push_back(kind);
    }

    /// Fail every call on `key` until [`MockGateway::clear_failures`].
    pub fn fail_always(&self, key: &str, kind: FailureKind) {
        self.lock().sticky_failures.insert(key.to_string(), kind);
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failures.clear();
        state.sticky_failures.clear();
    }

    /// Make calls on `key` wait until the returned handle is notified.
    ///
    /// The call is logged before it waits, so tests can observe it in flight.
    pub fn hold(&self, key: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        if let Ok(mut holds) = self.holds.lock() {
            holds.insert(key.to_string(), notify.clone());
        }
        notify
    }

    /// Stop holding calls on `key` and let the held call through.
    ///
    /// Safe to call before the held call starts waiting: the permit is kept.
    pub fn release(&self, key: &str) {
        let removed = self.holds.lock().ok().and_then(|mut h| h.remove(key));
        if let Some(notify) = removed {
            notify.notify_one();
        }
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    /// Calls whose key equals `key`.
    pub fn calls_to(&self, key: &str) -> Vec<GatewayCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.key() == key)
            .cloned()
            .collect()
    }

    /// Number of calls whose key equals `key`.
    pub fn call_count(&self, key: &str) -> usize {
        self.calls_to(key).len()
    }

    /// Snapshot of a table.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Whether an object exists in a bucket.
    pub fn has_object(&self, bucket: &str, path: &str) -> bool {
        self.lock()
            .objects
            .contains_key(&(bucket.to_string(), path.to_string()))
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not wedge the others.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Log the call, then apply any held gate and injected failure.
    async fn enter(&self, op: GatewayOp, target: &str, payload: Value) -> Result<()> {
        let call = GatewayCall {
            op,
            target: target.to_string(),
            payload,
        };
        let key = call.key();
        self.lock().calls.push(call);

        let hold = self.holds.lock().ok().and_then(|h| h.get(&key).cloned());
        if let Some(notify) = hold {
            notify.notified().await;
        }

        let mut state = self.lock();
        if let Some(kind) = state.failures.get_mut(&key).and_then(VecDeque::pop_front) {
            return Err(kind.into_error(target));
        }
        if let Some(kind) = state.sticky_failures.get(&key).cloned() {
            return Err(kind.into_error(target));
        }
        Ok(())
    }
}

#[async_trait]
impl DataGateway for MockGateway {
    async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>> {
        self.enter(GatewayOp::Select, table, Value::String(query.to_query_string()))
            .await?;

        let state = self.lock();
        let mut rows: Vec<Value> = state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| f.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some((ref column, order)) = query.order {
            rows.sort_by(|a, b| {
                let a = a.get(column).map(|v| v.to_string()).unwrap_or_default();
                let b = b.get(column).map(|v| v.to_string()).unwrap_or_default();
                match order {
                    Order::Asc => a.cmp(&b),
                    Order::Desc => b.cmp(&a),
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>> {
        self.enter(GatewayOp::Insert, table, rows.clone()).await?;

        let incoming = match rows {
            Value::Array(rows) => rows,
            row => vec![row],
        };

        let mut inserted = Vec::with_capacity(incoming.len());
        let mut state = self.lock();
        let stored = state.tables.entry(table.to_string()).or_default();
        for mut row in incoming {
            if let Value::Object(ref mut map) = row {
                map.entry("id")
                    .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
            }
            stored.push(row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>> {
        self.enter(GatewayOp::Update, table, patch.clone()).await?;

        let mut state = self.lock();
        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut() {
                if !filters.iter().all(|f| f.matches(row)) {
                    continue;
                }
                if let (Value::Object(target), Value::Object(fields)) = (&mut *row, &patch) {
                    for (k, v) in fields {
                        target.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>> {
        let payload = Value::Array(
            filters
                .iter()
                .map(|f| Value::String(format!("{}={}", f.column, f.value)))
                .collect(),
        );
        self.enter(GatewayOp::Delete, table, payload).await?;

        if filters.is_empty() {
            return Err(SdkError::Config(format!("refusing unfiltered delete on {}", table)));
        }

        let mut state = self.lock();
        let Some(rows) = state.tables.get_mut(table) else {
            return Ok(Vec::new());
        };
        let (removed, kept): (Vec<Value>, Vec<Value>) = rows
            .drain(..)
            .partition(|row| filters.iter().all(|f| f.matches(row)));
        *rows = kept;
        Ok(removed)
    }

    async fn rpc(&self, name: &str, args: Value) -> Result<Value> {
        self.enter(GatewayOp::Rpc, name, args.clone()).await?;

        let handler = self
            .rpc_handlers
            .lock()
            .ok()
            .and_then(|handlers| handlers.get(name).cloned())
            .ok_or_else(|| SdkError::NotFound(format!("remote procedure {}", name)))?;

        let mut state = self.lock();
        handler(&mut state.tables, &args)
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        mime_type: &str,
    ) -> Result<StoredObject> {
        self.enter(
            GatewayOp::Upload,
            bucket,
            serde_json::json!({"path": path, "size": data.len(), "mime_type": mime_type}),
        )
        .await?;

        self.lock()
            .objects
            .insert((bucket.to_string(), path.to_string()), data);

        Ok(StoredObject {
            bucket: bucket.to_string(),
            path: path.to_string(),
            public_url: format!("mock://{}/{}", bucket, path),
        })
    }

    async fn remove_objects(&self, bucket: &str, paths: &[String]) -> Result<()> {
        self.enter(GatewayOp::Remove, bucket, serde_json::json!(paths))
            .await?;

        let mut state = self.lock();
        for path in paths {
            state.objects.remove(&(bucket.to_string(), path.clone()));
        }
        Ok(())
    }
}
