//! Types for the gateway client API

use serde::{Deserialize, Serialize};

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the hosted platform (no trailing slash)
    pub base_url: String,
    /// Public API key sent with every request
    pub api_key: String,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

// ============================================================================
// Auth
// ============================================================================

/// Authenticated user as reported by the auth endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Active session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds from issue
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: SessionUser,
}

/// Body for password sign-in
#[derive(Debug, Clone, Serialize)]
pub struct PasswordGrant<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

// ============================================================================
// Rows
// ============================================================================

/// Comparison operators supported in row filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
        }
    }
}

/// A single column filter (`column=op.value`)
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl ToString) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.to_string(),
        }
    }

    pub fn new(column: impl Into<String>, op: FilterOp, value: impl ToString) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.to_string(),
        }
    }

    /// Evaluate against a JSON row; used by in-memory gateways
    pub fn matches(&self, row: &serde_json::Value) -> bool {
        let Some(field) = row.get(&self.column) else {
            return false;
        };
        let field = match field {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => "null".to_string(),
            other => other.to_string(),
        };
        match self.op {
            FilterOp::Eq => field == self.value,
            FilterOp::Neq => field != self.value,
            FilterOp::Gt => field > self.value,
            FilterOp::Gte => field >= self.value,
            FilterOp::Lt => field < self.value,
            FilterOp::Lte => field <= self.value,
        }
    }

    pub(crate) fn to_query_pair(&self) -> String {
        format!(
            "{}={}.{}",
            urlencoding::encode(&self.column),
            self.op.as_str(),
            urlencoding::encode(&self.value)
        )
    }
}

/// Sort direction for row selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Options for row selects
#[derive(Debug, Clone, Default)]
pub struct RowQuery {
    /// Column list (`*` when empty)
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order: Option<(String, Order)>,
    pub limit: Option<u32>,
}

impl RowQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order = Some((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render as a URL query string (without the leading `?`)
    pub fn to_query_string(&self) -> String {
        let select = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(",")
        };

        let mut params = vec![format!("select={}", urlencoding::encode(&select))];
        params.extend(self.filters.iter().map(Filter::to_query_pair));
        if let Some((ref column, order)) = self.order {
            let dir = match order {
                Order::Asc => "asc",
                Order::Desc => "desc",
            };
            params.push(format!("order={}.{}", urlencoding::encode(column), dir));
        }
        if let Some(limit) = self.limit {
            params.push(format!("limit={}", limit));
        }
        params.join("&")
    }
}

// ============================================================================
// RPC
// ============================================================================

/// Structured result envelope returned by most remote procedures.
///
/// Procedures that return a raw row do not carry `success`; those are left
/// untouched by [`RpcEnvelope::check`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RpcEnvelope {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
}

impl RpcEnvelope {
    /// Inspect a procedure result and turn an embedded failure into an error
    pub fn check(name: &str, value: &serde_json::Value) -> crate::Result<()> {
        if !value.is_object() {
            return Ok(());
        }
        let envelope: RpcEnvelope = serde_json::from_value(value.clone())?;
        match envelope.success {
            Some(false) => Err(crate::GatewayError::Rpc {
                name: name.to_string(),
                code: envelope.error_code,
                message: envelope
                    .error
                    .unwrap_or_else(|| "procedure reported failure".to_string()),
            }),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Object storage
// ============================================================================

/// Result of an object upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub bucket: String,
    /// Path inside the bucket
    pub path: String,
    /// Publicly resolvable URL
    pub public_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_query_string() {
        let query = RowQuery::new()
            .eq("user_id", "u-1")
            .order_by("created_at", Order::Desc)
            .limit(20);
        assert_eq!(
            query.to_query_string(),
            "select=%2A&user_id=eq.u-1&order=created_at.desc&limit=20"
        );
    }

    #[test]
    fn test_filter_matches_json_row() {
        let row = json!({"id": "p1", "status": "shoot", "amount": 10});
        assert!(Filter::eq("status", "shoot").matches(&row));
        assert!(Filter::eq("amount", 10).matches(&row));
        assert!(!Filter::eq("missing", "x").matches(&row));
        assert!(Filter::new("status", FilterOp::Neq, "delivered").matches(&row));
    }

    #[test]
    fn test_envelope_failure_becomes_error() {
        let value = json!({"success": false, "error": "estimate locked", "error_code": "E_LOCKED"});
        let err = RpcEnvelope::check("update_estimate_status", &value).unwrap_err();
        match err {
            crate::GatewayError::Rpc { code, message, .. } => {
                assert_eq!(code.as_deref(), Some("E_LOCKED"));
                assert_eq!(message, "estimate locked");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_envelope_passes_raw_rows() {
        assert!(RpcEnvelope::check("x", &json!({"id": "p1", "status": "shoot"})).is_ok());
        assert!(RpcEnvelope::check("x", &json!("shoot")).is_ok());
        assert!(RpcEnvelope::check("x", &json!({"success": true})).is_ok());
    }
}
