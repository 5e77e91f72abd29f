//! Who is acting
//!
//! Services never look up the current user themselves; they are handed an
//! [`IdentityProvider`]. Production uses [`LiveIdentity`] over the gateway
//! session, development can use [`BypassIdentity`] from configuration.

use crate::config::{AuthConfig, AuthMode};
use crate::error::{Result, SdkError};
use async_trait::async_trait;
use lumen_gateway::GatewayClient;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Studio role of the acting user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Studio owner, full access
    #[default]
    Owner,
    /// Team member working on assigned projects
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Staff => "staff",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Role,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The acting identity, or [`SdkError::NoSession`]
    async fn current(&self) -> Result<Identity>;
}

/// Identity from the gateway's signed-in session
pub struct LiveIdentity {
    client: Arc<GatewayClient>,
}

impl LiveIdentity {
    pub fn new(client: Arc<GatewayClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityProvider for LiveIdentity {
    async fn current(&self) -> Result<Identity> {
        let session = self.client.session().await.ok_or(SdkError::NoSession)?;
        let user_id = Uuid::parse_str(&session.user.id).map_err(|e| {
            SdkError::Unauthorized(format!("session user id {:?}: {}", session.user.id, e))
        })?;
        Ok(Identity {
            user_id,
            email: session.user.email,
            role: Role::Owner,
        })
    }
}

/// Fixed identity for local development
#[derive(Debug, Clone)]
pub struct BypassIdentity {
    identity: Identity,
}

impl BypassIdentity {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            identity: Identity {
                user_id,
                email: None,
                role,
            },
        }
    }

    /// Build from the `[auth]` section. Fails unless bypass mode is configured
    /// with a valid user id.
    pub fn from_config(auth: &AuthConfig) -> Result<Self> {
        if auth.mode != AuthMode::Bypass {
            return Err(SdkError::Config("auth.mode is not bypass".into()));
        }
        let raw = auth
            .bypass_user_id
            .as_deref()
            .ok_or_else(|| SdkError::Config("auth.bypass_user_id is required".into()))?;
        let user_id = Uuid::parse_str(raw.trim())
            .map_err(|e| SdkError::Config(format!("auth.bypass_user_id: {}", e)))?;
        tracing::warn!(user_id = %user_id, "auth bypass active");
        Ok(Self::new(user_id, auth.bypass_role))
    }
}

#[async_trait]
impl IdentityProvider for BypassIdentity {
    async fn current(&self) -> Result<Identity> {
        Ok(self.identity.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_gateway::{GatewayConfig, Session, SessionUser};

    #[tokio::test]
    async fn test_bypass_from_config() {
        let auth = AuthConfig {
            mode: AuthMode::Bypass,
            bypass_user_id: Some("7f9c2d2e-4c1b-4f53-9f0e-0d6f7b1c2a11".into()),
            bypass_role: Role::Staff,
        };
        let identity = BypassIdentity::from_config(&auth)
            .unwrap()
            .current()
            .await
            .unwrap();
        assert_eq!(identity.role, Role::Staff);
        assert_eq!(
            identity.user_id.to_string(),
            "7f9c2d2e-4c1b-4f53-9f0e-0d6f7b1c2a11"
        );
    }

    #[test]
    fn test_bypass_requires_bypass_mode() {
        assert!(BypassIdentity::from_config(&AuthConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_live_identity_without_session() {
        let client = Arc::new(GatewayClient::new(GatewayConfig::default()).unwrap());
        let live = LiveIdentity::new(client.clone());
        assert!(matches!(live.current().await, Err(SdkError::NoSession)));

        client
            .set_session(Session {
                access_token: "token".into(),
                refresh_token: None,
                expires_in: Some(3600),
                user: SessionUser {
                    id: "7f9c2d2e-4c1b-4f53-9f0e-0d6f7b1c2a11".into(),
                    email: Some("studio@example.com".into()),
                },
            })
            .await;
        let identity = live.current().await.unwrap();
        assert_eq!(identity.email.as_deref(), Some("studio@example.com"));
    }
}
