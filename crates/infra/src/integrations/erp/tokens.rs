//! Access-token lifecycle for connected organizations.
//!
//! Tokens are refreshed once they are inside the refresh window. Within a
//! process, refreshes for one organization are serialized; across
//! processes, the conditional write on the previous `expires_at` decides
//! the winner and losers adopt the stored token.

use std::sync::Arc;

use chrono::Duration;
use orderbridge_common::Clock;
use orderbridge_core::{ConnectionRepository, KeyedLocks};
use orderbridge_domain::constants::TOKEN_REFRESH_WINDOW_SECS;
use orderbridge_domain::{CommerceError, ExternalConnection, Result, TokenGrant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::oauth::{pick_tenant, ErpOAuthClient};

/// What an API call needs: a live token, the tenant, and the API host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErpSession {
    pub access_token: String,
    pub tenant_id: String,
    pub api_url: String,
}

pub struct ErpTokenManager {
    oauth: Arc<ErpOAuthClient>,
    connections: Arc<dyn ConnectionRepository>,
    clock: Arc<dyn Clock>,
    refresh_window: Duration,
    refresh_locks: KeyedLocks<Uuid>,
}

impl ErpTokenManager {
    pub fn new(
        oauth: Arc<ErpOAuthClient>,
        connections: Arc<dyn ConnectionRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            oauth,
            connections,
            clock,
            refresh_window: Duration::seconds(TOKEN_REFRESH_WINDOW_SECS),
            refresh_locks: KeyedLocks::new(),
        }
    }

    pub fn oauth(&self) -> &ErpOAuthClient {
        &self.oauth
    }

    /// Finish the OAuth callback: verify `state`, exchange the code in the
    /// region named by `location`, resolve the tenant and store the
    /// connection.
    pub async fn connect(
        &self,
        state: &str,
        code: &str,
        location: Option<&str>,
    ) -> Result<ExternalConnection> {
        let org_id = self.oauth.verify_state(state)?;
        let region = self.oauth.regions().resolve(location)?;
        let grant = self.oauth.exchange_code(code, region).await?;

        let previous = self.connections.find(org_id).await?;
        let refresh_token = grant
            .refresh_token
            .clone()
            .or_else(|| previous.as_ref().map(|c| c.refresh_token.clone()))
            .ok_or_else(|| {
                CommerceError::Validation("ERP did not issue a refresh token".into())
            })?;

        let organizations = self.oauth.list_organizations(&grant.access_token, region).await?;
        let tenant = pick_tenant(&organizations).ok_or_else(|| {
            CommerceError::Validation("ERP account has no organizations".into())
        })?;

        let now = self.clock.now();
        let connection = ExternalConnection {
            org_id,
            tenant_id: Some(tenant.organization_id.clone()),
            access_token: grant.access_token,
            refresh_token,
            expires_at: now + Duration::seconds(grant.expires_in_seconds),
            region,
            scope: grant.scope,
            updated_at: now,
        };
        self.connections.upsert(&connection).await?;

        info!(
            org_id = %org_id,
            tenant_id = %tenant.organization_id,
            region = %region,
            "ERP connection established"
        );
        Ok(connection)
    }

    /// A session with a token valid beyond the refresh window.
    pub async fn session(&self, org_id: Uuid) -> Result<ErpSession> {
        let mut connection = self.load(org_id).await?;

        if connection.needs_refresh(self.clock.now(), self.refresh_window) {
            connection = self
                .refresh_locks
                .with_lock(org_id, async {
                    // another task may have refreshed while we waited
                    let latest = self.load(org_id).await?;
                    if latest.needs_refresh(self.clock.now(), self.refresh_window) {
                        self.refresh(latest).await
                    } else {
                        Ok(latest)
                    }
                })
                .await?;
        }

        let tenant_id = connection.tenant_id.clone().ok_or_else(|| {
            CommerceError::Config(format!("ERP connection for org {org_id} has no tenant"))
        })?;
        let api_url = self.oauth.regions().endpoints(connection.region)?.api_url.clone();
        Ok(ErpSession { access_token: connection.access_token, tenant_id, api_url })
    }

    async fn load(&self, org_id: Uuid) -> Result<ExternalConnection> {
        self.connections
            .find(org_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("ERP connection for org {org_id}")))
    }

    async fn refresh(&self, current: ExternalConnection) -> Result<ExternalConnection> {
        debug!(org_id = %current.org_id, expires_at = %current.expires_at, "refreshing ERP token");
        let grant = match self.oauth.refresh(&current.refresh_token, current.region).await {
            Ok(grant) => grant,
            Err(err) => {
                warn!(org_id = %current.org_id, error = %err, "ERP token refresh failed");
                return Err(err);
            }
        };

        let next = apply_grant(&current, grant, self.clock.now());
        if self.connections.replace_if_unchanged(&next, current.expires_at).await? {
            return Ok(next);
        }

        debug!(org_id = %current.org_id, "lost ERP token refresh race; using stored token");
        self.load(current.org_id).await
    }
}

fn apply_grant(
    current: &ExternalConnection,
    grant: TokenGrant,
    now: chrono::DateTime<chrono::Utc>,
) -> ExternalConnection {
    ExternalConnection {
        access_token: grant.access_token,
        // the ERP only rotates refresh tokens sometimes
        refresh_token: grant.refresh_token.unwrap_or_else(|| current.refresh_token.clone()),
        expires_at: now + Duration::seconds(grant.expires_in_seconds),
        scope: grant.scope.or_else(|| current.scope.clone()),
        updated_at: now,
        ..current.clone()
    }
}
