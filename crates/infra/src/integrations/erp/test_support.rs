//! In-memory connection store and a mock-server harness for ERP tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use orderbridge_common::{Clock, MockClock};
use orderbridge_core::ConnectionRepository;
use orderbridge_domain::{ErpConfig, ErpRegion, ExternalConnection, Result};
use parking_lot::Mutex;
use uuid::Uuid;
use wiremock::MockServer;

use super::oauth::ErpOAuthClient;
use super::regions::RegionTable;
use super::tokens::ErpTokenManager;
use crate::http::HttpClient;

#[derive(Default)]
pub(crate) struct InMemoryConnections {
    rows: Mutex<HashMap<Uuid, ExternalConnection>>,
}

#[async_trait]
impl ConnectionRepository for InMemoryConnections {
    async fn find(&self, org_id: Uuid) -> Result<Option<ExternalConnection>> {
        Ok(self.rows.lock().get(&org_id).cloned())
    }

    async fn find_by_tenant(&self, tenant_id: &str) -> Result<Option<ExternalConnection>> {
        Ok(self.rows.lock().values().find(|c| c.tenant_id.as_deref() == Some(tenant_id)).cloned())
    }

    async fn upsert(&self, connection: &ExternalConnection) -> Result<()> {
        self.rows.lock().insert(connection.org_id, connection.clone());
        Ok(())
    }

    async fn replace_if_unchanged(
        &self,
        connection: &ExternalConnection,
        previous_expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut rows = self.rows.lock();
        match rows.get(&connection.org_id) {
            Some(stored) if stored.expires_at == previous_expires_at => {
                rows.insert(connection.org_id, connection.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Token manager wired to `server` for both the accounts and API hosts,
/// with an organization already connected to tenant `777`.
pub(crate) async fn connected_tokens(server: &MockServer) -> (Uuid, Arc<ErpTokenManager>) {
    let regions = Arc::new(RegionTable::single(server.uri(), format!("{}/v1", server.uri())));
    let config =
        ErpConfig { client_id: "cid".into(), client_secret: "csecret".into(), ..ErpConfig::default() };
    let http = HttpClient::builder().max_attempts(1).build().expect("http client");
    let oauth = Arc::new(ErpOAuthClient::with_http(&config, regions, http));
    let clock = MockClock::new();
    let connections = Arc::new(InMemoryConnections::default());

    let org_id = Uuid::now_v7();
    connections
        .upsert(&ExternalConnection {
            org_id,
            tenant_id: Some("777".into()),
            access_token: "live-token".into(),
            refresh_token: "rt".into(),
            expires_at: clock.now() + Duration::hours(1),
            region: ErpRegion::Us,
            scope: None,
            updated_at: clock.now(),
        })
        .await
        .expect("seed connection");

    let manager = ErpTokenManager::new(oauth, connections, Arc::new(clock));
    (org_id, Arc::new(manager))
}
