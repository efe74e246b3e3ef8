//! OAuth 2.0 authorization-code flow against the ERP's accounts host.
//!
//! The `state` parameter is `"{org_id}.{hmac}"` signed with the client
//! secret, so the callback can trust which organization it belongs to
//! without server-side session storage.

use std::sync::Arc;
use std::time::Duration;

use orderbridge_common::{hmac_sha256_hex, verify_hmac_sha256_hex};
use orderbridge_domain::{
    CommerceError, ErpConfig, ErpOrganization, ErpRegion, Result, TokenGrant,
};
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::errors::{ErpError, ErpErrorCategory};
use super::regions::RegionTable;
use super::wire::read_envelope;
use crate::http::HttpClient;

#[derive(Debug, Deserialize)]
struct TokenReply {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganizationsReply {
    #[serde(default)]
    organizations: Vec<OrganizationRecord>,
}

#[derive(Debug, Deserialize)]
struct OrganizationRecord {
    organization_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_default_org: bool,
}

pub struct ErpOAuthClient {
    http: HttpClient,
    regions: Arc<RegionTable>,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scope: String,
}

impl ErpOAuthClient {
    pub fn new(config: &ErpConfig, regions: Arc<RegionTable>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .max_attempts(3)
            .build()?;
        Ok(Self::with_http(config, regions, http))
    }

    pub fn with_http(config: &ErpConfig, regions: Arc<RegionTable>, http: HttpClient) -> Self {
        Self {
            http,
            regions,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope.clone(),
        }
    }

    pub fn regions(&self) -> &RegionTable {
        &self.regions
    }

    /// Consent URL on the default region's accounts host. The ERP redirects
    /// back with `location` naming the region the account actually lives in.
    pub fn authorization_url(&self, org_id: Uuid) -> Result<String> {
        let endpoints = self.regions.endpoints(self.regions.default_region())?;
        let mut url = Url::parse(&format!("{}/oauth/v2/auth", endpoints.accounts_url))
            .map_err(|e| CommerceError::Config(format!("invalid ERP accounts URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("scope", &self.scope)
            .append_pair("client_id", self.client_id.as_str())
            .append_pair("response_type", "code")
            .append_pair("access_type", "offline")
            .append_pair("redirect_uri", self.redirect_uri.as_str())
            .append_pair("state", &self.sign_state(org_id));
        Ok(url.into())
    }

    pub fn sign_state(&self, org_id: Uuid) -> String {
        let org = org_id.to_string();
        let mac = hmac_sha256_hex(self.client_secret.as_bytes(), org.as_bytes());
        format!("{org}.{mac}")
    }

    /// Recover the organization id from a signed `state`.
    pub fn verify_state(&self, state: &str) -> Result<Uuid> {
        let invalid = || CommerceError::Unauthorized("invalid OAuth state".into());
        let (org, mac) = state.split_once('.').ok_or_else(invalid)?;
        if !verify_hmac_sha256_hex(self.client_secret.as_bytes(), org.as_bytes(), mac) {
            warn!("rejected OAuth callback with a forged or stale state");
            return Err(invalid());
        }
        Uuid::parse_str(org).map_err(|_| invalid())
    }

    /// Trade an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str, region: ErpRegion) -> Result<TokenGrant> {
        let endpoints = self.regions.endpoints(region)?;
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        let request = self
            .http
            .request(Method::POST, format!("{}/oauth/v2/token", endpoints.accounts_url))
            .form(&form);
        // codes are single-use, so a retry could only fail
        let response = self.http.send_once(request).await?;
        debug!(%region, "exchanged ERP authorization code");
        token_grant(read_envelope::<TokenReply>(response).await?)
    }

    /// Refresh-token grant. Sent exactly once: a replayed refresh can
    /// invalidate the token the first attempt already rotated.
    pub async fn refresh(&self, refresh_token: &str, region: ErpRegion) -> Result<TokenGrant> {
        let endpoints = self.regions.endpoints(region)?;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let request = self
            .http
            .request(Method::POST, format!("{}/oauth/v2/token", endpoints.accounts_url))
            .form(&form);
        let response = self.http.send_once(request).await?;
        token_grant(read_envelope::<TokenReply>(response).await?)
    }

    pub async fn list_organizations(
        &self,
        access_token: &str,
        region: ErpRegion,
    ) -> Result<Vec<ErpOrganization>> {
        let endpoints = self.regions.endpoints(region)?;
        let request = self
            .http
            .request(Method::GET, format!("{}/organizations", endpoints.api_url))
            .bearer_auth(access_token);
        let reply: OrganizationsReply = read_envelope(self.http.send(request).await?).await?;
        Ok(reply
            .organizations
            .into_iter()
            .map(|org| ErpOrganization {
                organization_id: org.organization_id,
                name: org.name,
                is_default: org.is_default_org,
            })
            .collect())
    }
}

/// A 200 reply can still carry `{"error": "invalid_code"}`.
fn token_grant(reply: TokenReply) -> Result<TokenGrant> {
    if let Some(error) = reply.error {
        return Err(ErpError::new(
            ErpErrorCategory::Authentication,
            format!("OAuth grant rejected: {error}"),
        )
        .into());
    }
    let access_token = reply.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
        CommerceError::from(ErpError::new(
            ErpErrorCategory::Authentication,
            "OAuth reply has no access_token",
        ))
    })?;
    Ok(TokenGrant {
        access_token,
        refresh_token: reply.refresh_token.filter(|t| !t.is_empty()),
        expires_in_seconds: reply.expires_in.unwrap_or(3600),
        scope: reply.scope,
    })
}

/// The organization an ERP account defaults to, or its first one.
pub fn pick_tenant(organizations: &[ErpOrganization]) -> Option<&ErpOrganization> {
    organizations.iter().find(|org| org.is_default).or_else(|| organizations.first())
}
