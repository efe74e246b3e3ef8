//! Caller identity forwarded by the upstream auth provider.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use orderbridge_domain::CommerceError;
use uuid::Uuid;

use crate::error::ApiError;

pub const ORG_HEADER: &str = "x-org-id";
pub const USER_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-role";

/// `(user, organization, role)` of an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub org_id: Uuid,
    pub role: String,
}

impl Session {
    /// Entities of another organization are reported as missing.
    pub fn ensure_owns(&self, org_id: Uuid, what: &str) -> Result<(), ApiError> {
        if org_id == self.org_id {
            Ok(())
        } else {
            Err(CommerceError::NotFound(what.to_owned()).into())
        }
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned)
        };

        let (Some(user_id), Some(org), Some(role)) =
            (header(USER_HEADER), header(ORG_HEADER), header(ROLE_HEADER))
        else {
            return Err(CommerceError::Unauthorized("missing session".into()).into());
        };
        let org_id = Uuid::parse_str(&org)
            .map_err(|_| CommerceError::Unauthorized("malformed organization id".into()))?;

        Ok(Self { user_id, org_id, role })
    }
}
