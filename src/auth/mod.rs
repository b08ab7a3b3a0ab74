pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_EMPLOYEE: &str = "employee";

/// Header through which an admin can ask to see the application as an employee.
pub const VIEW_MODE_HEADER: &str = "x-view-mode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Employee,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            ROLE_ADMIN => Some(Role::Admin),
            ROLE_EMPLOYEE => Some(Role::Employee),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => ROLE_ADMIN,
            Role::Employee => ROLE_EMPLOYEE,
        }
    }
}

/// Resolves the role a request acts with. Admins may step down into the
/// employee view; nobody can step up.
pub fn effective_role(actual: Role, requested_view: Option<Role>) -> Role {
    match (actual, requested_view) {
        (Role::Admin, Some(Role::Employee)) => Role::Employee,
        (actual, _) => actual,
    }
}

/// Tenant/session context resolved from the bearer token of every protected request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub role: Role,
    pub effective_role: Role,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.effective_role == Role::Admin
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden())
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        let claims = state
            .jwt
            .verify_token(bearer.token())
            .map_err(|_| AppError::unauthorized())?;

        let role = Role::parse(&claims.role).ok_or_else(AppError::unauthorized)?;
        let requested_view = parts
            .headers
            .get(VIEW_MODE_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(Role::parse);

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            username: claims.username,
            role,
            effective_role: effective_role(role, requested_view),
        })
    }
}

/// Caller of the `/api/cron/*` endpoints, authenticated by the static cron secret.
#[derive(Debug, Clone, Copy)]
pub struct CronCaller;

#[async_trait]
impl FromRequestParts<AppState> for CronCaller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state
            .config
            .cron_secret
            .as_deref()
            .ok_or_else(AppError::unauthorized)?;

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        if secrets_match(bearer.token(), expected) {
            Ok(CronCaller)
        } else {
            tracing::warn!("rejected cron call with invalid secret");
            Err(AppError::unauthorized())
        }
    }
}

/// Compares digests so the comparison time does not depend on the secret.
fn secrets_match(provided: &str, expected: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    provided
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
