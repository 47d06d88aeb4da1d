//! Bearer token authentication.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use intake_spec::{FormError, InstitutionId};

use crate::AppState;
use crate::config::{AuthConfig, TokenGrant};
use crate::error::ApiError;

/// Caller identity resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub institution: Option<InstitutionId>,
    pub admin: bool,
}

impl Principal {
    /// Admins may act on any institution; everyone else only on their own.
    pub fn authorize(&self, institution: InstitutionId) -> Result<(), ApiError> {
        if self.admin || self.institution == Some(institution) {
            Ok(())
        } else {
            Err(FormError::Authorization(format!(
                "'{}' may not manage forms of institution {institution}",
                self.id
            ))
            .into())
        }
    }
}

impl From<&TokenGrant> for Principal {
    fn from(grant: &TokenGrant) -> Self {
        Self {
            id: grant.principal.clone(),
            institution: grant.institution_id.map(InstitutionId),
            admin: grant.admin,
        }
    }
}

/// Resolves the `Authorization` header against the configured grants.
///
/// A missing header yields `Ok(None)`. A malformed header or an unknown
/// token is rejected outright.
pub fn resolve(config: &AuthConfig, parts: &Parts) -> Result<Option<Principal>, ApiError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::Unauthenticated)?;
    config
        .tokens
        .iter()
        .find(|grant| grant.token == token)
        .map(|grant| Some(Principal::from(grant)))
        .ok_or(ApiError::Unauthenticated)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        resolve(&state.auth, parts)?.ok_or(ApiError::Unauthenticated)
    }
}

/// Principal for routes that also serve anonymous callers.
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybePrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        resolve(&state.auth, parts).map(MaybePrincipal)
    }
}
