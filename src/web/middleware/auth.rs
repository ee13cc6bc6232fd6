//! # Authentication Middleware
//!
//! Pluggable request authentication plus the guards that enforce it.
//!
//! ```text
//!  authenticate(HttpAuthenticator) ──▶ Principal in request extensions
//!         │ authenticator error => 500
//!         ▼
//!  require_authenticated            anonymous or missing => 401
//!  require_role(RequiredRole)       anonymous or missing => 401, role missing => 403
//! ```
//!
//! `authenticate` never rejects a request for bad or missing credentials.
//! Authenticators report those as [`Principal::anonymous`]; rejection is the
//! job of the guards layered inside it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use thiserror::Error;
use tracing::debug;

use crate::web::errors::ApiError;

/// Failure inside an authenticator, as opposed to a rejected credential
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AuthError {
    message: String,
}

impl AuthError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Authentication state of the caller, available to handlers through
/// `Extension<Principal>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Principal {
    name: String,
    subject_id: String,
    anonymous: bool,
    roles: BTreeSet<String>,
    attributes: BTreeMap<String, serde_json::Value>,
}

impl Principal {
    /// An authenticated principal
    pub fn authenticated(name: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subject_id: subject_id.into(),
            anonymous: false,
            ..Self::default()
        }
    }

    /// Caller without valid credentials
    pub fn anonymous() -> Self {
        Self {
            anonymous: true,
            ..Self::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    /// Anonymous principals hold no roles.
    pub fn has_role(&self, role: &str) -> bool {
        !self.anonymous && self.roles.contains(role)
    }

    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }
}

/// Resolves the caller of a request.
///
/// Return `Ok(Principal::anonymous())` for missing or invalid credentials and
/// `Err` only when authentication itself could not be carried out.
#[async_trait]
pub trait HttpAuthenticator: Send + Sync + 'static {
    async fn authenticate(&self, parts: &Parts) -> Result<Principal, AuthError>;
}

/// Role required by [`require_role`]
#[derive(Debug, Clone)]
pub struct RequiredRole(Arc<str>);

impl RequiredRole {
    pub fn new(role: impl AsRef<str>) -> Self {
        Self(Arc::from(role.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Run the authenticator and store the resulting [`Principal`].
pub async fn authenticate(
    State(authenticator): State<Arc<dyn HttpAuthenticator>>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let principal = match authenticator.authenticate(&parts).await {
        Ok(principal) => principal,
        Err(e) => {
            return ApiError::internal(format!("authenticator failed: {e}"))
                .into_response_for(&parts.uri, &parts.extensions);
        }
    };

    debug!(
        principal = %principal.name(),
        subject_id = %principal.subject_id(),
        anonymous = principal.is_anonymous(),
        "Request authenticated"
    );

    parts.extensions.insert(principal);
    next.run(Request::from_parts(parts, body)).await
}

/// Reject requests without a non-anonymous [`Principal`] with 401.
pub async fn require_authenticated(request: Request, next: Next) -> Response {
    if authenticated_principal(&request).is_none() {
        return ApiError::Unauthorized.into_response_for(request.uri(), request.extensions());
    }
    next.run(request).await
}

/// 401 without a non-anonymous [`Principal`], 403 when it lacks the role.
pub async fn require_role(
    State(role): State<RequiredRole>,
    request: Request,
    next: Next,
) -> Response {
    let allowed = match authenticated_principal(&request) {
        None => {
            return ApiError::Unauthorized.into_response_for(request.uri(), request.extensions())
        }
        Some(principal) => principal.has_role(role.as_str()),
    };

    if !allowed {
        return ApiError::forbidden(role.as_str())
            .into_response_for(request.uri(), request.extensions());
    }
    next.run(request).await
}

fn authenticated_principal(request: &Request) -> Option<&Principal> {
    request
        .extensions()
        .get::<Principal>()
        .filter(|principal| !principal.is_anonymous())
}
