//! Access-control collaborator.
//!
//! Authentication happens outside the engine: a middleware resolves the session and
//! inserts a [`Caller`] into the request extensions. Endpoints then ask an
//! [`AccessControl`] implementation whether that caller may run an operation.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::errors::ApiError;

/// The authenticated principal of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    pub roles: Vec<String>,
}

impl Caller {
    pub fn new<I, S>(id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Role check consulted before every generated or hand-written endpoint.
pub trait AccessControl: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError::Forbidden` when `caller` may not run `operation`.
    fn check(&self, caller: &Caller, operation: &str, required_roles: &[String]) -> Result<(), ApiError>;
}

/// Grants access when the caller holds any of the required roles; an empty role
/// list admits every authenticated caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleAccess;

impl AccessControl for RoleAccess {
    fn check(&self, caller: &Caller, operation: &str, required_roles: &[String]) -> Result<(), ApiError> {
        if required_roles.is_empty() || required_roles.iter().any(|role| caller.has_role(role)) {
            return Ok(());
        }
        tracing::warn!(caller = %caller.id, operation, ?required_roles, "access denied");
        Err(ApiError::forbidden(format!("Missing required role for {operation}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    #[test]
    fn test_role_access() {
        let staff = Caller::new("u1", ["staff"]);
        assert!(RoleAccess.check(&staff, "list", &[]).is_ok());
        assert!(RoleAccess.check(&staff, "list", &["staff".into(), "admin".into()]).is_ok());

        let denied = RoleAccess.check(&staff, "delete", &["admin".into()]).unwrap_err();
        assert_eq!(denied.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_extractor_requires_caller() {
        let (mut parts, ()) = Request::new(()).into_parts();
        let missing = Caller::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);

        parts.extensions.insert(Caller::new("u1", ["admin"]));
        let caller = Caller::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(caller.has_role("admin"));
    }
}
