//! Access control for the resource server.
//!
//! Two stages run for every request:
//!
//! 1. **Path stage** ([`classify`] + [`access_gate`]): the first matching URL rule decides
//!    whether a principal is needed and which roles may pass.
//! 2. **Method stage** (the `Decision`-returning functions below): evaluated inside a
//!    handler once the target record is known, adding ownership refinement on top of
//!    the role tier.
//!
//! Every method-stage function is pure, takes the resolved caller, and matches
//! exhaustively on [`Role`], so adding a role forces every rule to be revisited.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{AppState, auth::AuthUser, error::ApiError, models::Role};

/// Roles allowed through the `/api/users/**` tier.
pub const USER_TIER: &[Role] = &[Role::Admin, Role::User];

/// PathAccess
///
/// Outcome of the path stage for one request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathAccess {
    /// No principal required.
    Public,
    /// A principal holding one of these roles is required.
    AnyRole(&'static [Role]),
    /// Any valid principal.
    Authenticated,
}

/// classify
///
/// Matches `path` against the rules in precedence order; the first hit wins and
/// anything unmatched requires authentication.
pub fn classify(path: &str) -> PathAccess {
    if path == "/api/posts"
        || path == "/api/posts/"
        || under(path, "/swagger-ui")
        || under(path, "/api-docs")
        || under(path, "/v3/api-docs")
        || !under(path, "/api")
    {
        return PathAccess::Public;
    }
    if under(path, "/api/users") {
        return PathAccess::AnyRole(USER_TIER);
    }
    PathAccess::Authenticated
}

// `prefix` itself or anything below it, segment-aligned.
fn under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// access_gate
///
/// Path-stage middleware. Public paths pass untouched. Otherwise the principal is
/// resolved through the [`AuthUser`] extractor (401 on failure), checked against the
/// tier (403 on mismatch), and stashed in the request extensions for the handler.
pub async fn access_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let access = classify(request.uri().path());
    if access == PathAccess::Public {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let user = match AuthUser::resolve(&mut parts, &state).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    if let PathAccess::AnyRole(roles) = access {
        if !roles.contains(&user.role) {
            tracing::warn!(principal = %user.email, role = %user.role, path = %parts.uri.path(), "role outside path tier");
            return ApiError::AuthorizationDenied.into_response();
        }
    }

    parts.extensions.insert(user);
    next.run(Request::from_parts(parts, body)).await
}

/// Decision
///
/// Result of a method-stage rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    fn from_bool(allowed: bool) -> Self {
        if allowed { Decision::Allow } else { Decision::Deny }
    }

    /// Turns a `Deny` into [`ApiError::AuthorizationDenied`].
    pub fn require(self) -> Result<(), ApiError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(ApiError::AuthorizationDenied),
        }
    }
}

/// ListScope
///
/// Which user records a listing or search may return to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
    All,
    /// Only records whose email equals this principal.
    Own(String),
}

/// Reading one user record (by id, after the record is loaded).
pub fn read_user(caller: &AuthUser, target_email: &str) -> Decision {
    match caller.role {
        Role::Admin => Decision::Allow,
        Role::User => Decision::from_bool(caller.email == target_email),
    }
}

/// Looking a user up by exact email, decided before the lookup.
pub fn find_by_email(caller: &AuthUser, email: &str) -> Decision {
    match caller.role {
        Role::Admin => Decision::Allow,
        Role::User => Decision::from_bool(caller.email == email),
    }
}

/// Scope applied to `GET /api/users` and `GET /api/users/search`.
pub fn list_scope(caller: &AuthUser) -> ListScope {
    match caller.role {
        Role::Admin => ListScope::All,
        Role::User => ListScope::Own(caller.email.clone()),
    }
}

/// Creating, replacing or deleting user records.
pub fn manage_users(caller: &AuthUser) -> Decision {
    match caller.role {
        Role::Admin => Decision::Allow,
        Role::User => Decision::Deny,
    }
}

/// Changing a password.
///
/// A `USER` must be the target and must supply a non-empty current password. The
/// match itself is verified by the handler against the stored hash. `target_email`
/// is `None` when the target does not exist.
pub fn change_password(
    caller: &AuthUser,
    target_email: Option<&str>,
    old_password: Option<&str>,
) -> Decision {
    match caller.role {
        Role::Admin => Decision::Allow,
        Role::User => {
            let supplied = old_password.is_some_and(|p| !p.is_empty());
            let is_self = target_email.is_some_and(|email| email == caller.email);
            Decision::from_bool(supplied && is_self)
        }
    }
}
