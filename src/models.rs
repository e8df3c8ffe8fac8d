use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::ApiError;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The closed set of authorization tiers. Every user holds exactly one.
/// Serialized and stored as the uppercase variant name (`"USER"`, `"ADMIN"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// The TEXT value written to the `users.role` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(UnknownRole(value)),
        }
    }
}

/// User
///
/// A row of the `users` table. `email` doubles as the principal identifier used
/// by every ownership check. The password hash is loaded for verification but is
/// never written into a response body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: Option<String>,
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    #[schema(ignore)]
    pub password: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
}

/// Post
///
/// A row of the `posts` table with its owner eagerly joined in.
/// The post's own id stays internal and is omitted from JSON output.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct Post {
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    #[schema(ignore)]
    pub id: i64,
    pub title: String,
    pub content: String,
    pub user: User,
}

/// PostRow
///
/// Flat projection of `posts JOIN users`, folded into a [`Post`] by the repository.
#[derive(Debug, Clone, FromRow)]
pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub user_id: i64,
    pub user_email: String,
    pub user_username: Option<String>,
    pub user_password: Option<String>,
    #[sqlx(try_from = "String")]
    pub user_role: Role,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            title: row.title,
            content: row.content,
            user: User {
                id: row.user_id,
                email: row.user_email,
                username: row.user_username,
                password: row.user_password,
                role: row.user_role,
            },
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// UserRequest
///
/// Body of `POST /api/users` and `PUT /api/users/{id}`.
/// `password` is only honoured on creation; a replace always keeps the stored hash.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserRequest {
    #[serde(default)]
    pub email: String,
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub role: Role,
}

impl UserRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut violations = Vec::new();
        if self.email.trim().is_empty() {
            violations.push("email must not be empty".to_string());
        } else if !is_well_formed_email(&self.email) {
            violations.push("email must be a well-formed email address".to_string());
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationFailed(violations))
        }
    }
}

/// OwnerRef
///
/// Reference to the owning user inside a post payload. A fully embedded user
/// object is accepted as well; only its `id` is read.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct OwnerRef {
    pub id: i64,
}

/// PostRequest
///
/// Body of `POST /api/posts`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub user: OwnerRef,
}

impl PostRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut violations = Vec::new();
        if self.title.trim().is_empty() {
            violations.push("title must not be empty".to_string());
        }
        if self.content.trim().is_empty() {
            violations.push("content must not be empty".to_string());
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationFailed(violations))
        }
    }
}

/// ChangePasswordParams
///
/// Query string of `PUT /api/users/{id}/changePassword`.
#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordParams {
    /// Current password. Required unless the caller is an administrator.
    pub old_password: Option<String>,
    pub new_password: String,
}

/// EmailParams
///
/// Query string shared by `/api/users/search` and `/api/users/findByEmail`.
#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmailParams {
    pub email: String,
}

// Single '@', non-empty local part and domain, no whitespace.
fn is_well_formed_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
