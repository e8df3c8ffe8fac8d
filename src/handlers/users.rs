use axum::{extract::State, http::StatusCode};

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    extract::{Json, Path, Query},
    models::{ChangePasswordParams, EmailParams, User, UserRequest},
    password,
    policy::{self, ListScope},
};

/// list_users
///
/// [Users Route] Every user for an ADMIN; only the caller's own record for a USER.
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    security(("bearer" = [])),
    responses((status = 200, description = "Visible users", body = [User]))
)]
pub async fn list_users(
    caller: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = match policy::list_scope(&caller) {
        ListScope::All => state.repo.find_all_users().await?,
        ListScope::Own(email) => state.repo.find_all_users_by_email(&email).await?,
    };
    Ok(Json(users))
}

/// search_users
///
/// [Users Route] Users whose email contains `email`, scoped like [`list_users`]:
/// a USER only ever sees a match that is exactly their own email.
#[utoipa::path(
    get,
    path = "/api/users/search",
    tag = "users",
    params(EmailParams),
    security(("bearer" = [])),
    responses((status = 200, description = "Matching users", body = [User]))
)]
pub async fn search_users(
    caller: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<EmailParams>,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = match policy::list_scope(&caller) {
        ListScope::All => state.repo.find_users_by_email_contains(&params.email).await?,
        ListScope::Own(own) => {
            state
                .repo
                .find_users_by_email_contains_and_email(&params.email, &own)
                .await?
        }
    };
    Ok(Json(users))
}

/// find_by_email
///
/// [Users Route] Exact email lookup. A USER may only ask for their own email;
/// that is decided before the store is consulted.
#[utoipa::path(
    get,
    path = "/api/users/findByEmail",
    tag = "users",
    params(EmailParams),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Found", body = User),
        (status = 403, description = "Not yours", body = crate::error::ErrorBody),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn find_by_email(
    caller: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<EmailParams>,
) -> Result<Json<User>, ApiError> {
    policy::find_by_email(&caller, &params.email).require()?;
    state
        .repo
        .find_user_by_email(&params.email)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User", "email", &params.email))
}

/// get_user
///
/// [Users Route] Lookup by id. Existence is checked first (404), then ownership
/// against the loaded record (403).
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Found", body = User),
        (status = 403, description = "Not yours", body = crate::error::ErrorBody),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn get_user(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .repo
        .find_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", "id", id))?;
    policy::read_user(&caller, &user.email).require()?;
    Ok(Json(user))
}

/// create_user
///
/// [Admin Route] Stores a new user, role included. A supplied password is hashed.
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = UserRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Created", body = User),
        (status = 400, description = "Invalid user", body = crate::error::ErrorBody),
        (status = 403, description = "Not an admin", body = crate::error::ErrorBody)
    )
)]
pub async fn create_user(
    caller: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UserRequest>,
) -> Result<Json<User>, ApiError> {
    policy::manage_users(&caller).require()?;
    payload.validate()?;

    if state.repo.exists_user_by_email(&payload.email).await? {
        return Err(ApiError::validation("email is already in use"));
    }

    let password = match payload.password.as_deref() {
        Some(plain) => {
            password::check_length(plain)?;
            Some(password::hash_password(plain)?)
        }
        None => None,
    };

    let created = state
        .repo
        .insert_user(User {
            id: 0,
            email: payload.email,
            username: payload.username,
            password,
            role: payload.role,
        })
        .await?;

    tracing::info!(admin = %caller.email, user_id = created.id, role = %created.role, "user created");
    Ok(Json(created))
}

/// update_user
///
/// [Admin Route] Full replace of user `id` from the payload. The stored password
/// hash is always carried over; any password in the payload is ignored.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UserRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 403, description = "Not an admin", body = crate::error::ErrorBody),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn update_user(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UserRequest>,
) -> Result<Json<User>, ApiError> {
    policy::manage_users(&caller).require()?;
    payload.validate()?;

    let existing = state
        .repo
        .find_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", "id", id))?;

    if payload.email != existing.email && state.repo.exists_user_by_email(&payload.email).await? {
        return Err(ApiError::validation("email is already in use"));
    }

    let replacement = User {
        id,
        email: payload.email,
        username: payload.username,
        password: existing.password,
        role: payload.role,
    };

    let updated = state
        .repo
        .update_user(replacement)
        .await?
        .ok_or_else(|| ApiError::not_found("User", "id", id))?;

    tracing::info!(admin = %caller.email, user_id = id, "user replaced");
    Ok(Json(updated))
}

/// delete_user
///
/// [Admin Route] Deletes user `id` together with all of its posts.
/// A missing user is a 404, never a silent success.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not an admin", body = crate::error::ErrorBody),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn delete_user(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    policy::manage_users(&caller).require()?;

    if !state.repo.exists_user_by_id(id).await? {
        return Err(ApiError::not_found("User", "id", id));
    }
    // The row can vanish between the check and the delete.
    if !state.repo.delete_user(id).await? {
        return Err(ApiError::not_found("User", "id", id));
    }

    tracing::info!(admin = %caller.email, user_id = id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// change_password
///
/// [Users Route] ADMIN, or the target user supplying their current password.
/// When no current password is given (only reachable by an ADMIN) the match
/// check is skipped.
#[utoipa::path(
    put,
    path = "/api/users/{id}/changePassword",
    tag = "users",
    params(("id" = i64, Path, description = "User ID"), ChangePasswordParams),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Too short or current password mismatch", body = crate::error::ErrorBody),
        (status = 403, description = "Not allowed", body = crate::error::ErrorBody),
        (status = 404, description = "Not Found", body = crate::error::ErrorBody)
    )
)]
pub async fn change_password(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<ChangePasswordParams>,
) -> Result<StatusCode, ApiError> {
    let target = state.repo.find_user_by_id(id).await?;
    let old_password = params.old_password.as_deref().filter(|p| !p.is_empty());

    policy::change_password(
        &caller,
        target.as_ref().map(|user| user.email.as_str()),
        old_password,
    )
    .require()?;

    let target = target.ok_or_else(|| ApiError::not_found("User", "id", id))?;
    password::check_length(&params.new_password)?;

    if let Some(old) = old_password {
        let matches = target
            .password
            .as_deref()
            .is_some_and(|hash| password::verify_password(old, hash));
        if !matches {
            return Err(ApiError::validation("old password doesn't match"));
        }
    }

    let hash = password::hash_password(&params.new_password)?;
    if !state.repo.update_password(id, &hash).await? {
        return Err(ApiError::not_found("User", "id", id));
    }

    tracing::info!(principal = %caller.email, user_id = id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}
