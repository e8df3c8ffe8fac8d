use crate::{AppState, handlers::users};
use axum::{
    Router,
    routing::{get, put},
};

/// Users Router Module
///
/// Everything under `/api/users`. The path gate admits ADMIN and USER principals;
/// each handler then applies its own rule from `crate::policy`.
pub fn users_routes() -> Router<AppState> {
    Router::new()
        // GET /api/users  - role-scoped listing.
        // POST /api/users - ADMIN creates a user.
        .route("/api/users", get(users::list_users).post(users::create_user))
        // GET /api/users/search?email=
        .route("/api/users/search", get(users::search_users))
        // GET /api/users/findByEmail?email=
        .route("/api/users/findByEmail", get(users::find_by_email))
        // GET/PUT/DELETE /api/users/{id}
        .route(
            "/api/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // PUT /api/users/{id}/changePassword?oldPassword=&newPassword=
        .route("/api/users/{id}/changePassword", put(users::change_password))
}
