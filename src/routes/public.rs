use crate::{AppState, handlers::posts};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints served to anonymous and authenticated callers alike.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /api/posts  - every post with its owner.
        // POST /api/posts - create a post for the referenced owner (no caller check).
        .route("/api/posts", get(posts::get_posts).post(posts::create_post))
}
