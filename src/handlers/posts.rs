use axum::{extract::State, http::StatusCode};

use crate::{
    AppState,
    error::ApiError,
    extract::Json,
    models::{Post, PostRequest},
};

/// get_posts
///
/// [Public Route] Lists every post with its owner materialized.
///
/// Store failures surface as 500 unless `posts_fail_soft` is configured, in which
/// case they are logged and an empty list is returned.
#[utoipa::path(
    get,
    path = "/api/posts",
    tag = "posts",
    responses(
        (status = 200, description = "All posts", body = [Post]),
        (status = 500, description = "Store failure", body = crate::error::ErrorBody)
    )
)]
pub async fn get_posts(State(state): State<AppState>) -> Result<Json<Vec<Post>>, ApiError> {
    match state.repo.find_all_posts().await {
        Ok(posts) => Ok(Json(posts)),
        Err(e) if state.config.posts_fail_soft => {
            tracing::error!("get_posts error (swallowed): {:?}", e);
            Ok(Json(Vec::new()))
        }
        Err(e) => Err(e.into()),
    }
}

/// create_post
///
/// [Public Route] Stores a post for the referenced owner. The caller is not
/// checked against the owner.
#[utoipa::path(
    post,
    path = "/api/posts",
    tag = "posts",
    request_body = PostRequest,
    responses(
        (status = 204, description = "Created"),
        (status = 400, description = "Invalid post", body = crate::error::ErrorBody),
        (status = 404, description = "Owner not found", body = crate::error::ErrorBody)
    )
)]
pub async fn create_post(
    State(state): State<AppState>,
    Json(payload): Json<PostRequest>,
) -> Result<StatusCode, ApiError> {
    match persist_post(&state, payload).await {
        Ok(post) => {
            tracing::info!(owner_id = post.user.id, post_id = post.id, "post created");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) if state.config.posts_fail_soft => {
            tracing::error!("create_post error (swallowed): {}", e);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => Err(e),
    }
}

async fn persist_post(state: &AppState, payload: PostRequest) -> Result<Post, ApiError> {
    payload.validate()?;
    let owner_id = payload.user.id;
    if !state.repo.exists_user_by_id(owner_id).await? {
        return Err(ApiError::not_found("User", "id", owner_id));
    }
    Ok(state.repo.insert_post(payload).await?)
}
