use axum::{Json, extract::State, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    core::{
        AppState, ControllerRegistration,
        error::{ApiError, ErrorBody},
        registry::ControllerRoutes,
    },
    ports::repository::Post,
};

pub static POSTS_TAG: &str = "posts";

#[derive(Debug, Serialize, ToSchema)]
pub struct PostList {
    pub items: Vec<Post>,
}

pub fn registration() -> ControllerRegistration<AppState> {
    ControllerRegistration::new("posts", |routes: ControllerRoutes<AppState>| {
        routes.route("/posts", get(list_posts))
    })
}

/// Newest first.
#[utoipa::path(
    get,
    path = "/api/v1/posts",
    tag = POSTS_TAG,
    responses(
        (status = 200, description = "All posts", body = PostList),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn list_posts(State(state): State<AppState>) -> Result<Json<PostList>, ApiError> {
    let items = state.deps.services.posts.list().await?;
    Ok(Json(PostList { items }))
}
