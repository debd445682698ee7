use axum::{
    Json,
    extract::{Path, State},
    routing::get,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    core::{
        AppState, ControllerRegistration,
        error::{ApiError, ErrorBody},
        registry::ControllerRoutes,
    },
    ports::repository::User,
};

pub static USERS_TAG: &str = "users";

#[derive(Debug, Serialize, ToSchema)]
pub struct UserList {
    pub items: Vec<User>,
}

pub fn registration() -> ControllerRegistration<AppState> {
    ControllerRegistration::new("users", bind)
}

fn bind(routes: ControllerRoutes<AppState>) -> ControllerRoutes<AppState> {
    routes
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user))
}

/// List every user.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = USERS_TAG,
    responses(
        (status = 200, description = "All users", body = UserList),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<UserList>, ApiError> {
    let items = state.deps.services.users.list().await?;
    Ok(Json(UserList { items }))
}

/// Fetch one user by id, through the cache when one is configured.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = USERS_TAG,
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "The user", body = User),
        (status = 404, description = "No such user", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    state
        .deps
        .services
        .users
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))
}
