use axum::{
    Extension, Form, Json,
    extract::{FromRequest, Request, State},
    http::header,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core::{
    AppState, ControllerRegistration,
    auth::Identity,
    error::{ApiError, ErrorBody},
    registry::ControllerRoutes,
};

pub static AUTH_TAG: &str = "auth";

#[derive(Debug, Deserialize, ToSchema)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Credentials posted either as JSON or as an urlencoded form.
pub struct Login(pub Credentials);

impl<S> FromRequest<S> for Login
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        let credentials = if is_json {
            Json::<Credentials>::from_request(req, state)
                .await
                .map(|Json(credentials)| credentials)
                .map_err(|e| ApiError::BadRequest(e.body_text()))?
        } else {
            Form::<Credentials>::from_request(req, state)
                .await
                .map(|Form(credentials)| credentials)
                .map_err(|e| ApiError::BadRequest(e.body_text()))?
        };
        Ok(Login(credentials))
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    /// Seconds until the token expires
    pub expires_in: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Provider {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderList {
    pub items: Vec<Provider>,
}

pub fn registration() -> ControllerRegistration<AppState> {
    ControllerRegistration::new("auth", bind)
}

fn bind(routes: ControllerRoutes<AppState>) -> ControllerRoutes<AppState> {
    routes
        .route("/auth/token", post(issue_token))
        .route("/auth/providers", get(list_providers))
        .route("/auth/me", get(current_identity))
}

/// Exchange a username and password for a bearer token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/token",
    tag = AUTH_TAG,
    request_body = Credentials,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Malformed credentials", body = ErrorBody),
        (status = 401, description = "Invalid username or password", body = ErrorBody)
    )
)]
pub async fn issue_token(
    State(state): State<AppState>,
    Login(credentials): Login,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = state
        .deps
        .services
        .users
        .authenticate(&credentials.username, &credentials.password)
        .await
        .inspect_err(|e| {
            tracing::info!(user = %credentials.username, error = %e, "Login rejected");
        })?;
    let token = state
        .jwt
        .issue(&user)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(user = %user.name, "Token issued");
    Ok(Json(TokenResponse {
        token,
        expires_in: state.jwt.ttl().as_secs(),
    }))
}

/// External identity providers, without their secrets.
#[utoipa::path(
    get,
    path = "/api/v1/auth/providers",
    tag = AUTH_TAG,
    responses((status = 200, description = "Configured providers", body = ProviderList))
)]
pub async fn list_providers(State(state): State<AppState>) -> Json<ProviderList> {
    let mut items: Vec<Provider> = state
        .config
        .oauth
        .iter()
        .map(|(name, provider)| Provider {
            name: name.clone(),
            kind: provider.auth_type.clone(),
        })
        .collect();
    items.sort_by(|a, b| a.name.cmp(&b.name));
    Json(ProviderList { items })
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = AUTH_TAG,
    responses(
        (status = 200, description = "The caller", body = Identity),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn current_identity(Extension(identity): Extension<Identity>) -> Json<Identity> {
    Json(identity)
}
