//! Authentication and authorization stages.
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    core::{
        auth::{self, AuthError, Identity, JwtService},
        error::ApiError,
        pipeline::{Interceptor, Stage},
        request_info::{RequestInfo, RequestInfoFactory},
        services::UserService,
    },
    ports::authorization::{Authorizer, Decision},
};

/// Resolves the bearer token to an [`Identity`].
///
/// Public paths continue as [`Identity::Anonymous`]. The identity is attached to
/// the request for later stages and to the response for the access log.
pub struct AuthenticationInterceptor {
    jwt: Arc<JwtService>,
    users: UserService,
}

impl AuthenticationInterceptor {
    pub fn new(jwt: Arc<JwtService>, users: UserService) -> Self {
        Self { jwt, users }
    }

    async fn identify(&self, headers: &HeaderMap) -> Result<Identity, ApiError> {
        let unauthorized = |e: AuthError| ApiError::Unauthorized(e.to_string());

        let token =
            auth::bearer_token(headers).ok_or_else(|| unauthorized(AuthError::MissingToken))?;
        let claims = self.jwt.verify(token).map_err(unauthorized)?;
        let id: i64 = claims
            .sub
            .parse()
            .map_err(|_| unauthorized(AuthError::InvalidToken("malformed subject".to_string())))?;

        match self.users.get(id).await? {
            Some(user) => Ok(Identity::from_user(&user)),
            None => Err(unauthorized(AuthError::InvalidToken(format!(
                "user {id} no longer exists"
            )))),
        }
    }
}

#[async_trait]
impl Interceptor for AuthenticationInterceptor {
    fn stage(&self) -> Stage {
        Stage::Authentication
    }

    async fn intercept(&self, mut req: Request, next: Next) -> Response {
        let identity = if auth::is_public_path(req.uri().path()) {
            Identity::Anonymous
        } else {
            match self.identify(req.headers()).await {
                Ok(identity) => identity,
                Err(e) => {
                    tracing::debug!(path = %req.uri().path(), error = %e, "Authentication failed");
                    return e.into_response();
                }
            }
        };

        req.extensions_mut().insert(identity.clone());
        let mut response = next.run(req).await;
        response.extensions_mut().insert(identity);
        response
    }
}

/// Applies the [`Authorizer`] policy to the authenticated identity.
pub struct AuthorizationInterceptor {
    authorizer: Arc<dyn Authorizer>,
    factory: RequestInfoFactory,
}

impl AuthorizationInterceptor {
    pub fn new(authorizer: Arc<dyn Authorizer>, factory: RequestInfoFactory) -> Self {
        Self { authorizer, factory }
    }
}

#[async_trait]
impl Interceptor for AuthorizationInterceptor {
    fn stage(&self) -> Stage {
        Stage::Authorization
    }

    async fn intercept(&self, req: Request, next: Next) -> Response {
        if auth::is_public_path(req.uri().path()) {
            return next.run(req).await;
        }

        let identity = req
            .extensions()
            .get::<Identity>()
            .cloned()
            .unwrap_or(Identity::Anonymous);
        let info = match req.extensions().get::<RequestInfo>() {
            Some(info) => info.clone(),
            None => self.factory.parse(req.method(), req.uri().path()),
        };

        match self.authorizer.authorize(&identity, &info) {
            Decision::Allow => next.run(req).await,
            Decision::Deny(reason) => {
                tracing::info!(user = identity.name(), verb = %info.verb, path = %info.path, %reason, "Request denied");
                ApiError::Forbidden(reason).into_response()
            }
        }
    }
}
