//! Business services built on top of the provisioned handles.
use std::{sync::Arc, time::Duration};

use crate::{
    core::{
        auth::{self, AuthError},
        error::ApiError,
        provisioner::Feature,
    },
    ports::{
        cache::Cache,
        repository::{Group, Post, Repository, User},
    },
};

/// Lifetime of cached user records
pub const USER_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

fn user_cache_key(id: i64) -> String {
    format!("users:{id}")
}

/// User lookups with an optional cache-aside layer.
///
/// Cache failures never fail a request: they are logged and the repository
/// answers instead.
#[derive(Clone)]
pub struct UserService {
    repository: Arc<dyn Repository>,
    cache: Feature<Arc<dyn Cache>>,
}

impl UserService {
    pub fn new(repository: Arc<dyn Repository>, cache: Feature<Arc<dyn Cache>>) -> Self {
        Self { repository, cache }
    }

    pub async fn list(&self) -> Result<Vec<User>, ApiError> {
        Ok(self.repository.list_users().await?)
    }

    pub async fn get(&self, id: i64) -> Result<Option<User>, ApiError> {
        let key = user_cache_key(id);

        if let Feature::Enabled(cache) = &self.cache {
            match cache.get(&key).await {
                Ok(Some(cached)) => match serde_json::from_str::<User>(&cached) {
                    Ok(user) => return Ok(Some(user)),
                    Err(e) => tracing::warn!(%key, error = %e, "Discarding malformed cache entry"),
                },
                Ok(None) => {}
                Err(e) => tracing::warn!(%key, error = %e, "Cache read failed, using repository"),
            }
        }

        let user = self.repository.find_user(id).await?;

        if let (Feature::Enabled(cache), Some(user)) = (&self.cache, &user) {
            match serde_json::to_string(user) {
                Ok(value) => {
                    if let Err(e) = cache.set_ex(&key, &value, USER_CACHE_TTL).await {
                        tracing::warn!(%key, error = %e, "Cache write failed");
                    }
                }
                Err(e) => tracing::warn!(%key, error = %e, "Failed to encode user for cache"),
            }
        }

        Ok(user)
    }

    /// Check a login name and password; unknown users and wrong passwords are
    /// indistinguishable to the caller.
    pub async fn authenticate(&self, name: &str, password: &str) -> Result<User, ApiError> {
        let Some(credentials) = self.repository.find_credentials(name).await? else {
            return Err(ApiError::Unauthorized(AuthError::InvalidCredentials.to_string()));
        };
        let Some(hash) = credentials.password_hash else {
            return Err(ApiError::Unauthorized(AuthError::InvalidCredentials.to_string()));
        };

        // argon2 verification is CPU bound
        let password = password.to_string();
        let verified = tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
            .await
            .map_err(|e| ApiError::Internal(format!("password verification task failed: {e}")))?;

        match verified {
            Ok(true) => Ok(credentials.user),
            Ok(false) => Err(ApiError::Unauthorized(AuthError::InvalidCredentials.to_string())),
            Err(e) => Err(ApiError::Internal(e.to_string())),
        }
    }
}

#[derive(Clone)]
pub struct GroupService {
    repository: Arc<dyn Repository>,
}

impl GroupService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    pub async fn list(&self) -> Result<Vec<Group>, ApiError> {
        Ok(self.repository.list_groups().await?)
    }
}

#[derive(Clone)]
pub struct PostService {
    repository: Arc<dyn Repository>,
}

impl PostService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    pub async fn list(&self) -> Result<Vec<Post>, ApiError> {
        Ok(self.repository.list_posts().await?)
    }
}

/// The services that close over the storage and cache handles.
#[derive(Clone)]
pub struct BusinessServices {
    pub users: UserService,
    pub groups: GroupService,
    pub posts: PostService,
}

impl BusinessServices {
    pub fn new(repository: Arc<dyn Repository>, cache: Feature<Arc<dyn Cache>>) -> Self {
        Self {
            users: UserService::new(repository.clone(), cache),
            groups: GroupService::new(repository.clone()),
            posts: PostService::new(repository),
        }
    }
}
