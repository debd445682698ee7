use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Error type for storage operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StorageError {
    /// The backend could not be reached or refused the connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// A schema migration failed
    #[error("Migration error: {0}")]
    Migration(String),

    /// A query failed
    #[error("Query error: {0}")]
    Query(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Role given to the seeded administrator
pub const ADMIN_ROLE: &str = "admin";
/// Role given to every other user
pub const MEMBER_ROLE: &str = "member";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// A user together with the stored password hash. Never serialized.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Repository defines the port (interface) for the relational store.
///
/// Implementations must be safe for concurrent use by many request handlers.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Create or upgrade the schema
    async fn migrate(&self) -> StorageResult<()>;

    /// Seed baseline rows. Seeding is idempotent; the admin user is only
    /// created when a password hash is given and no admin exists yet.
    async fn init(&self, admin_password_hash: Option<&str>) -> StorageResult<()>;

    /// Lightweight round-trip used for readiness
    async fn ping(&self) -> StorageResult<()>;

    /// Release the connection pool
    async fn close(&self) -> StorageResult<()>;

    async fn list_users(&self) -> StorageResult<Vec<User>>;

    async fn find_user(&self, id: i64) -> StorageResult<Option<User>>;

    /// Look up a user by login name, including the password hash
    async fn find_credentials(&self, name: &str) -> StorageResult<Option<UserCredentials>>;

    async fn list_groups(&self) -> StorageResult<Vec<Group>>;

    async fn list_posts(&self) -> StorageResult<Vec<Post>>;
}
