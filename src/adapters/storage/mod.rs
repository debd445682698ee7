//! Relational storage over sea-orm, shared by the postgres, mysql and sqlite
//! backends.
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use sea_orm_migration::MigratorTrait;

use crate::{
    config::{DbConfig, StorageKind},
    ports::repository::{
        ADMIN_ROLE, Group, Post, Repository, StorageError, StorageResult, User, UserCredentials,
    },
};

pub mod entities;
pub mod migration;

use entities::{group, post, user};
use migration::Migrator;

/// Name of the group every installation starts with
pub const ROOT_GROUP: &str = "root";
/// Login of the seeded administrator
pub const ADMIN_USER: &str = "admin";

const MEMORY_DATABASE: &str = ":memory:";

/// Build the connection URL for `kind` from its configuration section.
pub fn connection_url(kind: StorageKind, config: &DbConfig) -> String {
    let credentials = || {
        if config.user.is_empty() {
            String::new()
        } else if config.password.is_empty() {
            format!("{}@", urlencoding::encode(&config.user))
        } else {
            format!(
                "{}:{}@",
                urlencoding::encode(&config.user),
                urlencoding::encode(&config.password)
            )
        }
    };
    let port = |default: u16| if config.port == 0 { default } else { config.port };

    match kind {
        StorageKind::Postgres => format!(
            "postgres://{}{}:{}/{}",
            credentials(),
            config.host,
            port(5432),
            config.name
        ),
        StorageKind::Mysql => format!(
            "mysql://{}{}:{}/{}",
            credentials(),
            config.host,
            port(3306),
            config.name
        ),
        StorageKind::Sqlite if config.file == MEMORY_DATABASE => "sqlite::memory:".to_string(),
        StorageKind::Sqlite => format!("sqlite://{}?mode=rwc", config.file),
    }
}

fn query_error(e: DbErr) -> StorageError {
    StorageError::Query(e.to_string())
}

fn to_utc(timestamp: DateTime<FixedOffset>) -> DateTime<Utc> {
    timestamp.with_timezone(&Utc)
}

fn now() -> DateTime<FixedOffset> {
    Utc::now().fixed_offset()
}

impl From<user::Model> for User {
    fn from(model: user::Model) -> Self {
        User {
            id: i64::from(model.id),
            name: model.name,
            email: model.email,
            avatar: model.avatar,
            role: model.role,
            created_at: to_utc(model.created_at),
        }
    }
}

impl From<group::Model> for Group {
    fn from(model: group::Model) -> Self {
        Group {
            id: i64::from(model.id),
            name: model.name,
            description: model.description,
            created_at: to_utc(model.created_at),
        }
    }
}

impl From<post::Model> for Post {
    fn from(model: post::Model) -> Self {
        Post {
            id: i64::from(model.id),
            title: model.title,
            content: model.content,
            author_id: i64::from(model.author_id),
            created_at: to_utc(model.created_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeaOrmRepository {
    kind: StorageKind,
    db: DatabaseConnection,
}

impl SeaOrmRepository {
    pub async fn connect(kind: StorageKind, config: &DbConfig) -> StorageResult<Self> {
        let url = connection_url(kind, config);
        let mut options = ConnectOptions::new(url);
        // every in-memory sqlite connection is its own database
        let max_connections = if kind == StorageKind::Sqlite && config.file == MEMORY_DATABASE {
            1
        } else {
            config.max_connections.max(1)
        };
        options
            .max_connections(max_connections)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs.max(1) * 2))
            .sqlx_logging(false);

        tracing::debug!(%kind, host = %config.host, name = %config.name, "Connecting to storage");
        let db = Database::connect(options)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self { kind, db })
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    async fn ensure_root_group(&self) -> StorageResult<()> {
        let existing = group::Entity::find()
            .filter(group::Column::Name.eq(ROOT_GROUP))
            .one(&self.db)
            .await
            .map_err(query_error)?;
        if existing.is_some() {
            return Ok(());
        }

        group::ActiveModel {
            name: Set(ROOT_GROUP.to_string()),
            description: Set(Some("Default group".to_string())),
            created_at: Set(now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(query_error)?;
        tracing::info!(group = ROOT_GROUP, "Seeded group");
        Ok(())
    }

    async fn ensure_admin(&self, password_hash: &str) -> StorageResult<()> {
        let admins = user::Entity::find()
            .filter(user::Column::Role.eq(ADMIN_ROLE))
            .count(&self.db)
            .await
            .map_err(query_error)?;
        if admins > 0 {
            return Ok(());
        }

        user::ActiveModel {
            name: Set(ADMIN_USER.to_string()),
            email: Set(None),
            avatar: Set(None),
            role: Set(ADMIN_ROLE.to_string()),
            password_hash: Set(Some(password_hash.to_string())),
            created_at: Set(now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(query_error)?;
        tracing::info!(user = ADMIN_USER, "Seeded administrator");
        Ok(())
    }
}

#[async_trait]
impl Repository for SeaOrmRepository {
    async fn migrate(&self) -> StorageResult<()> {
        Migrator::up(&self.db, None)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))
    }

    async fn init(&self, admin_password_hash: Option<&str>) -> StorageResult<()> {
        self.ensure_root_group().await?;
        if let Some(hash) = admin_password_hash {
            self.ensure_admin(hash).await?;
        }
        Ok(())
    }

    async fn ping(&self) -> StorageResult<()> {
        self.db
            .ping()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    async fn close(&self) -> StorageResult<()> {
        // clones share one pool
        self.db
            .clone()
            .close()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    async fn list_users(&self) -> StorageResult<Vec<User>> {
        let users = user::Entity::find()
            .order_by_asc(user::Column::Id)
            .all(&self.db)
            .await
            .map_err(query_error)?;
        Ok(users.into_iter().map(User::from).collect())
    }

    async fn find_user(&self, id: i64) -> StorageResult<Option<User>> {
        let Ok(id) = i32::try_from(id) else {
            return Ok(None);
        };
        let user = user::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(query_error)?;
        Ok(user.map(User::from))
    }

    async fn find_credentials(&self, name: &str) -> StorageResult<Option<UserCredentials>> {
        let model = user::Entity::find()
            .filter(user::Column::Name.eq(name))
            .one(&self.db)
            .await
            .map_err(query_error)?;
        Ok(model.map(|model| {
            let password_hash = model.password_hash.clone();
            UserCredentials {
                user: User::from(model),
                password_hash,
            }
        }))
    }

    async fn list_groups(&self) -> StorageResult<Vec<Group>> {
        let groups = group::Entity::find()
            .order_by_asc(group::Column::Id)
            .all(&self.db)
            .await
            .map_err(query_error)?;
        Ok(groups.into_iter().map(Group::from).collect())
    }

    async fn list_posts(&self) -> StorageResult<Vec<Post>> {
        let posts = post::Entity::find()
            .order_by_desc(post::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(query_error)?;
        Ok(posts.into_iter().map(Post::from).collect())
    }
}
