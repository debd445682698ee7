//! In-process fakes for every external subsystem.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{Router, body::Body};
use chrono::Utc;
use http_body_util::BodyExt;
use keel::{
    AppParts, GracefulShutdown, ProvisionError, ProvisionedDependencies, SubsystemProvisioner,
    build_app,
    adapters::DiskDirectory,
    config::{AppConfig, DbConfig, DockerConfig, KubeConfig, RedisConfig, StorageKind},
    metrics::detached_handle,
    ports::{
        cache::{Cache, CacheError, CacheResult},
        container::{ContainerError, ContainerResult, ContainerRuntime, ContainerSummary},
        orchestrator::{
            ObjectSummary, Orchestrator, OrchestratorError, OrchestratorResult, ResourceKind,
        },
        repository::{
            ADMIN_ROLE, Group, Post, Repository, StorageError, StorageResult, User,
            UserCredentials,
        },
        subsystems::SubsystemConnector,
    },
};

pub const ADMIN_PASSWORD: &str = "changeme";
pub const JWT_SECRET: &str = "integration-secret";

/// Subsystem names in the order their `close` ran.
#[derive(Clone, Default)]
pub struct TeardownLog(Arc<Mutex<Vec<&'static str>>>);

impl TeardownLog {
    pub fn record(&self, subsystem: &'static str) {
        self.0.lock().unwrap().push(subsystem);
    }

    pub fn entries(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

/// What each fake should do.
#[derive(Clone, Default)]
pub struct Scenario {
    pub storage_unreachable: bool,
    pub cache_unreachable: bool,
    pub containers_unreachable: bool,
    pub orchestrator_unreachable: bool,
    pub orchestrator_cache_fails: bool,
    pub close_fails: bool,
}

pub struct FakeRepository {
    users: Mutex<Vec<UserCredentials>>,
    healthy: AtomicBool,
    close_fails: bool,
    pub migrations: AtomicUsize,
    pub user_lookups: AtomicUsize,
    log: TeardownLog,
}

impl FakeRepository {
    pub fn new(log: TeardownLog, close_fails: bool) -> Self {
        Self {
            users: Mutex::new(Vec::new()),
            healthy: AtomicBool::new(true),
            close_fails,
            migrations: AtomicUsize::new(0),
            user_lookups: AtomicUsize::new(0),
            log,
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn add_user(&self, name: &str, role: &str, password_hash: Option<String>) -> User {
        let mut users = self.users.lock().unwrap();
        let user = User {
            id: users.len() as i64 + 1,
            name: name.to_string(),
            email: None,
            avatar: None,
            role: role.to_string(),
            created_at: Utc::now(),
        };
        users.push(UserCredentials {
            user: user.clone(),
            password_hash,
        });
        user
    }
}

#[async_trait]
impl Repository for FakeRepository {
    async fn migrate(&self) -> StorageResult<()> {
        self.migrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn init(&self, admin_password_hash: Option<&str>) -> StorageResult<()> {
        let has_admin = self
            .users
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.user.role == ADMIN_ROLE);
        if let (Some(hash), false) = (admin_password_hash, has_admin) {
            self.add_user("admin", ADMIN_ROLE, Some(hash.to_string()));
        }
        Ok(())
    }

    async fn ping(&self) -> StorageResult<()> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Connection("database is down".to_string()))
        }
    }

    async fn close(&self) -> StorageResult<()> {
        self.log.record("storage");
        if self.close_fails {
            return Err(StorageError::Connection("close failed".to_string()));
        }
        Ok(())
    }

    async fn list_users(&self) -> StorageResult<Vec<User>> {
        Ok(self.users.lock().unwrap().iter().map(|c| c.user.clone()).collect())
    }

    async fn find_user(&self, id: i64) -> StorageResult<Option<User>> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.user.id == id)
            .map(|c| c.user.clone()))
    }

    async fn find_credentials(&self, name: &str) -> StorageResult<Option<UserCredentials>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.user.name == name)
            .cloned())
    }

    async fn list_groups(&self) -> StorageResult<Vec<Group>> {
        Ok(vec![Group {
            id: 1,
            name: "root".to_string(),
            description: None,
            created_at: Utc::now(),
        }])
    }

    async fn list_posts(&self) -> StorageResult<Vec<Post>> {
        Ok(Vec::new())
    }
}

pub struct FakeCache {
    entries: Mutex<HashMap<String, String>>,
    pub hits: AtomicUsize,
    close_fails: bool,
    log: TeardownLog,
}

impl FakeCache {
    pub fn new(log: TeardownLog, close_fails: bool) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            close_fails,
            log,
        }
    }
}

#[async_trait]
impl Cache for FakeCache {
    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let value = self.entries.lock().unwrap().get(key).cloned();
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, _ttl: Duration) -> CacheResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn close(&self) -> CacheResult<()> {
        self.log.record("cache");
        if self.close_fails {
            return Err(CacheError::Connection("close failed".to_string()));
        }
        Ok(())
    }
}

pub struct FakeContainers {
    close_fails: bool,
    log: TeardownLog,
}

#[async_trait]
impl ContainerRuntime for FakeContainers {
    async fn ping(&self) -> ContainerResult<()> {
        Ok(())
    }

    async fn list_containers(&self) -> ContainerResult<Vec<ContainerSummary>> {
        Ok(vec![ContainerSummary {
            id: "c0ffee".to_string(),
            names: vec!["web".to_string()],
            image: "nginx:1.27".to_string(),
            state: "running".to_string(),
            status: "Up 5 minutes".to_string(),
        }])
    }

    async fn close(&self) -> ContainerResult<()> {
        self.log.record("containers");
        if self.close_fails {
            return Err(ContainerError::Connection("close failed".to_string()));
        }
        Ok(())
    }
}

pub struct FakeOrchestrator {
    cache_fails: bool,
    close_fails: bool,
    log: TeardownLog,
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn start_cache(&self) -> OrchestratorResult<()> {
        if self.cache_fails {
            return Err(OrchestratorError::CacheSync {
                kind: ResourceKind::Pods,
                message: "not ready".to_string(),
            });
        }
        Ok(())
    }

    fn watched(&self) -> Vec<ResourceKind> {
        vec![ResourceKind::Namespaces, ResourceKind::Pods]
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
    ) -> OrchestratorResult<Vec<ObjectSummary>> {
        if !self.watched().contains(&kind) {
            return Err(OrchestratorError::NotWatched(kind.to_string()));
        }
        Ok(vec![ObjectSummary {
            kind,
            name: format!("{kind}-0"),
            namespace: namespace.map(str::to_string),
            created_at: None,
        }])
    }

    async fn close(&self) -> OrchestratorResult<()> {
        self.log.record("orchestrator");
        if self.close_fails {
            return Err(OrchestratorError::Connection("close failed".to_string()));
        }
        Ok(())
    }
}

pub struct FakeConnector {
    pub scenario: Scenario,
    pub log: TeardownLog,
    pub repository: Arc<FakeRepository>,
    pub cache: Arc<FakeCache>,
    pub storage_calls: AtomicUsize,
}

impl FakeConnector {
    pub fn new(scenario: Scenario) -> Self {
        let log = TeardownLog::default();
        Self {
            repository: Arc::new(FakeRepository::new(log.clone(), scenario.close_fails)),
            cache: Arc::new(FakeCache::new(log.clone(), scenario.close_fails)),
            scenario,
            log,
            storage_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SubsystemConnector for FakeConnector {
    async fn connect_storage(
        &self,
        _kind: StorageKind,
        _config: &DbConfig,
    ) -> Result<Arc<dyn Repository>, StorageError> {
        self.storage_calls.fetch_add(1, Ordering::SeqCst);
        if self.scenario.storage_unreachable {
            return Err(StorageError::Connection("connection refused".to_string()));
        }
        Ok(self.repository.clone() as Arc<dyn Repository>)
    }

    async fn connect_cache(&self, _config: &RedisConfig) -> Result<Arc<dyn Cache>, CacheError> {
        if self.scenario.cache_unreachable {
            return Err(CacheError::Connection("connection refused".to_string()));
        }
        Ok(self.cache.clone() as Arc<dyn Cache>)
    }

    async fn connect_container_runtime(
        &self,
        _config: &DockerConfig,
    ) -> Result<Arc<dyn ContainerRuntime>, ContainerError> {
        if self.scenario.containers_unreachable {
            return Err(ContainerError::Connection("no such socket".to_string()));
        }
        Ok(Arc::new(FakeContainers {
            close_fails: self.scenario.close_fails,
            log: self.log.clone(),
        }))
    }

    async fn connect_orchestrator(
        &self,
        _config: &KubeConfig,
    ) -> Result<Arc<dyn Orchestrator>, OrchestratorError> {
        if self.scenario.orchestrator_unreachable {
            return Err(OrchestratorError::Connection("no kubeconfig".to_string()));
        }
        Ok(Arc::new(FakeOrchestrator {
            cache_fails: self.scenario.orchestrator_cache_fails,
            close_fails: self.scenario.close_fails,
            log: self.log.clone(),
        }))
    }
}

/// Development-mode sqlite config serving assets from `static_dir`.
pub fn test_config(static_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.db_type = "sqlite".to_string();
    config.server.jwt_secret = JWT_SECRET.to_string();
    config.server.admin_password = Some(ADMIN_PASSWORD.to_string());
    config.server.static_dir = static_dir.display().to_string();
    config.sqlite.migrate = true;
    config
}

pub async fn provision(
    config: &AppConfig,
    connector: &FakeConnector,
) -> Result<ProvisionedDependencies, ProvisionError> {
    SubsystemProvisioner::new(config, connector).provision().await
}

/// A running application over fakes.
pub struct TestApp {
    pub router: Router,
    pub deps: Arc<ProvisionedDependencies>,
    pub shutdown: Arc<GracefulShutdown>,
}

pub async fn spawn_app(config: AppConfig, connector: &FakeConnector) -> TestApp {
    let deps = Arc::new(provision(&config, connector).await.unwrap());
    let shutdown = Arc::new(GracefulShutdown::new());
    let assets = Arc::new(DiskDirectory::new(&config.server.static_dir));
    let router = build_app(AppParts {
        config: Arc::new(config),
        deps: deps.clone(),
        assets,
        metrics: detached_handle(),
        shutdown: shutdown.subscribe(),
    })
    .unwrap();
    TestApp {
        router,
        deps,
        shutdown,
    }
}

pub async fn write_file(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.unwrap();
    }
    tokio::fs::write(path, content).await.unwrap();
}

pub async fn body_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
