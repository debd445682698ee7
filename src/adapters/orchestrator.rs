//! Kubernetes client backed by reflector caches.
use std::{collections::HashMap, fmt::Debug, time::Duration};

use async_trait::async_trait;
use futures_util::StreamExt;
use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{ConfigMap, Namespace, Pod, Service},
};
use kube::{
    Api, Client, Resource, ResourceExt,
    runtime::{WatchStreamExt, reflector, reflector::Store, watcher},
};
use serde::de::DeserializeOwned;
use tokio::{sync::RwLock, task::JoinHandle, time::timeout};

use crate::{
    config::KubeConfig,
    ports::orchestrator::{
        ObjectSummary, Orchestrator, OrchestratorError, OrchestratorResult, ResourceKind,
    },
};

/// Reader half of one reflector, per supported kind
#[derive(Clone)]
enum CachedStore {
    Namespaces(Store<Namespace>),
    Pods(Store<Pod>),
    Services(Store<Service>),
    Deployments(Store<Deployment>),
    ConfigMaps(Store<ConfigMap>),
}

impl CachedStore {
    async fn wait_until_ready(&self) -> bool {
        let ready = match self {
            CachedStore::Namespaces(store) => store.wait_until_ready().await,
            CachedStore::Pods(store) => store.wait_until_ready().await,
            CachedStore::Services(store) => store.wait_until_ready().await,
            CachedStore::Deployments(store) => store.wait_until_ready().await,
            CachedStore::ConfigMaps(store) => store.wait_until_ready().await,
        };
        ready.is_ok()
    }

    fn summaries(&self, kind: ResourceKind, namespace: Option<&str>) -> Vec<ObjectSummary> {
        let mut items = match self {
            CachedStore::Namespaces(store) => summarize(kind, store, namespace),
            CachedStore::Pods(store) => summarize(kind, store, namespace),
            CachedStore::Services(store) => summarize(kind, store, namespace),
            CachedStore::Deployments(store) => summarize(kind, store, namespace),
            CachedStore::ConfigMaps(store) => summarize(kind, store, namespace),
        };
        items.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
        items
    }
}

fn summarize<K>(kind: ResourceKind, store: &Store<K>, namespace: Option<&str>) -> Vec<ObjectSummary>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    store
        .state()
        .iter()
        .filter(|object| namespace.is_none() || object.namespace().as_deref() == namespace)
        .map(|object| object_summary(kind, object.as_ref()))
        .collect()
}

/// Flatten object metadata
pub fn object_summary<K: Resource>(kind: ResourceKind, object: &K) -> ObjectSummary {
    let meta = object.meta();
    ObjectSummary {
        kind,
        name: meta.name.clone().unwrap_or_default(),
        namespace: meta.namespace.clone(),
        created_at: meta
            .creation_timestamp
            .as_ref()
            .map(|time| time.0.to_rfc3339()),
    }
}

fn reflect<K>(client: &Client) -> (Store<K>, JoinHandle<()>)
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    let api: Api<K> = Api::all(client.clone());
    let (reader, writer) = reflector::store();
    let stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .applied_objects();

    let handle = tokio::spawn(async move {
        stream
            .for_each(|event| async move {
                if let Err(e) = event {
                    tracing::warn!(error = %e, "Watch stream error");
                }
            })
            .await;
    });
    (reader, handle)
}

/// Parse the configured kinds, dropping duplicates.
pub fn watched_kinds(config: &KubeConfig) -> OrchestratorResult<Vec<ResourceKind>> {
    let mut kinds = Vec::new();
    for raw in &config.watch_resources {
        let kind: ResourceKind = raw.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

pub struct KubeClient {
    client: Client,
    watched: Vec<ResourceKind>,
    sync_timeout: Duration,
    stores: RwLock<HashMap<ResourceKind, CachedStore>>,
    tasks: RwLock<Vec<JoinHandle<()>>>,
}

impl KubeClient {
    /// Infer the cluster configuration and check the API server answers.
    pub async fn connect(config: &KubeConfig) -> OrchestratorResult<Self> {
        let watched = watched_kinds(config)?;
        let client = Client::try_default()
            .await
            .map_err(|e| OrchestratorError::Connection(e.to_string()))?;
        let version = client
            .apiserver_version()
            .await
            .map_err(|e| OrchestratorError::Connection(e.to_string()))?;
        tracing::info!(version = %version.git_version, "Connected to cluster");

        Ok(Self {
            client,
            watched,
            sync_timeout: Duration::from_secs(config.cache_sync_timeout_secs),
            stores: RwLock::new(HashMap::new()),
            tasks: RwLock::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Orchestrator for KubeClient {
    async fn start_cache(&self) -> OrchestratorResult<()> {
        let mut stores = self.stores.write().await;
        let mut tasks = self.tasks.write().await;

        for kind in &self.watched {
            if stores.contains_key(kind) {
                continue;
            }
            let (store, handle) = match kind {
                ResourceKind::Namespaces => {
                    let (store, handle) = reflect::<Namespace>(&self.client);
                    (CachedStore::Namespaces(store), handle)
                }
                ResourceKind::Pods => {
                    let (store, handle) = reflect::<Pod>(&self.client);
                    (CachedStore::Pods(store), handle)
                }
                ResourceKind::Services => {
                    let (store, handle) = reflect::<Service>(&self.client);
                    (CachedStore::Services(store), handle)
                }
                ResourceKind::Deployments => {
                    let (store, handle) = reflect::<Deployment>(&self.client);
                    (CachedStore::Deployments(store), handle)
                }
                ResourceKind::ConfigMaps => {
                    let (store, handle) = reflect::<ConfigMap>(&self.client);
                    (CachedStore::ConfigMaps(store), handle)
                }
            };
            stores.insert(*kind, store);
            tasks.push(handle);
        }

        for (kind, store) in stores.iter() {
            match timeout(self.sync_timeout, store.wait_until_ready()).await {
                Ok(true) => tracing::debug!(%kind, "Cache synced"),
                Ok(false) => {
                    return Err(OrchestratorError::CacheSync {
                        kind: *kind,
                        message: "watcher stopped".to_string(),
                    });
                }
                Err(_) => {
                    return Err(OrchestratorError::CacheSync {
                        kind: *kind,
                        message: format!("not ready after {:?}", self.sync_timeout),
                    });
                }
            }
        }
        Ok(())
    }

    fn watched(&self) -> Vec<ResourceKind> {
        self.watched.clone()
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
    ) -> OrchestratorResult<Vec<ObjectSummary>> {
        let stores = self.stores.read().await;
        let store = stores
            .get(&kind)
            .ok_or_else(|| OrchestratorError::NotWatched(kind.to_string()))?;
        Ok(store.summaries(kind, namespace))
    }

    async fn close(&self) -> OrchestratorResult<()> {
        let mut tasks = self.tasks.write().await;
        for task in tasks.drain(..) {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

    use super::*;

    #[test]
    fn test_watched_kinds() {
        let config = KubeConfig {
            watch_resources: vec!["pods".into(), "Pod".into(), "configmaps".into()],
            ..Default::default()
        };
        assert_eq!(
            watched_kinds(&config).unwrap(),
            vec![ResourceKind::Pods, ResourceKind::ConfigMaps]
        );

        let config = KubeConfig {
            watch_resources: vec!["secrets".into()],
            ..Default::default()
        };
        assert!(matches!(
            watched_kinds(&config),
            Err(OrchestratorError::NotWatched(kind)) if kind == "secrets"
        ));
    }

    #[test]
    fn test_object_summary() {
        let created = chrono::DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("web-0".to_string()),
                namespace: Some("shop".to_string()),
                creation_timestamp: Some(Time(created)),
                ..Default::default()
            },
            ..Default::default()
        };

        let summary = object_summary(ResourceKind::Pods, &pod);
        assert_eq!(summary.name, "web-0");
        assert_eq!(summary.namespace.as_deref(), Some("shop"));
        assert_eq!(summary.created_at.as_deref(), Some("2024-05-01T10:00:00+00:00"));
    }
}
