//! Capability Registry: one merged snapshot of every known capability.
//!
//! The registry is built from:
//! 1. Definitions registered in the cluster (authoritative)
//! 2. Definitions installed in the local capability cache (supplementary)
//!
//! A snapshot is immutable. It is rebuilt from both sources for every query;
//! there is no incremental update path.

use std::collections::HashSet;

use super::cache::CapabilityCache;
use super::capability::{CapabilityDefinition, CapabilityKind};
use crate::error::PlaneError;
use crate::store::{ResourceStore, StoreError};

/// An immutable, merged view of workload and trait definitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityRegistry {
    workloads: Vec<CapabilityDefinition>,
    traits: Vec<CapabilityDefinition>,
}

impl CapabilityRegistry {
    /// Fetch both sources concurrently and merge them.
    ///
    /// A cluster failure is fatal. A cache failure is logged and the
    /// snapshot is built from cluster data alone.
    pub async fn load(
        store: &dyn ResourceStore,
        cache: &dyn CapabilityCache,
    ) -> Result<Self, PlaneError> {
        let (cluster, local) = tokio::join!(fetch_cluster(store), fetch_local(cache));

        let cluster = cluster.map_err(PlaneError::RegistryFetch)?;
        let local = match local {
            Ok(local) => local,
            Err(e) => {
                log::warn!(
                    "Local capability cache unavailable, continuing with cluster definitions only: {}",
                    e
                );
                Vec::new()
            }
        };

        let registry = Self::merge(cluster, local);
        log::debug!(
            "Capability registry loaded: {} workloads, {} traits",
            registry.workloads.len(),
            registry.traits.len()
        );
        Ok(registry)
    }

    /// Merge cluster-origin and local-cache-origin definitions.
    ///
    /// Names are unique per kind in the result. Cluster definitions come
    /// first in source order, followed by local-only definitions in source
    /// order. On a name collision the cluster definition is kept as-is.
    pub fn merge(cluster: Vec<CapabilityDefinition>, local: Vec<CapabilityDefinition>) -> Self {
        let mut registry = Self::default();
        let mut seen: HashSet<(CapabilityKind, String)> = HashSet::new();

        for def in cluster.into_iter().chain(local) {
            let key = (def.kind, def.name.clone());
            if seen.contains(&key) {
                let kept = registry.bucket(def.kind).iter().find(|d| d.name == def.name);
                if kept.map_or(false, |k| k.source_origin == def.source_origin) {
                    log::warn!(
                        "Duplicate {} definition `{}` from {:?}; keeping the first",
                        def.kind,
                        def.name,
                        def.source_origin
                    );
                } else {
                    log::debug!(
                        "{} `{}` is registered in the cluster; ignoring the cached copy",
                        def.kind,
                        def.name
                    );
                }
                continue;
            }
            seen.insert(key);
            registry.bucket_mut(def.kind).push(def);
        }

        registry
    }

    /// All definitions of `kind`, in registry order.
    pub fn list(&self, kind: CapabilityKind) -> &[CapabilityDefinition] {
        self.bucket(kind)
    }

    /// Resolve a definition by exact name or short alias; first match wins.
    pub fn get(
        &self,
        kind: CapabilityKind,
        name_or_alias: &str,
    ) -> Result<&CapabilityDefinition, PlaneError> {
        self.bucket(kind)
            .iter()
            .find(|d| d.answers_to(name_or_alias))
            .ok_or_else(|| PlaneError::not_found(kind, name_or_alias))
    }

    pub fn workloads(&self) -> &[CapabilityDefinition] {
        &self.workloads
    }

    pub fn traits(&self) -> &[CapabilityDefinition] {
        &self.traits
    }

    /// Total number of definitions of both kinds.
    pub fn len(&self) -> usize {
        self.workloads.len() + self.traits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty() && self.traits.is_empty()
    }

    fn bucket(&self, kind: CapabilityKind) -> &[CapabilityDefinition] {
        match kind {
            CapabilityKind::Workload => &self.workloads,
            CapabilityKind::Trait => &self.traits,
        }
    }

    fn bucket_mut(&mut self, kind: CapabilityKind) -> &mut Vec<CapabilityDefinition> {
        match kind {
            CapabilityKind::Workload => &mut self.workloads,
            CapabilityKind::Trait => &mut self.traits,
        }
    }
}

/// Read workload and trait definitions registered in the cluster.
///
/// Items whose spec cannot be decoded are skipped with a warning.
async fn fetch_cluster(store: &dyn ResourceStore) -> Result<Vec<CapabilityDefinition>, StoreError> {
    let mut definitions = Vec::new();
    for kind in [CapabilityKind::Workload, CapabilityKind::Trait] {
        for resource in store.list(kind.definition_kind()).await? {
            match CapabilityDefinition::from_resource(&resource, kind) {
                Ok(def) => definitions.push(def),
                Err(e) => log::warn!(
                    "Skipping malformed {} `{}`: {}",
                    resource.kind,
                    resource.metadata.name,
                    e
                ),
            }
        }
    }
    Ok(definitions)
}

async fn fetch_local(
    cache: &dyn CapabilityCache,
) -> Result<Vec<CapabilityDefinition>, super::cache::CacheError> {
    let mut definitions = cache.list_installed(CapabilityKind::Workload).await?;
    definitions.extend(cache.list_installed(CapabilityKind::Trait).await?);
    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::capabilities::cache::{CacheError, StaticCache};
    use crate::capabilities::capability::{ParamType, ParameterSpec, SourceOrigin};
    use crate::error::ErrorKind;
    use crate::store::{InMemoryStore, Resource};

    fn cluster(name: &str, kind: CapabilityKind) -> CapabilityDefinition {
        CapabilityDefinition::new(name, kind, SourceOrigin::Cluster)
    }

    fn local(name: &str, kind: CapabilityKind) -> CapabilityDefinition {
        CapabilityDefinition::new(name, kind, SourceOrigin::LocalCache)
    }

    struct UnreachableStore;

    #[async_trait]
    impl ResourceStore for UnreachableStore {
        async fn list(&self, _kind: &str) -> Result<Vec<Resource>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
        async fn get(
            &self,
            kind: &str,
            namespace: Option<&str>,
            name: &str,
        ) -> Result<Resource, StoreError> {
            Err(StoreError::NotFound(crate::store::ResourceKey::new(
                kind, namespace, name,
            )))
        }
        async fn create(&self, _resource: &Resource) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
        async fn update(&self, _resource: &Resource) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl CapabilityCache for BrokenCache {
        async fn list_installed(
            &self,
            _kind: CapabilityKind,
        ) -> Result<Vec<CapabilityDefinition>, CacheError> {
            Err(CacheError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "cache locked",
            )))
        }
    }

    #[test]
    fn test_cluster_wins_name_collision() {
        let cluster_def = cluster("webservice", CapabilityKind::Workload)
            .with_alias("web")
            .with_parameter(ParameterSpec::new("port", ParamType::Int));
        let local_def = local("webservice", CapabilityKind::Workload)
            .with_alias("svc")
            .with_definition_ref("something.else");

        let registry = CapabilityRegistry::merge(
            vec![cluster_def.clone()],
            vec![local_def, local("worker", CapabilityKind::Workload)],
        );

        assert_eq!(registry.workloads().len(), 2);
        assert_eq!(registry.workloads()[0], cluster_def);
        assert_eq!(registry.workloads()[1].name, "worker");
        assert!(registry.get(CapabilityKind::Workload, "svc").is_err());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let cluster_defs = vec![
            cluster("scaler", CapabilityKind::Trait).with_applies_to(&["webservice"]),
            cluster("webservice", CapabilityKind::Workload),
        ];
        let local_defs = vec![
            local("scaler", CapabilityKind::Trait),
            local("route", CapabilityKind::Trait).with_applies_to(&["webservice"]),
        ];

        let first = CapabilityRegistry::merge(cluster_defs.clone(), local_defs.clone());
        let second = CapabilityRegistry::merge(cluster_defs, local_defs);
        assert_eq!(first, second);

        let names: Vec<&str> = first.traits().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["scaler", "route"]);
    }

    #[test]
    fn test_same_origin_duplicate_keeps_first() {
        let registry = CapabilityRegistry::merge(
            vec![
                cluster("scaler", CapabilityKind::Trait).with_alias("a"),
                cluster("scaler", CapabilityKind::Trait).with_alias("b"),
            ],
            vec![],
        );
        assert_eq!(registry.traits().len(), 1);
        assert_eq!(registry.traits()[0].short_alias.as_deref(), Some("a"));
    }

    #[test]
    fn test_same_name_different_kinds_coexist() {
        let registry = CapabilityRegistry::merge(
            vec![
                cluster("cron", CapabilityKind::Workload),
                cluster("cron", CapabilityKind::Trait),
            ],
            vec![],
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_get_by_name_or_alias() {
        let registry = CapabilityRegistry::merge(
            vec![cluster("manualscaler", CapabilityKind::Trait).with_alias("scale")],
            vec![],
        );

        assert_eq!(
            registry.get(CapabilityKind::Trait, "scale").unwrap().name,
            "manualscaler"
        );
        assert!(registry.get(CapabilityKind::Trait, "manualscaler").is_ok());

        let err = registry.get(CapabilityKind::Trait, "Scale").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFoundError);

        let err = registry
            .get(CapabilityKind::Workload, "manualscaler")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFoundError);
    }

    #[tokio::test]
    async fn test_load_merges_both_sources() {
        let store = InMemoryStore::with_resources(vec![
            cluster("webservice", CapabilityKind::Workload)
                .with_alias("web")
                .to_resource(),
            cluster("scaler", CapabilityKind::Trait)
                .with_applies_to(&["webservice"])
                .to_resource(),
        ]);
        let cache = StaticCache::new(vec![
            local("webservice", CapabilityKind::Workload),
            local("worker", CapabilityKind::Workload),
        ]);

        let registry = CapabilityRegistry::load(&store, &cache).await.unwrap();

        let web = registry.get(CapabilityKind::Workload, "web").unwrap();
        assert_eq!(web.source_origin, SourceOrigin::Cluster);
        let worker = registry.get(CapabilityKind::Workload, "worker").unwrap();
        assert_eq!(worker.source_origin, SourceOrigin::LocalCache);
        assert_eq!(registry.traits().len(), 1);
    }

    #[tokio::test]
    async fn test_load_fails_when_cluster_unreachable() {
        let cache = StaticCache::new(vec![local("worker", CapabilityKind::Workload)]);
        let err = CapabilityRegistry::load(&UnreachableStore, &cache)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RegistryFetchError);
    }

    #[tokio::test]
    async fn test_load_degrades_when_cache_broken() {
        let store = InMemoryStore::with_resources(vec![cluster(
            "webservice",
            CapabilityKind::Workload,
        )
        .to_resource()]);

        let registry = CapabilityRegistry::load(&store, &BrokenCache).await.unwrap();
        assert_eq!(registry.workloads().len(), 1);
        assert!(registry.traits().is_empty());
    }

    #[tokio::test]
    async fn test_load_skips_malformed_cluster_definition() {
        let mut bad = cluster("broken", CapabilityKind::Trait).to_resource();
        bad.spec = serde_json::json!({ "appliesToWorkloads": "not-a-list" });
        let good = cluster("scaler", CapabilityKind::Trait).to_resource();
        let store = InMemoryStore::with_resources(vec![bad, good]);

        let registry = CapabilityRegistry::load(&store, &StaticCache::default())
            .await
            .unwrap();
        let names: Vec<&str> = registry.traits().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["scaler"]);
    }
}
