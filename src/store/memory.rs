//! In-process [`ResourceStore`] used by the bundled binaries and by tests.
//!
//! Keeps resources in insertion order so that `list` is deterministic, the
//! way a real cluster returns objects in a stable order per kind.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{Resource, ResourceKey, ResourceStore, StoreError};

/// Insertion-ordered in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    resources: RwLock<Vec<Resource>>,
}

/// Seed file layout: `resources: [ ... ]`.
#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    resources: Vec<Resource>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `resources`.
    ///
    /// Later entries with the same identity replace earlier ones.
    pub fn with_resources(resources: Vec<Resource>) -> Self {
        let mut seeded: Vec<Resource> = Vec::with_capacity(resources.len());
        for resource in resources {
            let key = resource.key();
            match seeded.iter_mut().find(|r| r.key() == key) {
                Some(existing) => *existing = resource,
                None => seeded.push(resource),
            }
        }
        Self {
            resources: RwLock::new(seeded),
        }
    }

    /// Parse a seed document (`resources:` list).
    pub fn from_yaml(yaml: &str) -> Result<Self, StoreError> {
        let seed: SeedFile = serde_yaml::from_str(yaml)?;
        Ok(Self::with_resources(seed.resources))
    }

    /// Load a seed document from disk.
    pub fn from_yaml_file(path: &std::path::Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Number of stored resources of every kind.
    pub async fn len(&self) -> usize {
        self.resources.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.resources.read().await.is_empty()
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn list(&self, kind: &str) -> Result<Vec<Resource>, StoreError> {
        let resources = self.resources.read().await;
        Ok(resources.iter().filter(|r| r.kind == kind).cloned().collect())
    }

    async fn get(
        &self,
        kind: &str,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Resource, StoreError> {
        let key = ResourceKey::new(kind, namespace, name);
        let resources = self.resources.read().await;
        resources
            .iter()
            .find(|r| r.key() == key)
            .cloned()
            .ok_or(StoreError::NotFound(key))
    }

    async fn create(&self, resource: &Resource) -> Result<(), StoreError> {
        let key = resource.key();
        let mut resources = self.resources.write().await;
        if resources.iter().any(|r| r.key() == key) {
            return Err(StoreError::AlreadyExists(key));
        }
        resources.push(resource.clone());
        Ok(())
    }

    async fn update(&self, resource: &Resource) -> Result<(), StoreError> {
        let key = resource.key();
        let mut resources = self.resources.write().await;
        let existing = resources
            .iter_mut()
            .find(|r| r.key() == key)
            .ok_or(StoreError::NotFound(key))?;
        *existing = resource.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ObjectMeta, WriteAction};

    fn widget(name: &str, namespace: &str, size: u64) -> Resource {
        Resource {
            api_version: "test/v1".to_string(),
            kind: "Widget".to_string(),
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: serde_json::json!({ "size": size }),
        }
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = InMemoryStore::new();
        store.create(&widget("a", "ns", 1)).await.unwrap();

        let got = store.get("Widget", Some("ns"), "a").await.unwrap();
        assert_eq!(got.spec["size"], 1);

        let missing = store.get("Widget", Some("other"), "a").await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_twice_is_an_existence_conflict() {
        let store = InMemoryStore::new();
        store.create(&widget("a", "ns", 1)).await.unwrap();
        let again = store.create(&widget("a", "ns", 2)).await;
        assert!(matches!(again, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_create_or_update_replaces_in_place() {
        let store = InMemoryStore::new();
        assert_eq!(
            store.create_or_update(&widget("a", "ns", 1)).await.unwrap(),
            WriteAction::Created
        );
        assert_eq!(
            store.create_or_update(&widget("a", "ns", 5)).await.unwrap(),
            WriteAction::Updated
        );
        assert_eq!(store.len().await, 1);
        let got = store.get("Widget", Some("ns"), "a").await.unwrap();
        assert_eq!(got.spec["size"], 5);
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let store = InMemoryStore::new();
        for name in ["zeta", "alpha", "mid"] {
            store.create(&widget(name, "ns", 0)).await.unwrap();
        }
        let names: Vec<String> = store
            .list("Widget")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.metadata.name)
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert!(store.list("Gadget").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_seed_from_yaml() {
        let yaml = r#"
resources:
  - apiVersion: core.capplane.io/v1alpha1
    kind: TraitDefinition
    metadata:
      name: manualscaler
      annotations:
        short: scale
    spec:
      appliesToWorkloads: [webservice]
"#;
        let store = InMemoryStore::from_yaml(yaml).unwrap();
        let traits = store.list("TraitDefinition").await.unwrap();
        assert_eq!(traits.len(), 1);
        assert_eq!(traits[0].annotation("short"), Some("scale"));
        assert!(traits[0].metadata.namespace.is_none());
    }
}
