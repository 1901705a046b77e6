//! # Resource Store
//!
//! The target environment seen as a generic, key-addressed object store.
//!
//! The control plane never talks to a cluster API directly. Everything it
//! needs from the target environment goes through [`ResourceStore`]:
//!
//! - capability definitions registered in the cluster are read with
//!   [`ResourceStore::list`] (kinds [`WORKLOAD_DEFINITION_KIND`] and
//!   [`TRAIT_DEFINITION_KIND`]);
//! - assembled workloads are written with [`ResourceStore::create_or_update`].
//!
//! Client construction, authentication and watch mechanics belong to
//! whoever implements the trait.

pub mod memory;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use memory::InMemoryStore;

/// Store kind under which workload definitions are registered.
pub const WORKLOAD_DEFINITION_KIND: &str = "WorkloadDefinition";

/// Store kind under which trait definitions are registered.
pub const TRAIT_DEFINITION_KIND: &str = "TraitDefinition";

/// A stored object: `apiVersion`, `kind`, `metadata` and an opaque `spec`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: Value,
}

/// Identity and descriptive metadata of a [`Resource`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,

    /// `None` for cluster-scoped objects such as capability definitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// The identity of a resource in the store: `(kind, namespace, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceKey {
    pub fn new(kind: &str, namespace: Option<&str>, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: namespace.map(String::from),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

impl Resource {
    /// The store identity of this resource.
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(
            &self.kind,
            self.metadata.namespace.as_deref(),
            &self.metadata.name,
        )
    }

    /// Look up an annotation value.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata.annotations.get(key).map(String::as_str)
    }
}

/// What a successful [`ResourceStore::create_or_update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    Created,
    Updated,
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

/// Store-level failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Resource not found: {0}")]
    NotFound(ResourceKey),

    /// A plain existence conflict on create.
    #[error("Resource already exists: {0}")]
    AlreadyExists(ResourceKey),

    /// Any other write conflict (stale version, immutable field, ...).
    #[error("Conflict on {key}: {reason}")]
    Conflict { key: ResourceKey, reason: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The target environment's object store.
///
/// Implementations own connection handling, authentication and retries.
/// Callers never retry on their own.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// List every resource of `kind`, across namespaces, in store order.
    async fn list(&self, kind: &str) -> Result<Vec<Resource>, StoreError>;

    /// Fetch one resource, or [`StoreError::NotFound`].
    async fn get(
        &self,
        kind: &str,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Resource, StoreError>;

    /// Create a resource, or fail with [`StoreError::AlreadyExists`].
    async fn create(&self, resource: &Resource) -> Result<(), StoreError>;

    /// Replace an existing resource, or fail with [`StoreError::NotFound`].
    async fn update(&self, resource: &Resource) -> Result<(), StoreError>;

    /// Create the resource, falling back to an update when it already exists.
    async fn create_or_update(&self, resource: &Resource) -> Result<WriteAction, StoreError> {
        match self.create(resource).await {
            Ok(()) => Ok(WriteAction::Created),
            Err(StoreError::AlreadyExists(key)) => {
                log::debug!("{} already exists, updating", key);
                self.update(resource).await?;
                Ok(WriteAction::Updated)
            }
            Err(e) => Err(e),
        }
    }
}
