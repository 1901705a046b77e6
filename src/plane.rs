//! Request orchestration: one pass through the control plane.
//!
//! ```text
//! RunRequest
//!   ↓  EnvironmentResolver::resolve()
//!   ↓  CapabilityRegistry::load()          (cluster ∥ local cache)
//!   ↓  params::bind() + overrides + required check
//!   ↓  workload::assemble()
//!   ↓  ApplyPipeline::apply()
//! RunResponse
//! ```
//!
//! The CLI and the HTTP API both build a [`RunRequest`] and call
//! [`ControlPlane::run`]; neither entry point has logic of its own.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capabilities::{
    CapabilityCache, CapabilityDefinition, CapabilityKind, CapabilityRegistry, DirectoryCache,
};
use crate::config::{ConfigError, PlaneConfig};
use crate::env::{EnvironmentContext, EnvironmentResolver};
use crate::error::{PlaneError, ValidationError};
use crate::matcher::{self, TraitApplicability, TraitMeta, WorkloadMeta};
use crate::params::{self, RawParam};
use crate::pipeline::{ApplyPipeline, ApplyResult};
use crate::store::{InMemoryStore, Resource, ResourceStore, WriteAction};
use crate::workload::{self, WorkloadInstance};

/// The logical request both entry points map onto.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub env_name: String,

    /// Resource name; see [`workload::assemble`] for the fallbacks.
    #[serde(default)]
    pub workload_name: String,

    /// Workload type name or short alias; empty means the environment's
    /// first workload hint.
    #[serde(default)]
    pub workload_type: String,

    #[serde(default)]
    pub app_group: String,

    #[serde(default)]
    pub staging: bool,

    #[serde(default, alias = "flags")]
    pub parameters: Vec<RawParam>,
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Rendered only; the store was not written.
    Staged,
    Applied,
}

/// Outcome of a run, with enough identity to display or log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub outcome: RunOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<WriteAction>,
    pub capability: String,
    pub environment: String,
    pub namespace: String,
    pub resource_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
    pub resource: Resource,
}

impl RunResponse {
    fn from_result(instance_identity: Identity, result: ApplyResult) -> Self {
        let Identity {
            capability,
            environment,
            namespace,
            name,
        } = instance_identity;
        match result {
            ApplyResult::Staged { resource } => Self {
                outcome: RunOutcome::Staged,
                action: None,
                capability,
                environment,
                namespace,
                resource_name: name,
                applied_at: None,
                resource,
            },
            ApplyResult::Applied {
                resource,
                action,
                applied_at,
            } => Self {
                outcome: RunOutcome::Applied,
                action: Some(action),
                capability,
                environment,
                namespace,
                resource_name: name,
                applied_at: Some(applied_at),
                resource,
            },
        }
    }
}

struct Identity {
    capability: String,
    environment: String,
    namespace: String,
    name: String,
}

impl From<&WorkloadInstance> for Identity {
    fn from(instance: &WorkloadInstance) -> Self {
        Self {
            capability: instance.capability.clone(),
            environment: instance.environment.clone(),
            namespace: instance.namespace.clone(),
            name: instance.name.clone(),
        }
    }
}

/// Explicit request context: the store, the cache and the environments.
///
/// Holds no per-request state; every call rebuilds what it needs.
#[derive(Clone)]
pub struct ControlPlane {
    store: Arc<dyn ResourceStore>,
    cache: Arc<dyn CapabilityCache>,
    environments: EnvironmentResolver,
}

impl ControlPlane {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        cache: Arc<dyn CapabilityCache>,
        environments: EnvironmentResolver,
    ) -> Self {
        Self {
            store,
            cache,
            environments,
        }
    }

    /// Build a plane from configuration: an in-memory store (seeded when
    /// `storeSeed` is set) and a directory cache rooted at `cacheDir`.
    pub fn from_config(config: &PlaneConfig) -> Result<Self, ConfigError> {
        let store = match &config.store_seed {
            Some(seed) => InMemoryStore::from_yaml_file(seed).map_err(|e| {
                ConfigError::Invalid(format!("store seed {}: {}", seed.display(), e))
            })?,
            None => InMemoryStore::new(),
        };

        Ok(Self::new(
            Arc::new(store),
            Arc::new(DirectoryCache::new(&config.cache_dir)),
            EnvironmentResolver::new(config.environments.clone()),
        ))
    }

    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    /// A fresh registry snapshot.
    pub async fn registry(&self) -> Result<CapabilityRegistry, PlaneError> {
        CapabilityRegistry::load(self.store.as_ref(), self.cache.as_ref()).await
    }

    pub async fn list_traits(&self, workload_filter: &str) -> Result<Vec<TraitMeta>, PlaneError> {
        let registry = self.registry().await?;
        Ok(matcher::match_traits(&registry, workload_filter))
    }

    pub async fn list_workloads(&self) -> Result<Vec<WorkloadMeta>, PlaneError> {
        let registry = self.registry().await?;
        Ok(matcher::list_workloads(&registry))
    }

    pub async fn applicability(&self) -> Result<Vec<TraitApplicability>, PlaneError> {
        let registry = self.registry().await?;
        Ok(matcher::applicability(&registry))
    }

    pub async fn get_capability(
        &self,
        kind: CapabilityKind,
        name_or_alias: &str,
    ) -> Result<CapabilityDefinition, PlaneError> {
        let registry = self.registry().await?;
        registry.get(kind, name_or_alias).cloned()
    }

    pub fn environments(&self) -> &[EnvironmentContext] {
        self.environments.list()
    }

    pub fn environment(&self, name: &str) -> Result<EnvironmentContext, PlaneError> {
        self.environments.resolve(name)
    }

    /// Run a request to completion.
    pub async fn run(&self, request: RunRequest) -> Result<RunResponse, PlaneError> {
        let (pipeline, instance) = self.prepare(request).await?;
        let identity = Identity::from(&instance);
        let result = pipeline.apply(instance).await?;
        Ok(RunResponse::from_result(identity, result))
    }

    /// Run a request, giving up when `cancelled` completes before the store
    /// write does.
    pub async fn run_until<F>(
        &self,
        request: RunRequest,
        cancelled: F,
    ) -> Result<RunResponse, PlaneError>
    where
        F: Future<Output = ()>,
    {
        let (pipeline, instance) = self.prepare(request).await?;
        let identity = Identity::from(&instance);
        let result = pipeline.apply_until(instance, cancelled).await?;
        Ok(RunResponse::from_result(identity, result))
    }

    /// Everything up to, but excluding, the store write.
    async fn prepare(
        &self,
        request: RunRequest,
    ) -> Result<(ApplyPipeline, WorkloadInstance), PlaneError> {
        let env = self.environments.resolve(&request.env_name)?;

        let workload_type = if request.workload_type.is_empty() {
            env.workload_hints.first().cloned().ok_or_else(|| {
                ValidationError::new(
                    "workloadType",
                    format!("no workload type given and environment `{}` has no hint", env.name),
                )
            })?
        } else {
            request.workload_type.clone()
        };

        let registry = self.registry().await?;
        let capability = registry.get(CapabilityKind::Workload, &workload_type)?;

        let mut config = params::bind(capability, &request.parameters)?;
        config.apply_overrides(capability, &env.overrides)?;
        config.ensure_required(capability)?;

        let instance = workload::assemble(
            capability,
            config,
            &env,
            &request.workload_name,
            &request.app_group,
            request.staging,
        )?;
        log::debug!(
            "Assembled {} (staging={}) for environment {}",
            instance.key(),
            instance.staging,
            env.name
        );

        Ok((ApplyPipeline::new(self.store.clone()), instance))
    }
}
