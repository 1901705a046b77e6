//! Workload assembly: capability + bound parameters + environment.
//!
//! Assembly is pure composition: no I/O, no defaults beyond the naming
//! rules below. The resulting [`WorkloadInstance`] is owned by the request
//! that built it and is discarded once the apply pipeline has run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capabilities::{CapabilityDefinition, CapabilityKind};
use crate::env::EnvironmentContext;
use crate::error::PlaneError;
use crate::params::{ParamValue, TypedConfig};
use crate::store::{ObjectMeta, Resource, ResourceKey};

/// API version of rendered workload resources.
pub const WORKLOAD_API_VERSION: &str = "core.capplane.io/v1alpha1";

pub const LABEL_WORKLOAD_TYPE: &str = "capplane.io/workload-type";
pub const LABEL_APP_GROUP: &str = "capplane.io/app-group";
pub const LABEL_ENVIRONMENT: &str = "capplane.io/environment";

/// A fully-formed workload, ready to be staged or applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadInstance {
    /// Workload type name.
    pub capability: String,
    /// Kind of the rendered resource.
    pub resource_kind: String,
    /// Name of the rendered resource.
    pub name: String,
    pub namespace: String,
    pub environment: String,
    pub app_group: String,
    pub parameters: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub passthrough: BTreeMap<String, String>,
    pub staging: bool,
}

/// Compose a workload instance.
///
/// The resource name is `workload_name`, else `app_group`, else the
/// capability name. The application group is `app_group`, else the
/// environment's default group, else the resource name. `staging` is copied
/// through untouched.
pub fn assemble(
    capability: &CapabilityDefinition,
    config: TypedConfig,
    env: &EnvironmentContext,
    workload_name: &str,
    app_group: &str,
    staging: bool,
) -> Result<WorkloadInstance, PlaneError> {
    if capability.kind != CapabilityKind::Workload {
        return Err(PlaneError::KindMismatch {
            name: capability.name.clone(),
            expected: CapabilityKind::Workload,
            actual: capability.kind,
        });
    }

    let name = first_non_empty(&[workload_name, app_group])
        .unwrap_or(capability.name.as_str())
        .to_string();
    let app_group = first_non_empty(&[app_group, env.default_app_group.as_deref().unwrap_or("")])
        .unwrap_or(name.as_str())
        .to_string();

    Ok(WorkloadInstance {
        capability: capability.name.clone(),
        resource_kind: capability
            .definition_ref
            .clone()
            .unwrap_or_else(|| capability.name.clone()),
        name,
        namespace: env.namespace.clone(),
        environment: env.name.clone(),
        app_group,
        parameters: config.values,
        passthrough: config.passthrough,
        staging,
    })
}

fn first_non_empty<'a>(candidates: &[&'a str]) -> Option<&'a str> {
    candidates.iter().copied().find(|s| !s.is_empty())
}

impl WorkloadInstance {
    /// Store identity of the rendered resource.
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.resource_kind, Some(&self.namespace), &self.name)
    }

    /// Render the instance as a store resource.
    ///
    /// Deterministic: the same instance always renders to the same resource,
    /// whether it is staged or applied. Bound values and passthrough values
    /// become top-level `spec` keys.
    pub fn render(&self) -> Resource {
        let mut spec = Map::new();
        for (name, raw) in &self.passthrough {
            spec.insert(name.clone(), Value::String(raw.clone()));
        }
        for (name, value) in &self.parameters {
            spec.insert(name.clone(), value.to_json());
        }

        let labels = BTreeMap::from([
            (LABEL_WORKLOAD_TYPE.to_string(), self.capability.clone()),
            (LABEL_APP_GROUP.to_string(), self.app_group.clone()),
            (LABEL_ENVIRONMENT.to_string(), self.environment.clone()),
        ]);

        Resource {
            api_version: WORKLOAD_API_VERSION.to_string(),
            kind: self.resource_kind.clone(),
            metadata: ObjectMeta {
                name: self.name.clone(),
                namespace: Some(self.namespace.clone()),
                labels,
                annotations: BTreeMap::new(),
            },
            spec: Value::Object(spec),
        }
    }
}
