//! Environment resolution: named deployment targets.
//!
//! An environment maps a logical name (`dev`, `staging`, ...) to the concrete
//! scope workloads are written into. Environments are configured ahead of
//! time; this module only looks them up.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PlaneError, Subject};

/// A resolved environment. Immutable for the duration of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentContext {
    pub name: String,

    /// Namespace workloads are written into.
    pub namespace: String,

    /// Cluster endpoint, informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Application group used when a request names none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_app_group: Option<String>,

    /// Workload types to use, in preference order, when a request names none.
    #[serde(default)]
    pub workload_hints: Vec<String>,

    /// Parameter values that replace schema defaults in this environment.
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

impl EnvironmentContext {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            endpoint: None,
            default_app_group: None,
            workload_hints: Vec::new(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_default_app_group(mut self, group: &str) -> Self {
        self.default_app_group = Some(group.to_string());
        self
    }

    pub fn with_workload_hint(mut self, workload: &str) -> Self {
        self.workload_hints.push(workload.to_string());
        self
    }

    pub fn with_override(mut self, name: &str, value: &str) -> Self {
        self.overrides.insert(name.to_string(), value.to_string());
        self
    }
}

/// Looks environments up by exact, case-sensitive name.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentResolver {
    environments: Vec<EnvironmentContext>,
}

impl EnvironmentResolver {
    pub fn new(environments: Vec<EnvironmentContext>) -> Self {
        Self { environments }
    }

    /// Resolve `name`. There is no fallback environment.
    pub fn resolve(&self, name: &str) -> Result<EnvironmentContext, PlaneError> {
        self.environments
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| PlaneError::not_found(Subject::Environment, name))
    }

    /// Every configured environment, in configuration order.
    pub fn list(&self) -> &[EnvironmentContext] {
        &self.environments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn resolver() -> EnvironmentResolver {
        EnvironmentResolver::new(vec![
            EnvironmentContext::new("dev", "dev-ns").with_default_app_group("sandbox"),
            EnvironmentContext::new("prod", "prod-ns"),
        ])
    }

    #[test]
    fn test_resolve_exact_name() {
        let env = resolver().resolve("dev").unwrap();
        assert_eq!(env.namespace, "dev-ns");
        assert_eq!(env.default_app_group.as_deref(), Some("sandbox"));
    }

    #[test]
    fn test_resolve_is_case_sensitive_with_no_fallback() {
        let resolver = resolver();
        for name in ["Dev", "", "default"] {
            let err = resolver.resolve(name).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFoundError);
        }
    }

    #[test]
    fn test_parse_from_yaml() {
        let yaml = r#"
name: dev
namespace: dev-ns
endpoint: https://dev.cluster.local:6443
workloadHints: [webservice]
overrides:
  replicas: "2"
"#;
        let env: EnvironmentContext = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(env.workload_hints, vec!["webservice"]);
        assert_eq!(env.overrides.get("replicas").map(String::as_str), Some("2"));
    }
}
