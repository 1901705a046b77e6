//! Capability definition: one workload type or trait type.
//!
//! A definition declares:
//! - Its name and an optional short alias
//! - Whether it is a workload or a trait
//! - For traits, which workload types it applies to
//! - The parameters it accepts, with types and defaults
//!
//! Definitions arrive from two places. Cluster-registered definitions are
//! stored as [`Resource`]s and decoded with
//! [`CapabilityDefinition::from_resource`]. Locally installed ones are YAML
//! files read by the capability cache.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{
    ObjectMeta, Resource, TRAIT_DEFINITION_KIND, WORKLOAD_DEFINITION_KIND,
};

/// Annotation that carries the short alias on a cluster definition.
pub const SHORT_ALIAS_ANNOTATION: &str = "short";

/// API version written on definition resources built by this crate.
pub const DEFINITION_API_VERSION: &str = "core.capplane.io/v1alpha1";

/// A capability definition.
///
/// Example YAML (local cache):
/// ```yaml
/// capability:
///   name: "webservice"
///   shortAlias: "web"
///   kind: workload
///   definitionRef: "containerizedworkloads.core.oam.dev"
///   parameters:
///     - name: image
///       type: string
///       required: true
///     - name: port
///       type: int
///       default: 8080
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDefinition {
    /// Unique within its kind after merge.
    pub name: String,

    /// Optional human-friendly alias, unique within its kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_alias: Option<String>,

    pub kind: CapabilityKind,

    /// Name of the resource definition backing this capability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_ref: Option<String>,

    /// Workload types this trait can be attached to. Empty means none.
    #[serde(default)]
    pub applies_to_workloads: Vec<String>,

    /// Declared parameter schema, in declaration order.
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,

    /// Provenance; always overwritten by the source that produced it.
    #[serde(default)]
    pub source_origin: SourceOrigin,
}

/// Workload type or trait type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Workload,
    Trait,
}

impl CapabilityKind {
    /// The store kind cluster-registered definitions of this kind live under.
    pub fn definition_kind(&self) -> &'static str {
        match self {
            Self::Workload => WORKLOAD_DEFINITION_KIND,
            Self::Trait => TRAIT_DEFINITION_KIND,
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workload => write!(f, "workload"),
            Self::Trait => write!(f, "trait"),
        }
    }
}

/// Where a definition came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceOrigin {
    /// Registered in the target cluster; authoritative.
    Cluster,
    /// Installed in the local capability cache only.
    #[default]
    LocalCache,
}

/// Primitive type tag of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    #[serde(alias = "integer")]
    Int,
    #[serde(alias = "number")]
    Float,
    #[serde(alias = "boolean")]
    Bool,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Bool => write!(f, "bool"),
        }
    }
}

/// One entry of a capability's parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Declared default, as written in the definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default)]
    pub required: bool,

    /// Help text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
}

impl ParameterSpec {
    pub fn new(name: &str, param_type: ParamType) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            default: None,
            required: false,
            usage: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// `spec` of a cluster definition resource.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    definition_ref: Option<DefinitionRef>,
    #[serde(default)]
    applies_to_workloads: Vec<String>,
    #[serde(default)]
    parameters: Vec<ParameterSpec>,
}

#[derive(Debug, Deserialize, Serialize)]
struct DefinitionRef {
    name: String,
}

/// Wrapper for YAML deserialization (definition is nested under `capability:`).
#[derive(Debug, Deserialize)]
struct CapabilityWrapper {
    capability: CapabilityDefinition,
}

impl CapabilityDefinition {
    /// A definition with no alias, schema or applicability.
    pub fn new(name: &str, kind: CapabilityKind, origin: SourceOrigin) -> Self {
        Self {
            name: name.to_string(),
            short_alias: None,
            kind,
            definition_ref: None,
            applies_to_workloads: Vec::new(),
            parameters: Vec::new(),
            source_origin: origin,
        }
    }

    /// Parse a definition nested under a `capability:` key.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let wrapper: CapabilityWrapper = serde_yaml::from_str(yaml)?;
        Ok(wrapper.capability)
    }

    /// Decode a cluster-registered definition resource.
    ///
    /// The alias comes from the `short` annotation and the definition
    /// reference from `spec.definitionRef.name`.
    pub fn from_resource(
        resource: &Resource,
        kind: CapabilityKind,
    ) -> Result<Self, serde_json::Error> {
        let spec: DefinitionSpec = if resource.spec.is_null() {
            DefinitionSpec::default()
        } else {
            serde_json::from_value(resource.spec.clone())?
        };

        Ok(Self {
            name: resource.metadata.name.clone(),
            short_alias: resource
                .annotation(SHORT_ALIAS_ANNOTATION)
                .filter(|s| !s.is_empty())
                .map(String::from),
            kind,
            definition_ref: spec.definition_ref.map(|r| r.name),
            applies_to_workloads: spec.applies_to_workloads,
            parameters: spec.parameters,
            source_origin: SourceOrigin::Cluster,
        })
    }

    /// Encode as a cluster definition resource; the inverse of
    /// [`from_resource`](Self::from_resource).
    pub fn to_resource(&self) -> Resource {
        let mut metadata = ObjectMeta {
            name: self.name.clone(),
            ..Default::default()
        };
        if let Some(alias) = &self.short_alias {
            metadata
                .annotations
                .insert(SHORT_ALIAS_ANNOTATION.to_string(), alias.clone());
        }
        let spec = DefinitionSpec {
            definition_ref: self
                .definition_ref
                .clone()
                .map(|name| DefinitionRef { name }),
            applies_to_workloads: self.applies_to_workloads.clone(),
            parameters: self.parameters.clone(),
        };

        Resource {
            api_version: DEFINITION_API_VERSION.to_string(),
            kind: self.kind.definition_kind().to_string(),
            metadata,
            spec: serde_json::to_value(spec).unwrap_or(Value::Null),
        }
    }

    /// Exact, case-sensitive match against the name or the short alias.
    pub fn answers_to(&self, name_or_alias: &str) -> bool {
        self.name == name_or_alias || self.short_alias.as_deref() == Some(name_or_alias)
    }

    /// Whether this trait declares compatibility with `workload`.
    pub fn applies_to(&self, workload: &str) -> bool {
        self.applies_to_workloads.iter().any(|w| w == workload)
    }

    /// Look up a parameter spec by name.
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.short_alias = Some(alias.to_string());
        self
    }

    pub fn with_definition_ref(mut self, definition_ref: &str) -> Self {
        self.definition_ref = Some(definition_ref.to_string());
        self
    }

    pub fn with_applies_to(mut self, workloads: &[&str]) -> Self {
        self.applies_to_workloads = workloads.iter().map(|w| w.to_string()).collect();
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }
}
