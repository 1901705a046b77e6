//! Trait matching: which traits apply to which workloads.
//!
//! All views here are derived from a [`CapabilityRegistry`] snapshot on
//! demand and never cached. Output order is registry order.

use serde::{Deserialize, Serialize};

use crate::capabilities::{CapabilityDefinition, CapabilityRegistry, ParameterSpec, SourceOrigin};

/// Separator used when an applicability set is joined for display.
pub const APPLIES_TO_SEPARATOR: &str = ", ";

/// One row of the trait listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitMeta {
    pub name: String,
    #[serde(default)]
    pub short_alias: String,
    #[serde(default)]
    pub definition_ref: String,
    pub applies_to: String,
    pub status: String,
}

/// One row of the workload listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadMeta {
    pub name: String,
    #[serde(default)]
    pub short_alias: String,
    #[serde(default)]
    pub definition_ref: String,
    /// Traits compatible with this workload, joined for display.
    pub applies_to: String,
    pub status: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

/// A workload type and the traits declared compatible with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitApplicability {
    pub workload: String,
    pub traits: Vec<String>,
}

/// Installation status derived from provenance.
pub fn status_marker(origin: SourceOrigin) -> &'static str {
    match origin {
        SourceOrigin::Cluster => "installed",
        SourceOrigin::LocalCache => "uninstalled",
    }
}

/// List traits, optionally restricted to those applying to `workload_filter`.
///
/// With an empty filter every trait is listed with its full applicability
/// set. With a filter, only traits whose set contains the filter exactly are
/// listed, and `applies_to` is the filter itself. Rows whose `applies_to`
/// would be empty are dropped in both cases.
pub fn match_traits(registry: &CapabilityRegistry, workload_filter: &str) -> Vec<TraitMeta> {
    registry
        .traits()
        .iter()
        .filter_map(|def| {
            let applies_to = if workload_filter.is_empty() {
                def.applies_to_workloads.join(APPLIES_TO_SEPARATOR)
            } else if def.applies_to(workload_filter) {
                workload_filter.to_string()
            } else {
                String::new()
            };

            if applies_to.is_empty() {
                return None;
            }
            Some(TraitMeta {
                name: def.name.clone(),
                short_alias: alias_of(def),
                definition_ref: def.definition_ref.clone().unwrap_or_default(),
                applies_to,
                status: status_marker(def.source_origin).to_string(),
            })
        })
        .collect()
}

/// For every workload type, the traits that declare compatibility with it.
pub fn applicability(registry: &CapabilityRegistry) -> Vec<TraitApplicability> {
    registry
        .workloads()
        .iter()
        .map(|w| TraitApplicability {
            workload: w.name.clone(),
            traits: compatible_traits(registry, &w.name),
        })
        .collect()
}

/// List workload types with their compatible traits and parameter schema.
///
/// Unlike traits, workloads are never dropped for an empty `applies_to`.
pub fn list_workloads(registry: &CapabilityRegistry) -> Vec<WorkloadMeta> {
    registry
        .workloads()
        .iter()
        .map(|def| WorkloadMeta {
            name: def.name.clone(),
            short_alias: alias_of(def),
            definition_ref: def.definition_ref.clone().unwrap_or_default(),
            applies_to: compatible_traits(registry, &def.name).join(APPLIES_TO_SEPARATOR),
            status: status_marker(def.source_origin).to_string(),
            parameters: def.parameters.clone(),
        })
        .collect()
}

fn compatible_traits(registry: &CapabilityRegistry, workload: &str) -> Vec<String> {
    registry
        .traits()
        .iter()
        .filter(|t| t.applies_to(workload))
        .map(|t| t.name.clone())
        .collect()
}

fn alias_of(def: &CapabilityDefinition) -> String {
    def.short_alias.clone().unwrap_or_default()
}
