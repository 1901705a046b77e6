//! Parameter binding: raw name/value text into a typed configuration.
//!
//! Values always arrive as text, whether they came from CLI flags or an HTTP
//! body. The binder shapes them against the capability's declared schema:
//!
//! - declared names are coerced into their primitive type;
//! - declared names that were not supplied get their default, if any;
//! - undeclared names are kept verbatim in a passthrough map, since
//!   capabilities may accept free-form options.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capabilities::{CapabilityDefinition, ParamType, ParameterSpec};
use crate::error::ValidationError;

/// One raw `name=value` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawParam {
    pub name: String,
    pub value: String,
}

impl RawParam {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ParamValue {
    /// Coerce text into `param_type`.
    pub fn parse(param_type: ParamType, raw: &str) -> Result<Self, String> {
        match param_type {
            ParamType::String => Ok(Self::String(raw.to_string())),
            ParamType::Int => raw
                .trim()
                .parse::<i64>()
                .map(Self::Int)
                .map_err(|_| format!("expected int, got `{}`", raw)),
            ParamType::Float => raw
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("expected float, got `{}`", raw))
                .and_then(|f| finite(f, raw)),
            ParamType::Bool => parse_bool(raw.trim())
                .map(Self::Bool)
                .ok_or_else(|| format!("expected bool, got `{}`", raw)),
        }
    }

    /// Coerce a declared default into `param_type`.
    ///
    /// Text defaults go through [`parse`](Self::parse); other JSON values
    /// must already have the right shape (an integral number for `float` is
    /// widened).
    pub fn from_default(param_type: ParamType, value: &Value) -> Result<Self, String> {
        match (param_type, value) {
            (_, Value::String(s)) => Self::parse(param_type, s),
            (ParamType::Int, Value::Number(n)) => n
                .as_i64()
                .map(Self::Int)
                .ok_or_else(|| format!("default {} is not an int", n)),
            (ParamType::Float, Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| format!("default {} is not a float", n))
                .and_then(|f| finite(f, &n.to_string())),
            (ParamType::Bool, Value::Bool(b)) => Ok(Self::Bool(*b)),
            (ParamType::String, Value::Number(n)) => Ok(Self::String(n.to_string())),
            (ParamType::String, Value::Bool(b)) => Ok(Self::String(b.to_string())),
            (t, other) => Err(format!("default {} is not a {}", other, t)),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

/// Non-finite floats have no JSON form.
fn finite(value: f64, raw: &str) -> Result<ParamValue, String> {
    if value.is_finite() {
        Ok(ParamValue::Float(value))
    } else {
        Err(format!("expected a finite float, got `{}`", raw))
    }
}

/// Boolean spellings accepted on the command line.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Schema-shaped parameter values for one capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypedConfig {
    /// Declared parameters that have a value.
    pub values: BTreeMap<String, ParamValue>,
    /// Declared parameters the caller supplied explicitly.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub explicit: BTreeSet<String>,
    /// Undeclared parameters, uncoerced.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub passthrough: BTreeMap<String, String>,
}

impl TypedConfig {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Apply environment-scoped overrides.
    ///
    /// An override replaces a declared parameter's value unless the caller
    /// supplied that parameter explicitly. Overrides for undeclared names are
    /// ignored.
    pub fn apply_overrides(
        &mut self,
        capability: &CapabilityDefinition,
        overrides: &BTreeMap<String, String>,
    ) -> Result<(), ValidationError> {
        for (name, raw) in overrides {
            if self.explicit.contains(name) {
                continue;
            }
            if let Some(spec) = capability.parameter(name) {
                let value = coerce(spec, raw)?;
                log::debug!("Environment override {}={}", name, value);
                self.values.insert(name.clone(), value);
            }
        }
        Ok(())
    }

    /// Fail on the first required parameter that has no value.
    pub fn ensure_required(&self, capability: &CapabilityDefinition) -> Result<(), ValidationError> {
        match capability
            .parameters
            .iter()
            .find(|p| p.required && !self.values.contains_key(&p.name))
        {
            Some(missing) => Err(ValidationError::new(
                &missing.name,
                "required parameter is not set",
            )),
            None => Ok(()),
        }
    }
}

/// Bind raw parameters against `capability`'s schema.
///
/// When a name is repeated the last occurrence wins.
pub fn bind(
    capability: &CapabilityDefinition,
    raw_params: &[RawParam],
) -> Result<TypedConfig, ValidationError> {
    let schema: HashMap<&str, &ParameterSpec> = capability
        .parameters
        .iter()
        .map(|p| (p.name.as_str(), p))
        .collect();

    let mut config = TypedConfig::default();

    for raw in raw_params {
        match schema.get(raw.name.as_str()) {
            Some(spec) => {
                let value = coerce(spec, &raw.value)?;
                config.values.insert(raw.name.clone(), value);
                config.explicit.insert(raw.name.clone());
            }
            None => {
                config
                    .passthrough
                    .insert(raw.name.clone(), raw.value.clone());
            }
        }
    }

    for spec in &capability.parameters {
        if config.values.contains_key(&spec.name) {
            continue;
        }
        if let Some(default) = &spec.default {
            let value = ParamValue::from_default(spec.param_type, default)
                .map_err(|reason| ValidationError::new(&spec.name, reason))?;
            config.values.insert(spec.name.clone(), value);
        }
    }

    Ok(config)
}

fn coerce(spec: &ParameterSpec, raw: &str) -> Result<ParamValue, ValidationError> {
    ParamValue::parse(spec.param_type, raw).map_err(|reason| ValidationError::new(&spec.name, reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{CapabilityKind, SourceOrigin};
    use serde_json::json;

    fn scaler() -> CapabilityDefinition {
        CapabilityDefinition::new("scaler", CapabilityKind::Trait, SourceOrigin::Cluster)
            .with_parameter(ParameterSpec::new("replicas", ParamType::Int).with_default(json!(1)))
    }

    fn webservice() -> CapabilityDefinition {
        CapabilityDefinition::new("webservice", CapabilityKind::Workload, SourceOrigin::Cluster)
            .with_parameter(ParameterSpec::new("image", ParamType::String).required())
            .with_parameter(ParameterSpec::new("port", ParamType::Int).with_default(json!(8080)))
            .with_parameter(ParameterSpec::new("cpu", ParamType::Float).with_default(json!(1)))
            .with_parameter(ParameterSpec::new("debug", ParamType::Bool).with_default(json!("false")))
    }

    #[test]
    fn test_default_applies_when_absent() {
        let config = bind(&scaler(), &[]).unwrap();
        assert_eq!(config.get("replicas"), Some(&ParamValue::Int(1)));
        assert!(config.explicit.is_empty());
    }

    #[test]
    fn test_supplied_value_is_coerced() {
        let config = bind(&scaler(), &[RawParam::new("replicas", "3")]).unwrap();
        assert_eq!(config.get("replicas"), Some(&ParamValue::Int(3)));
        assert!(config.explicit.contains("replicas"));
    }

    #[test]
    fn test_bad_value_names_parameter() {
        let err = bind(&scaler(), &[RawParam::new("replicas", "abc")]).unwrap_err();
        assert_eq!(err.param, "replicas");
        assert!(err.reason.contains("abc"));
    }

    #[test]
    fn test_unknown_names_pass_through() {
        let config = bind(
            &scaler(),
            &[RawParam::new("sidecar", "envoy"), RawParam::new("replicas", "2")],
        )
        .unwrap();
        assert_eq!(config.passthrough.get("sidecar").map(String::as_str), Some("envoy"));
        assert!(config.get("sidecar").is_none());
    }

    #[test]
    fn test_defaults_of_every_type() {
        let config = bind(&webservice(), &[]).unwrap();
        assert_eq!(config.get("port"), Some(&ParamValue::Int(8080)));
        assert_eq!(config.get("cpu"), Some(&ParamValue::Float(1.0)));
        assert_eq!(config.get("debug"), Some(&ParamValue::Bool(false)));
        assert!(config.get("image").is_none());
    }

    #[test]
    fn test_bool_spellings() {
        for (raw, expected) in [("1", true), ("T", true), ("True", true), ("f", false), ("FALSE", false)] {
            assert_eq!(ParamValue::parse(ParamType::Bool, raw), Ok(ParamValue::Bool(expected)));
        }
        assert!(ParamValue::parse(ParamType::Bool, "yes").is_err());
    }

    #[test]
    fn test_non_finite_floats_rejected() {
        let cap = webservice();
        for raw in ["NaN", "inf", "-infinity", "1e400"] {
            let err = bind(&cap, &[RawParam::new("cpu", raw)]).unwrap_err();
            assert_eq!(err.param, "cpu");
            assert!(err.reason.contains("finite"), "{raw}: {}", err.reason);
        }

        let config = bind(&cap, &[RawParam::new("cpu", "0.25")]).unwrap();
        assert_eq!(config.get("cpu").map(ParamValue::to_json), Some(json!(0.25)));
    }

    #[test]
    fn test_non_finite_text_default_rejected() {
        let cap = CapabilityDefinition::new("odd", CapabilityKind::Workload, SourceOrigin::LocalCache)
            .with_parameter(ParameterSpec::new("ratio", ParamType::Float).with_default(json!("NaN")));
        let err = bind(&cap, &[]).unwrap_err();
        assert_eq!(err.param, "ratio");
    }

    #[test]
    fn test_last_occurrence_wins() {
        let config = bind(
            &scaler(),
            &[RawParam::new("replicas", "2"), RawParam::new("replicas", "5")],
        )
        .unwrap();
        assert_eq!(config.get("replicas"), Some(&ParamValue::Int(5)));
    }

    #[test]
    fn test_bad_default_is_a_validation_error() {
        let cap = CapabilityDefinition::new("odd", CapabilityKind::Workload, SourceOrigin::LocalCache)
            .with_parameter(ParameterSpec::new("port", ParamType::Int).with_default(json!(true)));
        let err = bind(&cap, &[]).unwrap_err();
        assert_eq!(err.param, "port");
    }

    #[test]
    fn test_required_parameter_check() {
        let cap = webservice();
        let config = bind(&cap, &[]).unwrap();
        let err = config.ensure_required(&cap).unwrap_err();
        assert_eq!(err.param, "image");

        let config = bind(&cap, &[RawParam::new("image", "nginx:1.25")]).unwrap();
        assert!(config.ensure_required(&cap).is_ok());
    }

    #[test]
    fn test_overrides_respect_explicit_values() {
        let cap = webservice();
        let overrides: BTreeMap<String, String> = [
            ("port".to_string(), "9090".to_string()),
            ("debug".to_string(), "true".to_string()),
            ("region".to_string(), "eu".to_string()),
        ]
        .into_iter()
        .collect();

        let mut config = bind(&cap, &[RawParam::new("port", "80")]).unwrap();
        config.apply_overrides(&cap, &overrides).unwrap();

        assert_eq!(config.get("port"), Some(&ParamValue::Int(80)));
        assert_eq!(config.get("debug"), Some(&ParamValue::Bool(true)));
        assert!(config.get("region").is_none());
        assert!(config.passthrough.is_empty());
    }

    #[test]
    fn test_bad_override_is_a_validation_error() {
        let cap = webservice();
        let overrides: BTreeMap<String, String> =
            [("port".to_string(), "eighty".to_string())].into_iter().collect();
        let mut config = bind(&cap, &[]).unwrap();
        let err = config.apply_overrides(&cap, &overrides).unwrap_err();
        assert_eq!(err.param, "port");
    }
}
