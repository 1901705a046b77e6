//! Control-plane error taxonomy.
//!
//! Every component returns [`PlaneError`] (or a narrower error that converts
//! into it). Only the top-level handlers turn an error into an HTTP status
//! or a process exit code, keyed on [`PlaneError::kind`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capabilities::CapabilityKind;
use crate::store::StoreError;

/// What a [`PlaneError::NotFound`] was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Workload,
    Trait,
    Environment,
    Resource,
}

impl From<CapabilityKind> for Subject {
    fn from(kind: CapabilityKind) -> Self {
        match kind {
            CapabilityKind::Workload => Self::Workload,
            CapabilityKind::Trait => Self::Trait,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workload => write!(f, "workload type"),
            Self::Trait => write!(f, "trait"),
            Self::Environment => write!(f, "environment"),
            Self::Resource => write!(f, "resource"),
        }
    }
}

/// A parameter failed coercion, or a required one is missing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid parameter `{param}`: {reason}")]
pub struct ValidationError {
    pub param: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the control plane.
#[derive(Debug, Error)]
pub enum PlaneError {
    /// The cluster-origin definition source could not be read.
    #[error("Listing capability definitions hit an issue: {0}")]
    RegistryFetch(#[source] StoreError),

    #[error("{subject} `{name}` not found")]
    NotFound { subject: Subject, name: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A capability of the wrong kind reached assembly. Always a bug.
    #[error("capability `{name}` is a {actual}, expected a {expected}")]
    KindMismatch {
        name: String,
        expected: CapabilityKind,
        actual: CapabilityKind,
    },

    #[error("applying {resource} failed: {source}")]
    Apply {
        resource: String,
        #[source]
        source: StoreError,
    },

    /// Cancelled before the store confirmed the write; the resource may or
    /// may not exist.
    #[error("apply of {resource} was cancelled; its state in the store is indeterminate")]
    Cancelled { resource: String },
}

/// Machine-readable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    RegistryFetchError,
    NotFoundError,
    ValidationError,
    KindMismatchError,
    ApplyError,
    CancelledError,
}

impl PlaneError {
    pub fn not_found(subject: impl Into<Subject>, name: &str) -> Self {
        Self::NotFound {
            subject: subject.into(),
            name: name.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RegistryFetch(_) => ErrorKind::RegistryFetchError,
            Self::NotFound { .. } => ErrorKind::NotFoundError,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::KindMismatch { .. } => ErrorKind::KindMismatchError,
            Self::Apply { .. } => ErrorKind::ApplyError,
            Self::Cancelled { .. } => ErrorKind::CancelledError,
        }
    }

    /// The structured error payload returned to callers.
    pub fn to_body(&self) -> ErrorBody {
        let param = match self {
            Self::Validation(e) => Some(e.param.clone()),
            _ => None,
        };
        ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
            param,
        }
    }
}

/// Error payload: machine-readable kind plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    /// Offending parameter, for validation failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}
