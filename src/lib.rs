//! # capplane
//!
//! A capability control plane. Capability definitions (workload types and
//! traits) are discovered from a cluster resource store and a local cache,
//! merged into one registry, matched against each other, and used to turn a
//! request (`env`, workload type, raw parameters) into a typed workload
//! resource that is either staged or written back to the store.
//!
//! The same [`ControlPlane`] backs the `capctl` CLI and the
//! `capplane-server` HTTP API.

pub mod capabilities;
pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod matcher;
pub mod params;
pub mod pipeline;
pub mod plane;
pub mod server;
pub mod store;
pub mod workload;

pub use capabilities::{CapabilityDefinition, CapabilityKind, CapabilityRegistry};
pub use config::PlaneConfig;
pub use env::{EnvironmentContext, EnvironmentResolver};
pub use error::{ErrorBody, ErrorKind, PlaneError, ValidationError};
pub use pipeline::{ApplyPipeline, ApplyResult};
pub use plane::{ControlPlane, RunOutcome, RunRequest, RunResponse};
pub use store::{InMemoryStore, Resource, ResourceStore};
pub use workload::WorkloadInstance;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
