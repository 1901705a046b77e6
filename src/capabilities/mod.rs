//! # Capabilities
//!
//! Workload types and trait types are not compiled into the platform. They
//! are discovered at runtime from two sources and merged into one
//! [`CapabilityRegistry`] snapshot per query.
//!
//! ## Sources
//!
//! - **Cluster**: `WorkloadDefinition` / `TraitDefinition` resources read
//!   through [`ResourceStore`](crate::store::ResourceStore). Authoritative.
//! - **Local cache**: installed plugin definitions read through
//!   [`CapabilityCache`]. Supplementary; a failure here only degrades the
//!   snapshot.
//!
//! ## Resolution
//!
//! 1. `CapabilityRegistry::load(store, cache)` fetches both sources concurrently
//! 2. Definitions are reduced by name, cluster first
//! 3. `registry.get(kind, "web")` resolves by name or short alias

pub mod cache;
pub mod capability;
pub mod registry;

pub use cache::{CacheError, CapabilityCache, DirectoryCache, StaticCache};
pub use capability::{
    CapabilityDefinition, CapabilityKind, ParamType, ParameterSpec, SourceOrigin,
};
pub use registry::CapabilityRegistry;
