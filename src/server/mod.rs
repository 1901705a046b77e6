//! HTTP API for the control plane.
//!
//! A thin adapter: every handler maps its request onto a
//! [`ControlPlane`](crate::plane::ControlPlane) call and maps
//! [`PlaneError`](crate::error::PlaneError) onto an HTTP status.
//!
//! # Endpoints
//!
//! - `GET  /health`:           Liveness probe
//! - `GET  /traits`:           List traits (`?workload=` filter)
//! - `GET  /workloads`:        List workload types
//! - `GET  /workloads/:name`:  Get a workload type by name or alias
//! - `POST /workloads`:        Stage or apply a workload
//! - `GET  /envs`:             List environments
//! - `GET  /envs/:name`:       Get an environment

pub mod routes;

pub use routes::{app_router, AppState};
