//! Apply pipeline: stage or persist an assembled workload.
//!
//! Two terminal outcomes:
//!
//! ```text
//! WorkloadInstance ──staging──▶ Staged  { resource }            (no store access)
//!                  └─────────▶ Applied { resource, action }     (create, else update)
//! ```
//!
//! The pipeline never retries. Retry policy belongs to whoever owns the
//! store client.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PlaneError;
use crate::store::{Resource, ResourceStore, WriteAction};
use crate::workload::WorkloadInstance;

/// Outcome of a successful apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplyResult {
    /// Rendered only; the store was not contacted.
    Staged { resource: Resource },
    /// Written to the store.
    Applied {
        resource: Resource,
        action: WriteAction,
        applied_at: DateTime<Utc>,
    },
}

impl ApplyResult {
    /// The rendered resource, whichever the outcome.
    pub fn resource(&self) -> &Resource {
        match self {
            Self::Staged { resource } | Self::Applied { resource, .. } => resource,
        }
    }

    pub fn is_staged(&self) -> bool {
        matches!(self, Self::Staged { .. })
    }
}

/// Stages or applies workload instances against one store.
#[derive(Clone)]
pub struct ApplyPipeline {
    store: Arc<dyn ResourceStore>,
}

impl ApplyPipeline {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Stage or apply `instance`, consuming it.
    pub async fn apply(&self, instance: WorkloadInstance) -> Result<ApplyResult, PlaneError> {
        let resource = instance.render();

        if instance.staging {
            log::debug!("Staged {} without touching the store", resource.key());
            return Ok(ApplyResult::Staged { resource });
        }

        let action = self
            .store
            .create_or_update(&resource)
            .await
            .map_err(|source| PlaneError::Apply {
                resource: resource.key().to_string(),
                source,
            })?;
        log::info!("{} {}", resource.key(), action);

        Ok(ApplyResult::Applied {
            resource,
            action,
            applied_at: Utc::now(),
        })
    }

    /// Like [`apply`](Self::apply), but gives up when `cancelled` completes
    /// first.
    ///
    /// Giving up mid-write is reported as [`PlaneError::Cancelled`]: the store
    /// may or may not hold the resource afterwards.
    pub async fn apply_until<F>(
        &self,
        instance: WorkloadInstance,
        cancelled: F,
    ) -> Result<ApplyResult, PlaneError>
    where
        F: Future<Output = ()>,
    {
        let resource = instance.key().to_string();
        tokio::select! {
            biased;
            result = self.apply(instance) => result,
            _ = cancelled => {
                log::warn!("Apply of {} cancelled before the store confirmed it", resource);
                Err(PlaneError::Cancelled { resource })
            }
        }
    }
}
