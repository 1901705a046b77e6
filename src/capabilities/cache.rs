//! Local capability cache: the installed-plugin source of definitions.
//!
//! The cache is read-only from the control plane's point of view. It is a
//! supplementary source: the registry degrades to cluster-only data when
//! the cache cannot be read.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::capability::{CapabilityDefinition, CapabilityKind, SourceOrigin};

/// Errors raised while reading the local cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Capability not installed: {kind} {name}")]
    NotFound { kind: CapabilityKind, name: String },
}

/// The locally installed capability cache.
#[async_trait]
pub trait CapabilityCache: Send + Sync {
    /// Every installed definition of `kind`, in cache order.
    async fn list_installed(
        &self,
        kind: CapabilityKind,
    ) -> Result<Vec<CapabilityDefinition>, CacheError>;

    /// One installed definition by name or short alias.
    async fn get_installed(
        &self,
        kind: CapabilityKind,
        name_or_alias: &str,
    ) -> Result<CapabilityDefinition, CacheError> {
        self.list_installed(kind)
            .await?
            .into_iter()
            .find(|c| c.answers_to(name_or_alias))
            .ok_or_else(|| CacheError::NotFound {
                kind,
                name: name_or_alias.to_string(),
            })
    }
}

// ============================================================================
// DirectoryCache
// ============================================================================

/// Cache backed by a directory tree of YAML files.
///
/// Each `*.yaml`/`*.yml` file holds either a single `capability:` or a
/// `capabilities:` list. Subdirectories are scanned recursively and files are
/// read in path order. A missing root directory is an empty cache.
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    root: PathBuf,
}

/// Wrapper for YAML list of definitions
#[derive(Debug, Deserialize)]
struct CapabilityListWrapper {
    capabilities: Vec<CapabilityDefinition>,
}

impl DirectoryCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parse one cache file into its definitions.
    fn parse_file(path: &Path, content: &str) -> Result<Vec<CapabilityDefinition>, CacheError> {
        // Try single definition first
        if let Ok(cap) = CapabilityDefinition::from_yaml(content) {
            return Ok(vec![cap]);
        }

        let list: CapabilityListWrapper =
            serde_yaml::from_str(content).map_err(|source| CacheError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(list.capabilities)
    }

    /// Read every definition below `dir`, in path order.
    async fn load_directory(&self, dir: &Path) -> Result<Vec<CapabilityDefinition>, CacheError> {
        let mut files = Vec::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&current).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if path
                    .extension()
                    .map_or(false, |ext| ext == "yaml" || ext == "yml")
                {
                    files.push(path);
                }
            }
        }
        files.sort();

        let mut definitions = Vec::new();
        for path in files {
            let content = tokio::fs::read_to_string(&path).await?;
            definitions.extend(Self::parse_file(&path, &content)?);
        }
        Ok(definitions)
    }
}

#[async_trait]
impl CapabilityCache for DirectoryCache {
    async fn list_installed(
        &self,
        kind: CapabilityKind,
    ) -> Result<Vec<CapabilityDefinition>, CacheError> {
        if !self.root.exists() {
            log::debug!("Capability cache {} does not exist", self.root.display());
            return Ok(Vec::new());
        }

        let definitions = self.load_directory(&self.root).await?;
        Ok(definitions
            .into_iter()
            .filter(|c| c.kind == kind)
            .map(|mut c| {
                c.source_origin = SourceOrigin::LocalCache;
                c
            })
            .collect())
    }
}

// ============================================================================
// StaticCache
// ============================================================================

/// Fixed in-memory cache, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCache {
    definitions: Vec<CapabilityDefinition>,
}

impl StaticCache {
    pub fn new(definitions: Vec<CapabilityDefinition>) -> Self {
        Self { definitions }
    }
}

#[async_trait]
impl CapabilityCache for StaticCache {
    async fn list_installed(
        &self,
        kind: CapabilityKind,
    ) -> Result<Vec<CapabilityDefinition>, CacheError> {
        Ok(self
            .definitions
            .iter()
            .filter(|c| c.kind == kind)
            .cloned()
            .map(|mut c| {
                c.source_origin = SourceOrigin::LocalCache;
                c
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKLOADS: &str = r#"
capabilities:
  - name: webservice
    shortAlias: web
    kind: workload
  - name: worker
    kind: workload
"#;

    const TRAIT: &str = r#"
capability:
  name: autoscaler
  kind: trait
  appliesToWorkloads: [webservice]
"#;

    #[tokio::test]
    async fn test_directory_cache_reads_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("workloads.yaml"), WORKLOADS).unwrap();
        std::fs::create_dir(dir.path().join("traits")).unwrap();
        std::fs::write(dir.path().join("traits").join("autoscaler.yml"), TRAIT).unwrap();
        std::fs::write(dir.path().join("README.md"), "not a capability").unwrap();

        let cache = DirectoryCache::new(dir.path());

        let workloads = cache.list_installed(CapabilityKind::Workload).await.unwrap();
        let names: Vec<&str> = workloads.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["webservice", "worker"]);
        assert!(workloads
            .iter()
            .all(|c| c.source_origin == SourceOrigin::LocalCache));

        let traits = cache.list_installed(CapabilityKind::Trait).await.unwrap();
        assert_eq!(traits.len(), 1);
        assert_eq!(traits[0].applies_to_workloads, vec!["webservice"]);

        let web = cache
            .get_installed(CapabilityKind::Workload, "web")
            .await
            .unwrap();
        assert_eq!(web.name, "webservice");
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DirectoryCache::new(dir.path().join("absent"));
        assert!(cache
            .list_installed(CapabilityKind::Trait)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.yaml"), "capability: [not, a, map]").unwrap();

        let cache = DirectoryCache::new(dir.path());
        let result = cache.list_installed(CapabilityKind::Workload).await;
        assert!(matches!(result, Err(CacheError::Yaml { .. })));
    }

    #[tokio::test]
    async fn test_get_installed_not_found() {
        let cache = StaticCache::default();
        let result = cache.get_installed(CapabilityKind::Trait, "ghost").await;
        assert!(matches!(result, Err(CacheError::NotFound { .. })));
    }
}
