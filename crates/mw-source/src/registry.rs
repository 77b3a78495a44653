//! Run-scoped catalog registry.
//!
//! One registry is created at the top of a run and handed by reference to
//! every comparison. Each registered source gets exactly one build attempt
//! per run, whatever the number of concurrent callers; the outcome (catalog
//! or error) is published once and shared.
//!
//! The registry mode is fixed at construction. In `Live` mode every source is
//! built from its adapter and then written to the snapshot cache; in `Replay`
//! mode every source is read from the cache and no network call is made.
//! Registering a source of the other kind is rejected.

use std::collections::BTreeMap;
use std::sync::Arc;

use mw_cache::SnapshotCache;
use mw_model::PartitionedCatalog;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::builder::{build_catalog, BuildOptions};
use crate::{SourceAdapter, SourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogMode {
    Live,
    Replay,
}

impl CatalogMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogMode::Live => "live",
            CatalogMode::Replay => "replay",
        }
    }
}

enum Origin {
    Live {
        adapter: Arc<dyn SourceAdapter>,
        /// Added to the registry-wide exclusions for this source only.
        exclude_prefixes: Vec<String>,
    },
    Replay,
}

struct Entry {
    origin: Origin,
    cell: OnceCell<Result<PartitionedCatalog, SourceError>>,
}

pub struct CatalogRegistry {
    mode: CatalogMode,
    options: BuildOptions,
    cache: Option<SnapshotCache>,
    entries: BTreeMap<String, Entry>,
}

impl CatalogRegistry {
    /// Replay mode needs a cache to read from.
    pub fn new(
        mode: CatalogMode,
        options: BuildOptions,
        cache: Option<SnapshotCache>,
    ) -> Result<Self, SourceError> {
        if mode == CatalogMode::Replay && cache.is_none() {
            return Err(SourceError::Config(
                "replay mode requires a snapshot cache directory".to_string(),
            ));
        }
        Ok(Self {
            mode,
            options,
            cache,
            entries: BTreeMap::new(),
        })
    }

    pub fn mode(&self) -> CatalogMode {
        self.mode
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    /// Register a source built from `adapter`. Live registries only.
    pub fn register_live(&mut self, adapter: Arc<dyn SourceAdapter>) -> Result<(), SourceError> {
        self.register_live_excluding(adapter, Vec::new())
    }

    /// Like [`Self::register_live`], skipping projects whose native name starts
    /// with any of `exclude_prefixes` in this source only.
    pub fn register_live_excluding(
        &mut self,
        adapter: Arc<dyn SourceAdapter>,
        exclude_prefixes: Vec<String>,
    ) -> Result<(), SourceError> {
        if self.mode != CatalogMode::Live {
            return Err(mixed_modes(adapter.name(), self.mode));
        }
        let name = adapter.name().to_string();
        self.insert(
            name,
            Origin::Live {
                adapter,
                exclude_prefixes,
            },
        )
    }

    /// Register a source replayed from the cache. Replay registries only.
    pub fn register_replay(&mut self, name: impl Into<String>) -> Result<(), SourceError> {
        let name = name.into();
        if self.mode != CatalogMode::Replay {
            return Err(mixed_modes(&name, self.mode));
        }
        self.insert(name, Origin::Replay)
    }

    fn insert(&mut self, name: String, origin: Origin) -> Result<(), SourceError> {
        if self.entries.contains_key(&name) {
            return Err(SourceError::Config(format!(
                "source '{name}' registered twice"
            )));
        }
        self.entries.insert(
            name,
            Entry {
                origin,
                cell: OnceCell::new(),
            },
        );
        Ok(())
    }

    /// The published catalog for `source`, building or loading it on first use.
    pub async fn catalog(&self, source: &str) -> Result<&PartitionedCatalog, SourceError> {
        let entry = self.entries.get(source).ok_or_else(|| {
            SourceError::Config(format!("source '{source}' is not registered"))
        })?;

        entry
            .cell
            .get_or_init(|| self.load(source, &entry.origin))
            .await
            .as_ref()
            .map_err(Clone::clone)
    }

    async fn load(&self, source: &str, origin: &Origin) -> Result<PartitionedCatalog, SourceError> {
        match origin {
            Origin::Live {
                adapter,
                exclude_prefixes,
            } => {
                let mut options = self.options.clone();
                options.exclude_prefixes.extend(exclude_prefixes.iter().cloned());
                let catalog = build_catalog(adapter.as_ref(), &options).await?;
                if let Some(cache) = &self.cache {
                    match cache.write(&catalog) {
                        Ok(paths) => info!(source, files = paths.len(), "snapshot cache written"),
                        Err(e) => warn!(source, error = %e, "snapshot cache write failed"),
                    }
                }
                Ok(catalog)
            }
            Origin::Replay => {
                let cache = self.cache.as_ref().ok_or_else(|| {
                    SourceError::Config("replay mode requires a snapshot cache".to_string())
                })?;
                let catalog = cache
                    .read(source)
                    .map_err(|e| SourceError::Cache(e.to_string()))?;
                info!(
                    source,
                    projects = catalog.all.len(),
                    "catalog loaded from snapshot cache"
                );
                Ok(catalog)
            }
        }
    }
}

fn mixed_modes(source: &str, mode: CatalogMode) -> SourceError {
    SourceError::Config(format!(
        "source '{source}' does not match the {} registry; mixing live and replay sources in one run is unsupported",
        mode.as_str()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RemoteBranch, RemoteProject};
    use mw_model::Visibility;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingAdapter {
        name: &'static str,
        listings: AtomicUsize,
        fail: bool,
    }

    impl CountingAdapter {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                listings: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl SourceAdapter for CountingAdapter {
        fn name(&self) -> &str {
            self.name
        }

        async fn list_projects(
            &self,
            _visibility: Visibility,
        ) -> Result<Vec<RemoteProject>, SourceError> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail {
                return Err(SourceError::Status {
                    url: "projects".to_string(),
                    status: 503,
                });
            }
            Ok(vec![RemoteProject::new("dde", "dde")])
        }

        async fn list_branches(
            &self,
            _project: &RemoteProject,
            _visibility: Visibility,
        ) -> Result<Vec<RemoteBranch>, SourceError> {
            Ok(vec![RemoteBranch {
                name: "master".to_string(),
                commit_id: "abc".to_string(),
                timestamp: Some(1.0),
            }])
        }

        async fn resolve_commit_timestamp(
            &self,
            _project: &RemoteProject,
            _commit_id: &str,
            _visibility: Visibility,
        ) -> Result<f64, SourceError> {
            Ok(1.0)
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_build() {
        let adapter = Arc::new(CountingAdapter::new("Gerrit"));
        let mut reg = CatalogRegistry::new(CatalogMode::Live, BuildOptions::default(), None).unwrap();
        reg.register_live(adapter.clone()).unwrap();

        let results = futures_util::future::join_all((0..4).map(|_| reg.catalog("Gerrit"))).await;
        for r in &results {
            assert!(r.as_ref().unwrap().all.project_exists("dde"));
        }
        assert_eq!(adapter.listings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_build_is_not_retried_within_a_run() {
        let adapter = Arc::new(CountingAdapter {
            fail: true,
            ..CountingAdapter::new("Github")
        });
        let mut reg = CatalogRegistry::new(CatalogMode::Live, BuildOptions::default(), None).unwrap();
        reg.register_live(adapter.clone()).unwrap();

        assert!(reg.catalog("Github").await.is_err());
        assert!(reg.catalog("Github").await.is_err());
        assert_eq!(adapter.listings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn live_build_charges_cache_for_replay() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path());

        let mut live = CatalogRegistry::new(
            CatalogMode::Live,
            BuildOptions::default(),
            Some(cache.clone()),
        )
        .unwrap();
        live.register_live(Arc::new(CountingAdapter::new("Gitlab")))
            .unwrap();
        let built = live.catalog("Gitlab").await.unwrap().clone();

        let mut replay =
            CatalogRegistry::new(CatalogMode::Replay, BuildOptions::default(), Some(cache)).unwrap();
        replay.register_replay("Gitlab").unwrap();
        let replayed = replay.catalog("Gitlab").await.unwrap();

        assert_eq!(replayed.all, built.all);
        assert_eq!(replayed.all.timestamp_of("dde", "master"), 1.0);
    }

    #[test]
    fn mixing_modes_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut replay = CatalogRegistry::new(
            CatalogMode::Replay,
            BuildOptions::default(),
            Some(SnapshotCache::new(dir.path())),
        )
        .unwrap();
        let err = replay
            .register_live(Arc::new(CountingAdapter::new("Gerrit")))
            .unwrap_err();
        assert!(matches!(err, SourceError::Config(_)));

        let mut live = CatalogRegistry::new(CatalogMode::Live, BuildOptions::default(), None).unwrap();
        assert!(live.register_replay("Gerrit").is_err());
    }

    #[tokio::test]
    async fn exclusions_apply_only_to_their_source() {
        let mut reg = CatalogRegistry::new(CatalogMode::Live, BuildOptions::default(), None).unwrap();
        reg.register_live_excluding(Arc::new(CountingAdapter::new("Gerrit")), vec!["dd".into()])
            .unwrap();
        reg.register_live(Arc::new(CountingAdapter::new("Github")))
            .unwrap();

        let gerrit = reg.catalog("Gerrit").await.unwrap();
        assert!(!gerrit.all.project_exists("dde"));
        let github = reg.catalog("Github").await.unwrap();
        assert!(github.all.project_exists("dde"));
    }

    #[test]
    fn replay_without_cache_is_rejected() {
        assert!(CatalogRegistry::new(CatalogMode::Replay, BuildOptions::default(), None).is_err());
    }

    #[tokio::test]
    async fn unknown_source_is_a_config_error() {
        let reg = CatalogRegistry::new(CatalogMode::Live, BuildOptions::default(), None).unwrap();
        assert!(matches!(
            reg.catalog("nope").await,
            Err(SourceError::Config(_))
        ));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut reg = CatalogRegistry::new(CatalogMode::Live, BuildOptions::default(), None).unwrap();
        reg.register_live(Arc::new(CountingAdapter::new("Gerrit")))
            .unwrap();
        assert!(reg
            .register_live(Arc::new(CountingAdapter::new("Gerrit")))
            .is_err());
    }
}
