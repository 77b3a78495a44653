//! Live catalog construction.
//!
//! # Invariants
//! - Excluded projects (name-prefix filter) are dropped right after listing,
//!   before any per-project request, for every partition alike.
//! - Per-project fetches run on a bounded pool (`concurrency`) and results
//!   keep the provider's discovery order.
//! - Any error aborts the whole build; a partially populated catalog is never
//!   returned.
//! - The build as a whole is bounded by `deadline`.

use std::time::Duration;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use mw_model::{BranchState, Catalog, CommitRef, PartitionedCatalog, ProjectSnapshot, Visibility};
use tracing::{debug, info};

use crate::{RemoteProject, SourceAdapter, SourceError};

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Maximum number of projects fetched at once per partition.
    pub concurrency: usize,
    /// Projects whose native name starts with any of these are skipped.
    pub exclude_prefixes: Vec<String>,
    /// Upper bound for one source's full build.
    pub deadline: Duration,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            exclude_prefixes: Vec::new(),
            deadline: DEFAULT_DEADLINE,
        }
    }
}

impl BuildOptions {
    pub fn is_excluded(&self, project_name: &str) -> bool {
        self.exclude_prefixes
            .iter()
            .any(|p| !p.is_empty() && project_name.starts_with(p.as_str()))
    }
}

/// Build every partition the adapter supports and publish them together.
pub async fn build_catalog(
    adapter: &dyn SourceAdapter,
    opts: &BuildOptions,
) -> Result<PartitionedCatalog, SourceError> {
    let source = adapter.name().to_string();
    let started = std::time::Instant::now();

    let work = async {
        if adapter.supports_visibility_partitions() {
            let (all, public) = futures_util::future::try_join(
                build_partition(adapter, Visibility::All, opts),
                build_partition(adapter, Visibility::Public, opts),
            )
            .await?;
            Ok(PartitionedCatalog::partitioned(source.clone(), all, public))
        } else {
            let all = build_partition(adapter, Visibility::All, opts).await?;
            Ok(PartitionedCatalog::single(source.clone(), all))
        }
    };

    let catalog = match tokio::time::timeout(opts.deadline, work).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(SourceError::Deadline {
                source,
                secs: opts.deadline.as_secs(),
            })
        }
    };

    info!(
        source = %catalog.source,
        projects = catalog.all.len(),
        branches = catalog.all.branch_count(),
        public_projects = catalog.public.as_ref().map(|c| c.len()),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "catalog built"
    );
    Ok(catalog)
}

/// Build one visibility partition of a source.
pub async fn build_partition(
    adapter: &dyn SourceAdapter,
    visibility: Visibility,
    opts: &BuildOptions,
) -> Result<Catalog, SourceError> {
    let listed = adapter.list_projects(visibility).await?;
    let total = listed.len();
    let kept: Vec<RemoteProject> = listed
        .into_iter()
        .filter(|p| !opts.is_excluded(&p.name))
        .collect();

    info!(
        source = adapter.name(),
        visibility = visibility.as_str(),
        listed = total,
        kept = kept.len(),
        "projects listed"
    );

    let snapshots: Vec<ProjectSnapshot> = stream::iter(kept.iter())
        .map(|project| fetch_project(adapter, project, visibility))
        .buffered(opts.concurrency.max(1))
        .try_collect()
        .await?;

    Ok(snapshots.into_iter().collect())
}

async fn fetch_project(
    adapter: &dyn SourceAdapter,
    project: &RemoteProject,
    visibility: Visibility,
) -> Result<ProjectSnapshot, SourceError> {
    debug!(source = adapter.name(), project = %project.name, "fetching branches");
    let branches = adapter.list_branches(project, visibility).await?;

    let mut snapshot = ProjectSnapshot::new(project.name.clone());
    for branch in branches {
        let timestamp = match branch.timestamp {
            Some(ts) => ts,
            None => {
                adapter
                    .resolve_commit_timestamp(project, &branch.commit_id, visibility)
                    .await?
            }
        };
        snapshot.insert_branch(BranchState::new(
            branch.name,
            CommitRef::new(branch.commit_id, timestamp),
        ));
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RemoteBranch;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeAdapter {
        partitions: bool,
        inline_timestamps: bool,
        commit_lookups: AtomicUsize,
        branch_lookups: Mutex<Vec<String>>,
        fail_project: Option<&'static str>,
    }

    impl FakeAdapter {
        fn new() -> Self {
            Self {
                partitions: false,
                inline_timestamps: false,
                commit_lookups: AtomicUsize::new(0),
                branch_lookups: Mutex::new(Vec::new()),
                fail_project: None,
            }
        }
    }

    #[async_trait::async_trait]
    impl SourceAdapter for FakeAdapter {
        fn name(&self) -> &str {
            "fake"
        }

        fn supports_visibility_partitions(&self) -> bool {
            self.partitions
        }

        async fn list_projects(
            &self,
            visibility: Visibility,
        ) -> Result<Vec<RemoteProject>, SourceError> {
            let mut out = vec![
                RemoteProject::new("deepin/dde", "1"),
                RemoteProject::new("legacy/old", "2"),
            ];
            if visibility == Visibility::All {
                out.push(RemoteProject::new("secret", "3"));
            }
            Ok(out)
        }

        async fn list_branches(
            &self,
            project: &RemoteProject,
            _visibility: Visibility,
        ) -> Result<Vec<RemoteBranch>, SourceError> {
            self.branch_lookups
                .lock()
                .unwrap()
                .push(project.name.clone());
            if self.fail_project == Some(project.name.as_str()) {
                return Err(SourceError::Status {
                    url: project.name.clone(),
                    status: 500,
                });
            }
            Ok(vec![RemoteBranch {
                name: "master".to_string(),
                commit_id: format!("sha-{}", project.id),
                timestamp: self.inline_timestamps.then_some(42.0),
            }])
        }

        async fn resolve_commit_timestamp(
            &self,
            _project: &RemoteProject,
            _commit_id: &str,
            _visibility: Visibility,
        ) -> Result<f64, SourceError> {
            self.commit_lookups.fetch_add(1, Ordering::SeqCst);
            Ok(7.0)
        }
    }

    fn opts() -> BuildOptions {
        BuildOptions {
            concurrency: 2,
            exclude_prefixes: vec!["legacy/".to_string()],
            deadline: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn excluded_projects_are_never_fetched() {
        let adapter = FakeAdapter::new();
        let catalog = build_catalog(&adapter, &opts()).await.unwrap();

        assert!(!catalog.is_partitioned());
        assert!(catalog.all.project_exists("deepin/dde"));
        assert!(catalog.all.project_exists("secret"));
        assert!(!catalog.all.project_exists("legacy/old"));
        let fetched = adapter.branch_lookups.lock().unwrap().clone();
        assert!(!fetched.iter().any(|p| p == "legacy/old"));
    }

    #[tokio::test]
    async fn missing_inline_timestamp_triggers_commit_lookup() {
        let adapter = FakeAdapter::new();
        let catalog = build_catalog(&adapter, &opts()).await.unwrap();
        assert_eq!(adapter.commit_lookups.load(Ordering::SeqCst), 2);
        assert_eq!(catalog.all.timestamp_of("deepin/dde", "master"), 7.0);
    }

    #[tokio::test]
    async fn inline_timestamp_skips_commit_lookup() {
        let adapter = FakeAdapter {
            inline_timestamps: true,
            ..FakeAdapter::new()
        };
        let catalog = build_catalog(&adapter, &opts()).await.unwrap();
        assert_eq!(adapter.commit_lookups.load(Ordering::SeqCst), 0);
        assert_eq!(catalog.all.timestamp_of("deepin/dde", "master"), 42.0);
    }

    #[tokio::test]
    async fn partitioned_source_builds_public_view() {
        let adapter = FakeAdapter {
            partitions: true,
            ..FakeAdapter::new()
        };
        let catalog = build_catalog(&adapter, &opts()).await.unwrap();
        let public = catalog.for_visibility(Visibility::Public);
        assert!(catalog.all.project_exists("secret"));
        assert!(!public.project_exists("secret"));
        assert!(public.project_exists("deepin/dde"));
    }

    #[tokio::test]
    async fn one_failing_project_fails_the_build() {
        let adapter = FakeAdapter {
            fail_project: Some("secret"),
            ..FakeAdapter::new()
        };
        let err = build_catalog(&adapter, &opts()).await.unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 500, .. }));
    }

    #[test]
    fn exclusion_is_prefix_based() {
        let o = opts();
        assert!(o.is_excluded("legacy/old"));
        assert!(!o.is_excluded("deepin/legacy"));
        assert!(!BuildOptions::default().is_excluded("anything"));
    }
}
