//! mw-source
//!
//! Source-control provider adapters and catalog construction.
//!
//! This crate owns the adapter abstraction ([`SourceAdapter`]), the three
//! concrete providers (Gerrit as the authoritative host, GitHub and GitLab as
//! mirrors), and the machinery that turns an adapter into a published,
//! read-only [`PartitionedCatalog`]:
//!
//! - [`builder`]: bounded-concurrency live build with an overall deadline;
//! - [`registry`]: run-scoped, build-once access to each source's catalog,
//!   either live or replayed from the snapshot cache.
//!
//! It does **not** compare catalogs; that is `mw-reconcile`.

pub mod builder;
pub mod error;
pub mod gerrit;
pub mod github;
pub mod gitlab;
pub mod http;
pub mod normalizer;
pub mod pagination;
pub mod registry;

pub use builder::{build_catalog, BuildOptions};
pub use error::SourceError;
pub use gerrit::GerritAdapter;
pub use github::GithubAdapter;
pub use gitlab::GitlabAdapter;
pub use http::{Auth, HttpClient, RequestPolicy};
pub use normalizer::{branch_key, TimestampFormat};
pub use registry::{CatalogMode, CatalogRegistry};

pub use mw_model::{PartitionedCatalog, Visibility};

use serde::Deserialize;

/// A project as listed by a provider, before branches are fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProject {
    /// Provider-native name (catalog key).
    pub name: String,
    /// Identifier used in API paths (numeric id, URL-encoded name, …).
    pub id: String,
}

impl RemoteProject {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// A branch tip as listed by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteBranch {
    /// Normalized branch name (see [`branch_key`]).
    pub name: String,
    pub commit_id: String,
    /// Present when the provider returns commit time inline with the listing.
    pub timestamp: Option<f64>,
}

/// Capability interface every provider implements.
///
/// Adapters only fetch and normalize. Filtering, concurrency, deadlines and
/// publication live in [`builder`] and [`registry`].
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Display name; also the snapshot cache key.
    fn name(&self) -> &str;

    /// `true` when the provider yields different project sets for
    /// authenticated and anonymous callers.
    fn supports_visibility_partitions(&self) -> bool {
        false
    }

    async fn list_projects(&self, visibility: Visibility)
        -> Result<Vec<RemoteProject>, SourceError>;

    async fn list_branches(
        &self,
        project: &RemoteProject,
        visibility: Visibility,
    ) -> Result<Vec<RemoteBranch>, SourceError>;

    /// Commit time of `commit_id` as UTC epoch seconds.
    async fn resolve_commit_timestamp(
        &self,
        project: &RemoteProject,
        commit_id: &str,
        visibility: Visibility,
    ) -> Result<f64, SourceError>;
}

/// `{"committer": {"date": "…"}}` commit payload (Gerrit, GitHub).
#[derive(Debug, Deserialize)]
pub(crate) struct CommitPayload {
    pub committer: CommitPerson,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitPerson {
    pub date: String,
}

/// Reject blank credentials at construction time.
pub(crate) fn require_credential(source: &str, what: &str, value: &str) -> Result<(), SourceError> {
    if value.trim().is_empty() {
        return Err(SourceError::Config(format!(
            "{source}: missing required credential '{what}'"
        )));
    }
    Ok(())
}

pub(crate) fn trim_base(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}
