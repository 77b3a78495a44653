//! mw-model
//!
//! Normalized project -> branch -> commit state shared by every source adapter,
//! the snapshot cache and the reconciliation engine.
//!
//! Pure data. No IO, no HTTP, no time source. Everything here is built once
//! during a catalog build (or loaded wholesale from cache) and is read-only
//! afterwards.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Timestamp used when a branch has no recorded commit time.
pub const EPOCH_ZERO: f64 = 0.0;

// ---------------------------------------------------------------------------
// Commit / branch
// ---------------------------------------------------------------------------

/// Tip commit of a branch.
///
/// Equality and hashing consider only `id`; two refs pointing at the same
/// revision are the same commit even if providers disagree on its timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRef {
    /// Opaque SHA / revision identifier.
    #[serde(rename = "commit_id")]
    pub id: String,
    /// Commit time as UTC epoch seconds. Missing values decode as [`EPOCH_ZERO`].
    #[serde(default)]
    pub timestamp: f64,
}

impl CommitRef {
    pub fn new(id: impl Into<String>, timestamp: f64) -> Self {
        Self {
            id: id.into(),
            timestamp,
        }
    }

    /// First seven characters of the id, for diagnostics.
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

impl PartialEq for CommitRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CommitRef {}

impl Hash for CommitRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Abbreviate a revision id to seven characters (char-boundary safe).
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(7) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// One branch reference of a project, keyed by its normalized name
/// (`refs/heads/` stripped, `HEAD` never present).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchState {
    pub name: String,
    #[serde(flatten)]
    pub commit: CommitRef,
}

impl BranchState {
    pub fn new(name: impl Into<String>, commit: CommitRef) -> Self {
        Self {
            name: name.into(),
            commit,
        }
    }
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// All branches of one project as seen by one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    /// Provider-native project name; may contain path segments (`group/sub`).
    pub original_name: String,
    pub branches: BTreeMap<String, BranchState>,
}

impl ProjectSnapshot {
    pub fn new(original_name: impl Into<String>) -> Self {
        Self {
            original_name: original_name.into(),
            branches: BTreeMap::new(),
        }
    }

    /// Insert a branch keyed by its name. A later branch with the same name
    /// replaces the earlier one, so names stay unique per project.
    pub fn insert_branch(&mut self, branch: BranchState) {
        self.branches.insert(branch.name.clone(), branch);
    }

    pub fn branch(&self, name: &str) -> Option<&BranchState> {
        self.branches.get(name)
    }

    /// Trailing path segment of the native name, used to match projects across providers.
    pub fn canonical_name(&self) -> &str {
        canonical_name(&self.original_name)
    }
}

/// Trailing segment after the last `/` (the whole name when there is none).
pub fn canonical_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Full normalized state of one source: native project name -> snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    projects: BTreeMap<String, ProjectSnapshot>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, project: ProjectSnapshot) {
        self.projects.insert(project.original_name.clone(), project);
    }

    pub fn project(&self, name: &str) -> Option<&ProjectSnapshot> {
        self.projects.get(name)
    }

    pub fn projects(&self) -> impl Iterator<Item = &ProjectSnapshot> {
        self.projects.values()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Total number of branches across all projects.
    pub fn branch_count(&self) -> usize {
        self.projects.values().map(|p| p.branches.len()).sum()
    }

    fn branch(&self, project: &str, branch: &str) -> Option<&BranchState> {
        self.projects.get(project)?.branch(branch)
    }

    pub fn project_exists(&self, project: &str) -> bool {
        self.projects.contains_key(project)
    }

    pub fn branch_exists(&self, project: &str, branch: &str) -> bool {
        self.branch(project, branch).is_some()
    }

    pub fn branch_commit_matches(&self, project: &str, branch: &str, commit_id: &str) -> bool {
        self.branch(project, branch)
            .map(|b| b.commit.id == commit_id)
            .unwrap_or(false)
    }

    /// Commit time of the branch tip, or [`EPOCH_ZERO`] when the branch is absent.
    pub fn timestamp_of(&self, project: &str, branch: &str) -> f64 {
        self.branch(project, branch)
            .map(|b| b.commit.timestamp)
            .unwrap_or(EPOCH_ZERO)
    }

    /// Tip commit id, for diagnostic messages only.
    pub fn latest_commit_id(&self, project: &str, branch: &str) -> Option<&str> {
        self.branch(project, branch).map(|b| b.commit.id.as_str())
    }
}

impl FromIterator<ProjectSnapshot> for Catalog {
    fn from_iter<I: IntoIterator<Item = ProjectSnapshot>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for p in iter {
            catalog.insert(p);
        }
        catalog
    }
}

// ---------------------------------------------------------------------------
// Visibility partitions
// ---------------------------------------------------------------------------

/// Which view of a source a catalog represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Everything the authenticated identity can read.
    All,
    /// Only anonymously readable projects.
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::All => "all",
            Visibility::Public => "public",
        }
    }
}

/// The catalog(s) held by one source.
///
/// Sources that do not distinguish visibility only carry `all`; asking them
/// for the public view returns the same catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionedCatalog {
    pub source: String,
    pub all: Catalog,
    pub public: Option<Catalog>,
}

impl PartitionedCatalog {
    pub fn single(source: impl Into<String>, all: Catalog) -> Self {
        Self {
            source: source.into(),
            all,
            public: None,
        }
    }

    pub fn partitioned(source: impl Into<String>, all: Catalog, public: Catalog) -> Self {
        Self {
            source: source.into(),
            all,
            public: Some(public),
        }
    }

    pub fn is_partitioned(&self) -> bool {
        self.public.is_some()
    }

    pub fn for_visibility(&self, visibility: Visibility) -> &Catalog {
        match visibility {
            Visibility::All => &self.all,
            Visibility::Public => self.public.as_ref().unwrap_or(&self.all),
        }
    }
}
