use std::collections::BTreeMap;

use mw_model::Visibility;
use serde::{Deserialize, Serialize};

/// Default grace window: ten minutes.
pub const DEFAULT_GRACE_SECONDS: f64 = 600.0;

/// Tolerance for commits still propagating to mirrors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GracePolicy {
    pub grace_seconds: f64,
}

impl Default for GracePolicy {
    fn default() -> Self {
        Self {
            grace_seconds: DEFAULT_GRACE_SECONDS,
        }
    }
}

impl GracePolicy {
    pub fn from_minutes(minutes: u64) -> Self {
        Self {
            grace_seconds: minutes as f64 * 60.0,
        }
    }

    /// Inclusive: a commit exactly `grace_seconds` old is still in grace.
    pub fn in_grace(&self, commit_epoch: f64, now_epoch: f64) -> bool {
        now_epoch - commit_epoch <= self.grace_seconds
    }
}

/// Which authoritative partition a mirror is held against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorScope {
    /// Mirror carries private projects too; compared against `all`.
    Private,
    /// Mirror carries public projects only; compared against `public`.
    Public,
}

impl MirrorScope {
    pub fn visibility(&self) -> Visibility {
        match self {
            MirrorScope::Private => Visibility::All,
            MirrorScope::Public => Visibility::Public,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorScope::Private => "private",
            MirrorScope::Public => "public",
        }
    }
}

/// Outcome of checking one authoritative branch against the mirror.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BranchVerdict {
    Matched,
    MissingBranch,
    GracePeriod,
    Race,
    Diverged,
}

impl BranchVerdict {
    /// Verdicts that produce a problem line.
    pub fn is_problem(&self) -> bool {
        matches!(self, BranchVerdict::MissingBranch | BranchVerdict::Diverged)
    }
}

/// Accumulated diagnostic text per project (canonical name).
///
/// Projects without problems never appear as keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProblemReport {
    entries: BTreeMap<String, String>,
}

impl ProblemReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line for `project`.
    pub fn record(&mut self, project: &str, line: &str) {
        let text = self.entries.entry(project.to_string()).or_default();
        text.push_str(line);
        text.push('\n');
    }

    pub fn get(&self, project: &str) -> Option<&str> {
        self.entries.get(project).map(String::as_str)
    }

    pub fn contains(&self, project: &str) -> bool {
        self.entries.contains_key(project)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total recorded lines across all projects.
    pub fn line_count(&self) -> usize {
        self.entries.values().map(|t| t.lines().count()).sum()
    }
}

/// Per-comparison counts, logged by the caller after each mirror check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VerdictTally {
    pub matched: usize,
    pub grace: usize,
    pub race: usize,
    pub diverged: usize,
    pub missing_branch: usize,
    pub missing_project: usize,
}

impl VerdictTally {
    pub fn count(&mut self, verdict: BranchVerdict) {
        match verdict {
            BranchVerdict::Matched => self.matched += 1,
            BranchVerdict::MissingBranch => self.missing_branch += 1,
            BranchVerdict::GracePeriod => self.grace += 1,
            BranchVerdict::Race => self.race += 1,
            BranchVerdict::Diverged => self.diverged += 1,
        }
    }

    pub fn branches_checked(&self) -> usize {
        self.matched + self.grace + self.race + self.diverged + self.missing_branch
    }
}

/// Result of one (authoritative, mirror) comparison.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconcileReport {
    pub mirror: String,
    pub scope: MirrorScope,
    pub problems: ProblemReport,
    pub tally: VerdictTally,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}
