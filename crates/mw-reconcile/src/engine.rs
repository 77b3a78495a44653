use std::collections::BTreeMap;

use chrono::DateTime;
use mw_model::{canonical_name, short_id, Catalog, CommitRef, PartitionedCatalog, EPOCH_ZERO};

use crate::{BranchVerdict, GracePolicy, MirrorScope, ProblemReport, ReconcileReport, VerdictTally};

pub const PROJECT_NOT_FOUND: &str = "project not found";

/// Classify one authoritative branch tip against the mirror's tip.
///
/// Order matters and short-circuits:
/// missing branch, matched, grace period, race, diverged.
pub fn classify_branch(
    authoritative: &CommitRef,
    mirror: Option<&CommitRef>,
    policy: &GracePolicy,
    now_epoch: f64,
) -> BranchVerdict {
    let Some(mirror) = mirror else {
        return BranchVerdict::MissingBranch;
    };
    if mirror == authoritative {
        return BranchVerdict::Matched;
    }
    // A branch without a recorded time is never excused.
    if authoritative.timestamp == EPOCH_ZERO {
        return BranchVerdict::Diverged;
    }
    if policy.in_grace(authoritative.timestamp, now_epoch) {
        return BranchVerdict::GracePeriod;
    }
    if mirror.timestamp > authoritative.timestamp {
        return BranchVerdict::Race;
    }
    BranchVerdict::Diverged
}

/// Compare the authoritative partition selected by `scope` against `mirror`.
///
/// Projects are matched on their canonical (trailing segment) name. A missing
/// project yields exactly one line and no branch checks. Projects with no
/// problems are absent from the report.
pub fn reconcile(
    authoritative: &PartitionedCatalog,
    mirror_name: &str,
    mirror: &Catalog,
    scope: MirrorScope,
    policy: &GracePolicy,
    now_epoch: f64,
) -> ReconcileReport {
    let baseline = authoritative.for_visibility(scope.visibility());
    let mirror_index = canonical_index(mirror);

    let mut problems = ProblemReport::new();
    let mut tally = VerdictTally::default();

    for project in baseline.projects() {
        let key = project.canonical_name();
        let Some(mirror_project) = mirror_index.get(key).copied() else {
            tally.missing_project += 1;
            problems.record(key, PROJECT_NOT_FOUND);
            continue;
        };

        for (branch_name, branch) in &project.branches {
            let mirror_commit = mirror
                .project(mirror_project)
                .and_then(|p| p.branch(branch_name))
                .map(|b| &b.commit);

            let verdict = classify_branch(&branch.commit, mirror_commit, policy, now_epoch);
            tally.count(verdict);

            match verdict {
                BranchVerdict::MissingBranch => {
                    problems.record(key, &format!("branch ({branch_name}) not found"));
                }
                BranchVerdict::Diverged => {
                    let line = diverged_line(mirror, mirror_project, branch_name, &branch.commit);
                    problems.record(key, &line);
                }
                BranchVerdict::Matched | BranchVerdict::GracePeriod | BranchVerdict::Race => {}
            }
        }
    }

    ReconcileReport {
        mirror: mirror_name.to_string(),
        scope,
        problems,
        tally,
    }
}

/// canonical name -> native mirror key. First native name wins on collision.
fn canonical_index(mirror: &Catalog) -> BTreeMap<&str, &str> {
    let mut index = BTreeMap::new();
    for project in mirror.projects() {
        index
            .entry(canonical_name(&project.original_name))
            .or_insert(project.original_name.as_str());
    }
    index
}

fn diverged_line(
    mirror: &Catalog,
    mirror_project: &str,
    branch: &str,
    authoritative: &CommitRef,
) -> String {
    let mirror_id = mirror.latest_commit_id(mirror_project, branch).unwrap_or("");
    let mirror_ts = mirror.timestamp_of(mirror_project, branch);
    format!(
        "mirror branch ({branch}) latest commit({}) time({}) != authoritative latest commit({}) time({})",
        short_id(mirror_id),
        format_epoch(mirror_ts),
        authoritative.short_id(),
        format_epoch(authoritative.timestamp),
    )
}

/// `YYYY-MM-DD HH:MM:SS` in UTC.
pub fn format_epoch(epoch: f64) -> String {
    match DateTime::from_timestamp(epoch.floor() as i64, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("{epoch}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: f64 = 1_500_000_000.0;

    fn c(id: &str, ts: f64) -> CommitRef {
        CommitRef::new(id, ts)
    }

    #[test]
    fn matched_short_circuits_timestamps() {
        let p = GracePolicy::default();
        // identical id, wildly different times
        let v = classify_branch(&c("abc", NOW - 99_999.0), Some(&c("abc", 0.0)), &p, NOW);
        assert_eq!(v, BranchVerdict::Matched);
    }

    #[test]
    fn missing_mirror_branch() {
        let v = classify_branch(&c("abc", NOW), None, &GracePolicy::default(), NOW);
        assert_eq!(v, BranchVerdict::MissingBranch);
        assert!(v.is_problem());
    }

    #[test]
    fn grace_is_inclusive() {
        let p = GracePolicy::default();
        let old = c("new", NOW - 600.0);
        let v = classify_branch(&old, Some(&c("old", 1.0)), &p, NOW);
        assert_eq!(v, BranchVerdict::GracePeriod);
    }

    #[test]
    fn mirror_ahead_is_a_race() {
        let p = GracePolicy::default();
        let auth = c("a", NOW - 3600.0);
        let v = classify_branch(&auth, Some(&c("m", NOW - 60.0)), &p, NOW);
        assert_eq!(v, BranchVerdict::Race);
        assert!(!v.is_problem());
    }

    #[test]
    fn equal_timestamps_diverge() {
        let p = GracePolicy::default();
        let auth = c("a", NOW - 3600.0);
        let v = classify_branch(&auth, Some(&c("m", NOW - 3600.0)), &p, NOW);
        assert_eq!(v, BranchVerdict::Diverged);
    }

    #[test]
    fn zero_timestamp_falls_through_to_diverged() {
        let p = GracePolicy::default();
        let v = classify_branch(&c("a", EPOCH_ZERO), Some(&c("m", NOW)), &p, NOW);
        assert_eq!(v, BranchVerdict::Diverged);
    }

    #[test]
    fn epoch_formatting_is_utc() {
        assert_eq!(format_epoch(1_459_492_987.0), "2016-04-01 06:43:07");
        assert_eq!(format_epoch(0.0), "1970-01-01 00:00:00");
    }

    #[test]
    fn grace_minutes_conversion() {
        assert_eq!(GracePolicy::from_minutes(10), GracePolicy::default());
    }
}
