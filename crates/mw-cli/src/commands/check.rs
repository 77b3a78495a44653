//! `mirrorwatch check`: build or replay every catalog, reconcile each mirror
//! against the authoritative source, publish and notify.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::future::{join, join_all};
use mw_config::{MirrorVisibility, MirrorwatchConfig};
use mw_reconcile::{reconcile, GracePolicy, MirrorScope, ReconcileReport};
use mw_report::{ConsoleReport, HtmlReport, ReportSink, WebhookNotifier};
use mw_source::CatalogMode;
use tracing::{error, info, warn};

use super::{build_registry, catalog_mode, load_credentials_file, load_settings, CheckArgs};

pub async fn run(args: CheckArgs) -> Result<()> {
    let (_loaded, cfg) = load_settings(&args.source.config_paths)?;
    let mode = catalog_mode(args.replay);
    let file = load_credentials_file(args.source.credentials.as_ref())?;
    let creds = mw_config::resolve_credentials(&cfg, file.as_ref(), mode == CatalogMode::Live)?;
    let registry = build_registry(&cfg, &creds, mode)?;

    let auth_name = cfg.authoritative.name.as_str();
    let (authoritative, mirror_results) = join(
        registry.catalog(auth_name),
        join_all(cfg.mirrors.iter().map(|m| registry.catalog(&m.name))),
    )
    .await;

    let authoritative = authoritative
        .with_context(|| format!("authoritative catalog '{auth_name}' unavailable"))?;
    info!(
        source = auth_name,
        projects = authoritative.all.len(),
        branches = authoritative.all.branch_count(),
        "authoritative catalog ready"
    );

    let now = chrono::Utc::now().timestamp() as f64;
    let policy = GracePolicy::from_minutes(cfg.run.grace_minutes);

    let mut reports: Vec<ReconcileReport> = Vec::new();
    let mut failed: Vec<&str> = Vec::new();
    for (m, result) in cfg.mirrors.iter().zip(mirror_results) {
        let mirror = match result {
            Ok(c) => c,
            Err(e) => {
                error!(mirror = %m.name, error = %e, "mirror catalog unavailable; skipped");
                failed.push(m.name.as_str());
                continue;
            }
        };
        let report = reconcile(
            authoritative,
            &m.name,
            &mirror.all,
            scope_of(m.visibility),
            &policy,
            now,
        );
        let t = report.tally;
        info!(
            mirror = %m.name,
            scope = report.scope.as_str(),
            matched = t.matched,
            grace = t.grace,
            race = t.race,
            diverged = t.diverged,
            missing_branch = t.missing_branch,
            missing_project = t.missing_project,
            problem_projects = report.problems.len(),
            "mirror reconciled"
        );
        reports.push(report);
    }

    ConsoleReport.publish(&reports)?;
    HtmlReport::new(&cfg.run.report_dir).publish(&reports)?;
    log_report_url(&cfg);

    if args.no_notify {
        info!("notification disabled by flag");
    } else if let Some(url) = creds.webhook.as_deref() {
        let timeout = Duration::from_secs(cfg.run.request_timeout_secs);
        let notifier = WebhookNotifier::new(url, timeout)?;
        mw_report::notify(&notifier, &reports).await;
    }

    if !failed.is_empty() {
        bail!("mirror catalog(s) unavailable: {}", failed.join(", "));
    }
    let problem_projects: usize = reports.iter().map(|r| r.problems.len()).sum();
    if args.fail_on_problems && problem_projects > 0 {
        bail!("{problem_projects} project(s) out of sync across mirrors");
    }
    Ok(())
}

fn scope_of(v: MirrorVisibility) -> MirrorScope {
    match v {
        MirrorVisibility::Private => MirrorScope::Private,
        MirrorVisibility::Public => MirrorScope::Public,
    }
}

/// CI location of the html report, when running under a job.
fn log_report_url(cfg: &MirrorwatchConfig) {
    let job = std::env::var("JOB_NAME").ok().filter(|s| !s.is_empty());
    let build = std::env::var("BUILD_NUMBER").ok().filter(|s| !s.is_empty());
    match (job, build) {
        (Some(job), Some(build)) => match cfg.run.report_url(&job, &build) {
            Some(url) => info!(url = %url, "report published"),
            None => warn!("JOB_NAME and BUILD_NUMBER set but run.report_url_template is missing"),
        },
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_maps_to_scope() {
        assert_eq!(scope_of(MirrorVisibility::Private), MirrorScope::Private);
        assert_eq!(scope_of(MirrorVisibility::Public), MirrorScope::Public);
    }
}
