//! mw-report
//!
//! Output sinks for reconciliation results:
//! - [`ConsoleReport`]: one ASCII table per mirror on stdout;
//! - [`HtmlReport`]: the same tables as a static `index.html`;
//! - [`notify`]: the aggregated summary pushed to a chat webhook.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mw_reconcile::ReconcileReport;
use tracing::info;

pub mod html;
pub mod notify;
pub mod table;

pub use notify::{notify, summarize, NotifySink, WebhookNotifier};
pub use table::AsciiTable;

pub const REPORT_FILE: &str = "index.html";

/// Consumes the per-mirror reports of one run.
pub trait ReportSink {
    fn publish(&self, reports: &[ReconcileReport]) -> Result<()>;
}

/// Table for one mirror, titled with the mirror name.
pub fn render_table(report: &ReconcileReport) -> String {
    let mut table = AsciiTable::new(&["project", "problem(s)"])
        .with_title(report.mirror.clone())
        .with_inner_row_border();
    for (project, problem) in report.problems.iter() {
        table.push_row(vec![project.to_string(), problem.to_string()]);
    }
    table.render()
}

/// All tables, each preceded by a blank line.
pub fn render_text(reports: &[ReconcileReport]) -> String {
    reports
        .iter()
        .map(|r| format!("\n{}", render_table(r)))
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReport;

impl ReportSink for ConsoleReport {
    fn publish(&self, reports: &[ReconcileReport]) -> Result<()> {
        print!("{}", render_text(reports));
        Ok(())
    }
}

/// Writes `{dir}/index.html`, replacing any previous report.
#[derive(Debug, Clone)]
pub struct HtmlReport {
    dir: PathBuf,
}

impl HtmlReport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(REPORT_FILE)
    }

    fn write(&self, path: &Path, body: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create report dir: {}", self.dir.display()))?;
        fs::write(path, body)
            .with_context(|| format!("failed to write report: {}", path.display()))
    }
}

impl ReportSink for HtmlReport {
    fn publish(&self, reports: &[ReconcileReport]) -> Result<()> {
        let sections: Vec<String> = reports.iter().map(render_table).collect();
        let doc = html::html_document("mirrorwatch report", &sections);
        let path = self.path();
        self.write(&path, &doc)?;
        info!(path = %path.display(), mirrors = reports.len(), "html report written");
        Ok(())
    }
}
