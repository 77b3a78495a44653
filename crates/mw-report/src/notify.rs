//! Chat notification of the aggregated problem summary.

use std::time::Duration;

use anyhow::{Context, Result};
use mw_reconcile::ReconcileReport;
use tracing::{debug, info, warn};

/// Accepts one opaque text payload.
#[async_trait::async_trait]
pub trait NotifySink: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

/// Incoming-webhook sink: `POST {url}?payload={"text": …}`.
#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // webhook URLs carry their auth in the path
        f.debug_struct("WebhookNotifier")
            .field("url", &"<REDACTED>")
            .finish()
    }
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build webhook http client")?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl NotifySink for WebhookNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let payload = serde_json::json!({ "text": text }).to_string();
        self.client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json; charset=UTF-8")
            .query(&[("payload", payload.as_str())])
            .send()
            .await
            .context("webhook request failed")?
            .error_for_status()
            .context("webhook rejected the message")?;
        Ok(())
    }
}

/// `-- **{mirror}** --` then one `{project}: {problem}` line per project,
/// for every mirror that has problems. Empty when all mirrors are clean.
pub fn summarize(reports: &[ReconcileReport]) -> String {
    let mut out = String::new();
    for report in reports.iter().filter(|r| !r.is_clean()) {
        out.push_str(&format!("-- **{}** --\n", report.mirror));
        for (project, problem) in report.problems.iter() {
            out.push_str(&format!("{}: {}\n", project, problem.trim_end()));
        }
    }
    out
}

/// Send the summary if there is one. Delivery failure is logged, never returned.
/// Returns whether a message was delivered.
pub async fn notify(sink: &dyn NotifySink, reports: &[ReconcileReport]) -> bool {
    let summary = summarize(reports);
    if summary.is_empty() {
        debug!("no problems to notify");
        return false;
    }
    match sink.send(&summary).await {
        Ok(()) => {
            info!(bytes = summary.len(), "problem summary sent");
            true
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "problem summary notification failed");
            false
        }
    }
}
