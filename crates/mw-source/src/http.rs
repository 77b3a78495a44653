//! Thin JSON-over-HTTP GET client used by every adapter.
//!
//! Responsibilities:
//! - attach the adapter's credentials (header token or basic auth);
//! - bound each request with a timeout;
//! - retry idempotent GETs on transport / 5xx / 429 with exponential backoff,
//!   never past the run deadline;
//! - strip the non-JSON guard line some servers prepend (`)]}'`);
//! - surface the `Link: rel="next"` continuation for [`collect_pages`].

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::pagination::{collect_pages, parse_next_link, Page};

/// Guard prefix Gerrit puts in front of every JSON body.
const JSON_GUARD_PREFIX: &str = ")]}'";

const USER_AGENT: &str = concat!("mirrorwatch/", env!("CARGO_PKG_VERSION"));

/// How a request authenticates. Values are redacted in `Debug` output.
#[derive(Clone, Default)]
pub enum Auth {
    #[default]
    Anonymous,
    /// Static header, e.g. `Authorization: token …` or `PRIVATE-TOKEN: …`.
    Header { name: String, value: String },
    /// HTTP basic auth.
    Basic { username: String, password: String },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Anonymous => write!(f, "Anonymous"),
            Auth::Header { name, .. } => f
                .debug_struct("Header")
                .field("name", name)
                .field("value", &"<REDACTED>")
                .finish(),
            Auth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<REDACTED>")
                .finish(),
        }
    }
}

/// Retry and timeout policy for GET requests.
#[derive(Debug, Clone)]
pub struct RequestPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// No retry is scheduled if its backoff would end after this instant.
    pub deadline: Option<Instant>,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            deadline: None,
        }
    }
}

impl RequestPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Decoded body plus continuation reference.
#[derive(Debug)]
pub struct JsonResponse<T> {
    pub body: T,
    pub next_link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    auth: Auth,
    policy: RequestPolicy,
}

impl HttpClient {
    pub fn new(auth: Auth, policy: RequestPolicy) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(policy.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SourceError::Config(format!("http client init failed: {e}")))?;
        Ok(Self { http, auth, policy })
    }

    /// Same connection pool and policy, no credentials.
    pub fn anonymous(&self) -> Self {
        Self {
            http: self.http.clone(),
            auth: Auth::Anonymous,
            policy: self.policy.clone(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self.auth, Auth::Anonymous)
    }

    /// GET `url` and decode its JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        context: &str,
    ) -> Result<JsonResponse<T>, SourceError> {
        let (text, next_link) = self.get_text(url).await?;
        let body = serde_json::from_str(strip_json_guard(&text))
            .map_err(|e| SourceError::parse(context, format!("{url}: {e}")))?;
        Ok(JsonResponse { body, next_link })
    }

    /// GET a JSON array and every `Link: rel="next"` page after it.
    pub async fn get_all_pages<T: DeserializeOwned>(
        &self,
        first_url: &str,
        context: &str,
    ) -> Result<Vec<T>, SourceError> {
        collect_pages(first_url.to_string(), |url| async move {
            let resp: JsonResponse<Vec<T>> = self.get_json(&url, context).await?;
            Ok(Page {
                items: resp.body,
                next: resp.next_link,
            })
        })
        .await
    }

    async fn get_text(&self, url: &str) -> Result<(String, Option<String>), SourceError> {
        let mut attempt: u32 = 0;
        loop {
            match self.get_once(url).await {
                Ok(ok) => return Ok(ok),
                Err(err) if err.is_retryable() && attempt < self.policy.max_retries => {
                    let delay = self.policy.backoff(attempt);
                    if let Some(deadline) = self.policy.deadline {
                        if Instant::now() + delay >= deadline {
                            return Err(err);
                        }
                    }
                    attempt += 1;
                    warn!(%url, attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying GET");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn get_once(&self, url: &str) -> Result<(String, Option<String>), SourceError> {
        debug!(%url, "GET");
        let req = self.http.get(url);
        let req = match &self.auth {
            Auth::Anonymous => req,
            Auth::Header { name, value } => req.header(name.as_str(), value.as_str()),
            Auth::Basic { username, password } => req.basic_auth(username, Some(password)),
        };

        let transport = |e: reqwest::Error| SourceError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let resp = req.send().await.map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let next_link = resp
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link);
        let text = resp.text().await.map_err(transport)?;
        Ok((text, next_link))
    }
}

/// Drop the `)]}'` guard line if present; other bodies pass through untouched.
pub fn strip_json_guard(body: &str) -> &str {
    let trimmed = body.trim_start();
    if trimmed.starts_with(JSON_GUARD_PREFIX) {
        match trimmed.split_once('\n') {
            Some((_, rest)) => rest,
            None => "",
        }
    } else {
        body
    }
}
