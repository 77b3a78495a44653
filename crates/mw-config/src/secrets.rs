//! Credential resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"MW_GITHUB_TOKEN"`).
//! - At startup the binary calls [`resolve_credentials`] once and passes the
//!   result into adapter constructors. Nothing else reads the environment.
//! - Lookup order per credential: the named env var, then the optional
//!   credentials file entry keyed by source name.
//! - When `required` is set (live runs) a missing source credential is fatal and
//!   the error names the env var, never a value. Replay runs resolve whatever
//!   is available and require nothing.
//! - The notification webhook is always optional.
//! - `Debug` output of every secret-holding type is redacted.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::settings::MirrorwatchConfig;

/// Credentials file entry key for the notification webhook.
pub const NOTIFY_ENTRY: &str = "notify";

// ---------------------------------------------------------------------------
// Credentials file
// ---------------------------------------------------------------------------

/// One entry of the credentials file. Which fields matter depends on the source.
#[derive(Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialEntry {
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub webhook: Option<String>,
}

impl fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("token", &redact(&self.token))
            .field("webhook", &redact(&self.webhook))
            .finish()
    }
}

/// Fallback credentials keyed by source name:
///
/// ```yaml
/// Gerrit: { username: ci, password: "..." }
/// Github: { token: "..." }
/// notify: { webhook: "https://..." }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct CredentialsFile {
    entries: BTreeMap<String, CredentialEntry>,
}

impl CredentialsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read credentials file: {}", path.display()))?;
        Self::from_yaml(&raw)
            .with_context(|| format!("invalid credentials file: {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).context("invalid credentials yaml")
    }

    pub fn entry(&self, source: &str) -> Option<&CredentialEntry> {
        self.entries.get(source)
    }
}

// ---------------------------------------------------------------------------
// Resolved credentials
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// Every credential one run needs, resolved once.
#[derive(Clone, Default)]
pub struct ResolvedCredentials {
    pub authoritative: Option<BasicCredentials>,
    /// Mirror name -> API token.
    pub mirror_tokens: BTreeMap<String, String>,
    pub webhook: Option<String>,
}

impl ResolvedCredentials {
    pub fn mirror_token(&self, mirror: &str) -> Option<&str> {
        self.mirror_tokens.get(mirror).map(String::as_str)
    }
}

impl fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mirrors: Vec<&str> = self.mirror_tokens.keys().map(String::as_str).collect();
        f.debug_struct("ResolvedCredentials")
            .field("authoritative", &self.authoritative)
            .field("mirror_tokens", &mirrors)
            .field("webhook", &redact(&self.webhook))
            .finish()
    }
}

fn redact(v: &Option<String>) -> Option<&'static str> {
    v.as_ref().map(|_| "<REDACTED>")
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve from the process environment.
pub fn resolve_credentials(
    cfg: &MirrorwatchConfig,
    file: Option<&CredentialsFile>,
    required: bool,
) -> Result<ResolvedCredentials> {
    resolve_credentials_with(cfg, file, required, |name| std::env::var(name).ok())
}

/// Resolve with an injectable env lookup.
pub fn resolve_credentials_with<F>(
    cfg: &MirrorwatchConfig,
    file: Option<&CredentialsFile>,
    required: bool,
    env: F,
) -> Result<ResolvedCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    let auth = &cfg.authoritative;
    let username = pick(env(&auth.credentials_env.username), file, &auth.name, |e| {
        e.username.as_ref()
    });
    let password = pick(env(&auth.credentials_env.password), file, &auth.name, |e| {
        e.password.as_ref()
    });
    let authoritative = match (username, password) {
        (Some(username), Some(password)) => Some(BasicCredentials { username, password }),
        (None, _) if required => bail!(
            "SECRETS_MISSING source={}: required env var '{}' (username) is not set or empty",
            auth.name,
            auth.credentials_env.username,
        ),
        (_, None) if required => bail!(
            "SECRETS_MISSING source={}: required env var '{}' (password) is not set or empty",
            auth.name,
            auth.credentials_env.password,
        ),
        _ => None,
    };

    let mut mirror_tokens = BTreeMap::new();
    for m in &cfg.mirrors {
        match pick(env(&m.token_env), file, &m.name, |e| e.token.as_ref()) {
            Some(token) => {
                mirror_tokens.insert(m.name.clone(), token);
            }
            None if required => bail!(
                "SECRETS_MISSING source={}: required env var '{}' (token) is not set or empty",
                m.name,
                m.token_env,
            ),
            None => {}
        }
    }

    let webhook = cfg
        .notify
        .webhook_env
        .as_deref()
        .and_then(|var| pick(env(var), file, NOTIFY_ENTRY, |e| e.webhook.as_ref()));

    Ok(ResolvedCredentials {
        authoritative,
        mirror_tokens,
        webhook,
    })
}

type EntryField = fn(&CredentialEntry) -> Option<&String>;

/// Env value first, then the credentials file entry for `source`.
fn pick(
    env_value: Option<String>,
    file: Option<&CredentialsFile>,
    source: &str,
    field: EntryField,
) -> Option<String> {
    non_blank(env_value).or_else(|| {
        file.and_then(|f| f.entry(source))
            .and_then(|e| non_blank(field(e).cloned()))
    })
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
