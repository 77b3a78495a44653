//! Typed settings decoded from the merged configuration document.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use mw_cache::SnapshotCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unknown top-level sections are tolerated here and surfaced by
/// [`crate::report_unused_keys`]; unknown keys inside a section are errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorwatchConfig {
    #[serde(default)]
    pub run: RunSettings,
    pub authoritative: AuthoritativeSettings,
    #[serde(default)]
    pub mirrors: Vec<MirrorSettings>,
    #[serde(default)]
    pub notify: NotifySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    pub grace_minutes: u64,
    pub request_timeout_secs: u64,
    /// Upper bound for building one source's catalog.
    pub deadline_secs: u64,
    /// Projects fetched at once per source.
    pub concurrency: usize,
    pub max_retries: u32,
    pub cache_dir: PathBuf,
    pub report_dir: PathBuf,
    /// `{job}` and `{build}` are substituted from JOB_NAME / BUILD_NUMBER.
    pub report_url_template: Option<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            grace_minutes: 10,
            request_timeout_secs: 30,
            deadline_secs: 30 * 60,
            concurrency: 8,
            max_retries: 2,
            cache_dir: PathBuf::from("cache"),
            report_dir: PathBuf::from("reports"),
            report_url_template: None,
        }
    }
}

impl RunSettings {
    pub fn report_url(&self, job: &str, build: &str) -> Option<String> {
        self.report_url_template
            .as_ref()
            .map(|t| t.replace("{job}", job).replace("{build}", build))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthoritativeSettings {
    #[serde(default = "default_authoritative_name")]
    pub name: String,
    pub base_url: String,
    /// Projects whose name starts with any of these are never fetched.
    #[serde(default)]
    pub exclude_prefixes: Vec<String>,
    #[serde(default)]
    pub credentials_env: BasicCredentialEnv,
}

fn default_authoritative_name() -> String {
    "Gerrit".to_string()
}

/// Env var NAMES holding the authoritative host's basic-auth pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BasicCredentialEnv {
    pub username: String,
    pub password: String,
}

impl Default for BasicCredentialEnv {
    fn default() -> Self {
        Self {
            username: "MW_GERRIT_USERNAME".to_string(),
            password: "MW_GERRIT_PASSWORD".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorKind {
    Github,
    Gitlab,
}

/// Which projects a mirror is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorVisibility {
    Private,
    Public,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorSettings {
    pub name: String,
    pub kind: MirrorKind,
    pub base_url: String,
    /// Account whose repositories are listed (GitHub only).
    #[serde(default)]
    pub owner: Option<String>,
    pub visibility: MirrorVisibility,
    /// Env var NAME holding the API token.
    pub token_env: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifySettings {
    /// Env var NAME holding the chat webhook URL. No notification when unset.
    pub webhook_env: Option<String>,
}

impl MirrorwatchConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: MirrorwatchConfig = serde_json::from_value(config_json.clone())
            .context("CONFIG_INVALID: settings do not match the expected shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.authoritative.name.trim().is_empty() {
            bail!("CONFIG_INVALID: authoritative.name must not be empty");
        }
        if self.authoritative.base_url.trim().is_empty() {
            bail!("CONFIG_INVALID: authoritative.base_url must not be empty");
        }
        if self.run.concurrency == 0 {
            bail!("CONFIG_INVALID: run.concurrency must be at least 1");
        }
        if self.run.deadline_secs == 0 {
            bail!("CONFIG_INVALID: run.deadline_secs must be at least 1");
        }

        let mut names = BTreeSet::new();
        names.insert(self.authoritative.name.as_str());
        for (i, m) in self.mirrors.iter().enumerate() {
            if m.name.trim().is_empty() {
                bail!("CONFIG_INVALID: mirrors[{i}].name must not be empty");
            }
            if !names.insert(m.name.as_str()) {
                bail!("CONFIG_INVALID: source name '{}' is used twice", m.name);
            }
            if m.base_url.trim().is_empty() {
                bail!("CONFIG_INVALID: mirrors[{i}].base_url must not be empty");
            }
            if m.token_env.trim().is_empty() {
                bail!("CONFIG_INVALID: mirrors[{i}].token_env must not be empty");
            }
            if m.kind == MirrorKind::Github
                && m.owner.as_deref().map(str::trim).unwrap_or("").is_empty()
            {
                bail!("CONFIG_INVALID: mirrors[{i}] ({}) is github and needs an owner", m.name);
            }
        }
        self.validate_cache_names()
    }

    /// Source names map onto cache file names case-insensitively; no two
    /// sources may share a document.
    fn validate_cache_names(&self) -> Result<()> {
        let sources = std::iter::once(self.authoritative.name.as_str())
            .chain(self.mirrors.iter().map(|m| m.name.as_str()));
        let mut owners: BTreeMap<String, &str> = BTreeMap::new();
        for source in sources {
            for doc in SnapshotCache::document_names(source) {
                if let Some(other) = owners.insert(doc.clone(), source) {
                    bail!(
                        "CONFIG_INVALID: sources '{other}' and '{source}' share cache file {doc}"
                    );
                }
            }
        }
        Ok(())
    }

    pub fn mirror(&self, name: &str) -> Option<&MirrorSettings> {
        self.mirrors.iter().find(|m| m.name == name)
    }
}
