//! Command handler modules for the mirrorwatch binary.
//!
//! Shared wiring (config loading, credential resolution, adapter and registry
//! construction) lives here. Command-specific logic lives in the submodules.

pub mod check;
pub mod snapshot;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use mw_cache::SnapshotCache;
use mw_config::{
    CredentialsFile, LoadedConfig, MirrorKind, MirrorSettings, MirrorwatchConfig,
    ResolvedCredentials, UnusedKeyPolicy,
};
use mw_source::{
    BuildOptions, CatalogMode, CatalogRegistry, GerritAdapter, GithubAdapter, GitlabAdapter,
    RequestPolicy, SourceAdapter,
};
use tracing::{info, warn};

/// Env var that switches every source to cache replay when set to a non-empty value.
pub const ENV_CACHE_MODE: &str = "MW_CACHE_MODE";

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Layered config paths in merge order
    #[arg(long = "config", required = true)]
    pub config_paths: Vec<String>,

    /// Fallback credentials YAML keyed by source name (env vars take precedence)
    #[arg(long)]
    pub credentials: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Read every catalog from the snapshot cache instead of the network
    #[arg(long, default_value_t = false)]
    pub replay: bool,

    /// Skip the chat notification
    #[arg(long = "no-notify", default_value_t = false)]
    pub no_notify: bool,

    /// Exit non-zero when any mirror has problems
    #[arg(long = "fail-on-problems", default_value_t = false)]
    pub fail_on_problems: bool,
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load, hash, lint and decode the layered configuration.
pub fn load_settings(paths: &[String]) -> Result<(LoadedConfig, MirrorwatchConfig)> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = mw_config::load_layered_yaml(&path_refs)?;

    let unused = mw_config::report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for leaf in &unused.unused_leaf_pointers {
        warn!(key = %leaf, "unused config key");
    }

    let settings = loaded.settings()?;
    info!(config_hash = %loaded.config_hash, mirrors = settings.mirrors.len(), "config loaded");
    Ok((loaded, settings))
}

pub fn load_credentials_file(path: Option<&PathBuf>) -> Result<Option<CredentialsFile>> {
    path.map(|p| CredentialsFile::load(p)).transpose()
}

pub fn catalog_mode(replay_flag: bool) -> CatalogMode {
    let env_replay = std::env::var(ENV_CACHE_MODE)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    if replay_flag || env_replay {
        CatalogMode::Replay
    } else {
        CatalogMode::Live
    }
}

pub fn request_policy(cfg: &MirrorwatchConfig) -> RequestPolicy {
    RequestPolicy {
        timeout: Duration::from_secs(cfg.run.request_timeout_secs),
        max_retries: cfg.run.max_retries,
        deadline: Some(tokio::time::Instant::now() + Duration::from_secs(cfg.run.deadline_secs)),
        ..RequestPolicy::default()
    }
}

/// Registry-wide options. Name exclusions are per source, see [`build_registry`].
pub fn build_options(cfg: &MirrorwatchConfig) -> BuildOptions {
    BuildOptions {
        concurrency: cfg.run.concurrency,
        exclude_prefixes: Vec::new(),
        deadline: Duration::from_secs(cfg.run.deadline_secs),
    }
}

/// Registry with the authoritative source and every mirror registered.
///
/// `authoritative.exclude_prefixes` filters the authoritative source only;
/// mirror names carry no namespace to match against.
pub fn build_registry(
    cfg: &MirrorwatchConfig,
    creds: &ResolvedCredentials,
    mode: CatalogMode,
) -> Result<CatalogRegistry> {
    let cache = SnapshotCache::new(&cfg.run.cache_dir);
    let mut registry = CatalogRegistry::new(mode, build_options(cfg), Some(cache))?;

    match mode {
        CatalogMode::Replay => {
            registry.register_replay(cfg.authoritative.name.clone())?;
            for m in &cfg.mirrors {
                registry.register_replay(m.name.clone())?;
            }
        }
        CatalogMode::Live => {
            let policy = request_policy(cfg);
            registry.register_live_excluding(
                authoritative_adapter(cfg, creds, &policy)?,
                cfg.authoritative.exclude_prefixes.clone(),
            )?;
            for m in &cfg.mirrors {
                registry.register_live(mirror_adapter(m, creds, &policy)?)?;
            }
        }
    }
    info!(mode = mode.as_str(), sources = registry.sources().count(), "catalog registry ready");
    Ok(registry)
}

fn authoritative_adapter(
    cfg: &MirrorwatchConfig,
    creds: &ResolvedCredentials,
    policy: &RequestPolicy,
) -> Result<Arc<dyn SourceAdapter>> {
    let basic = creds
        .authoritative
        .as_ref()
        .with_context(|| format!("no credentials resolved for {}", cfg.authoritative.name))?;
    let adapter = GerritAdapter::new(
        cfg.authoritative.name.clone(),
        &cfg.authoritative.base_url,
        &basic.username,
        &basic.password,
        policy.clone(),
    )?;
    Ok(Arc::new(adapter))
}

fn mirror_adapter(
    m: &MirrorSettings,
    creds: &ResolvedCredentials,
    policy: &RequestPolicy,
) -> Result<Arc<dyn SourceAdapter>> {
    let token = creds
        .mirror_token(&m.name)
        .with_context(|| format!("no token resolved for {}", m.name))?;
    let adapter: Arc<dyn SourceAdapter> = match m.kind {
        MirrorKind::Github => Arc::new(GithubAdapter::new(
            m.name.clone(),
            &m.base_url,
            m.owner.as_deref().unwrap_or_default(),
            token,
            policy.clone(),
        )?),
        MirrorKind::Gitlab => Arc::new(GitlabAdapter::new(
            m.name.clone(),
            &m.base_url,
            token,
            policy.clone(),
        )?),
    };
    Ok(adapter)
}
