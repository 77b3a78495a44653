//! `mirrorwatch snapshot`: build every catalog live and refresh the cache.

use anyhow::{bail, Result};
use futures_util::future::join_all;
use mw_source::CatalogMode;
use tracing::error;

use super::{build_registry, load_credentials_file, load_settings, SourceArgs};

pub async fn run(args: SourceArgs) -> Result<()> {
    let (_loaded, cfg) = load_settings(&args.config_paths)?;
    let file = load_credentials_file(args.credentials.as_ref())?;
    let creds = mw_config::resolve_credentials(&cfg, file.as_ref(), true)?;
    let registry = build_registry(&cfg, &creds, CatalogMode::Live)?;

    let names: Vec<&str> = registry.sources().collect();
    let results = join_all(names.iter().map(|n| registry.catalog(n))).await;

    let mut failed = Vec::new();
    for (name, result) in names.iter().zip(results) {
        match result {
            Ok(c) => match &c.public {
                Some(public) => println!(
                    "{name}: {} projects ({} public), {} branches",
                    c.all.len(),
                    public.len(),
                    c.all.branch_count()
                ),
                None => println!(
                    "{name}: {} projects, {} branches",
                    c.all.len(),
                    c.all.branch_count()
                ),
            },
            Err(e) => {
                error!(source = %name, error = %e, "catalog build failed");
                failed.push(*name);
            }
        }
    }

    if !failed.is_empty() {
        bail!("snapshot failed for: {}", failed.join(", "));
    }
    Ok(())
}
