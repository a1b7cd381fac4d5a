//! `link-illustration` command implementation.

use std::path::Path;

use anyhow::{Context, Result, bail};

use chitai::config::Config;
use chitai::store::RecordStore;

pub async fn run(
    config_path: &str,
    data_dir_override: Option<&Path>,
    item_id: &str,
    illustration_id: &str,
) -> Result<()> {
    let config = Config::load(config_path).await?;
    let Some(data_dir) = super::data_dir(config_path, &config, data_dir_override) else {
        bail!("No record journal configured (set storage.path or pass --data-dir)");
    };

    let store = RecordStore::open(&data_dir)
        .await
        .with_context(|| format!("Failed to open records in {}", data_dir.display()))?;
    store.link_illustration(item_id, illustration_id).await?;

    println!("Linked illustration {illustration_id} to item {item_id}");
    Ok(())
}
