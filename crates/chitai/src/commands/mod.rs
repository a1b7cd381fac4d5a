//! CLI command implementations.

use std::path::{Path, PathBuf};

use chitai::config::{self, Config};

pub mod link;
pub mod serve;

/// Journal directory: CLI override first, then the config file, resolved
/// relative to the config file.
pub fn data_dir(
    config_path: &str,
    config: &Config,
    data_dir_override: Option<&Path>,
) -> Option<PathBuf> {
    data_dir_override
        .map(Path::to_path_buf)
        .or_else(|| {
            config
                .storage
                .path
                .as_deref()
                .map(|p| config::resolve_path(Path::new(config_path), p))
        })
}
