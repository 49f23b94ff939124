use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "tones";
const STORAGE_FILE: &str = "storage.json";
const CATALOG_FILE: &str = "catalog.json";

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("TONES_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn storage_path_in(root: &Path) -> PathBuf {
    root.join(STORAGE_FILE)
}

pub fn catalog_path_in(root: &Path) -> PathBuf {
    root.join(CATALOG_FILE)
}

/// Resolves the config root, preferring an explicit override, and creates it.
pub fn ensure_config_dir(override_dir: Option<&Path>) -> Result<PathBuf> {
    let root = match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => config_root()?,
    };
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}
