//
//  bitbucket-client
//  config/file.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Configuration File I/O Module
//!
//! Low-level file operations behind [`Config::load_from`](super::Config::load_from)
//! and [`Config::save_to`](super::Config::save_to).
//!
//! ## Notes
//!
//! - A missing file is not an error: [`read_config_file`] returns `None`
//! - Writes create parent directories and replace the file through a sibling
//!   temporary file, so an interrupted save never leaves a truncated config

use std::path::Path;

use anyhow::{Context, Result};

/// Reads the configuration file, returning `None` when it does not exist.
pub fn read_config_file(path: &Path) -> Result<Option<String>> {
    if !config_exists(path) {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    Ok(Some(content))
}

/// Writes `content` to `path`, creating parent directories as needed.
pub fn write_config_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }

    let staging = path.with_extension("toml.tmp");
    std::fs::write(&staging, content)
        .with_context(|| format!("Failed to write {}", staging.display()))?;
    std::fs::rename(&staging, path)
        .with_context(|| format!("Failed to replace config file {}", path.display()))?;
    Ok(())
}

pub fn config_exists(path: &Path) -> bool {
    path.is_file()
}
