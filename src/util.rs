use anyhow::{anyhow, Result};
use std::fs::File;
use std::path::Path;

pub fn open(path: &Path, kind: &str) -> Result<File> {
    match File::open(path) {
        Err(e) => Err(anyhow!("Opening {} file `{}`: {}", kind, path.display(), e)),
        Ok(file) => Ok(file),
    }
}

/// Returns true for dotfiles and editor artefacts (`foo~`, `.swp`, `.tmp`)
/// which should never be treated as site sources.
pub fn is_ignored(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    name.starts_with('.')
        || name.ends_with('~')
        || matches!(ext, "swp" | "swo" | "tmp" | "bak")
}
