//! Emulator binary resolution: an explicit configured path, or a PATH search.

use std::path::{Path, PathBuf};

use civ_constants::coproc::DEFAULT_EMULATOR_BIN;

fn search_path_for(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Resolve the emulator binary: an existing `configured_path` wins outright;
/// otherwise search `PATH` for `configured_path`'s basename (if non-empty)
/// and fall back to the default emulator name.
pub fn resolve_emulator_path(configured_path: &str) -> Option<String> {
    if !configured_path.is_empty() {
        let p = Path::new(configured_path);
        if p.is_file() {
            return std::fs::canonicalize(p)
                .ok()
                .map(|p| p.display().to_string())
                .or_else(|| Some(configured_path.to_string()));
        }
        if let Some(found) = search_path_for(configured_path) {
            return Some(found.display().to_string());
        }
    }
    search_path_for(DEFAULT_EMULATOR_BIN).map(|p| p.display().to_string())
}
