//! On-disk fund state.
//!
//! The whole state is rewritten on every save: serialized to a sibling temp
//! file, then renamed over the target.

use chrono::Utc;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::FundError;
use crate::types::FundState;

/// Load the state file. A missing file is not an error.
pub fn load(path: &Path) -> Result<Option<FundState>, FundError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No fund state at {}", path.display());
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let state: FundState = serde_json::from_str(&content)?;
    Ok(Some(state))
}

/// Refresh `updated_at` and write the state in full.
pub fn save(path: &Path, state: &mut FundState) -> Result<(), FundError> {
    state.updated_at = Utc::now();

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let content = serde_json::to_string_pretty(state)?;
    let tmp = temp_path(path);
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;

    debug!("Saved fund state to {}", path.display());
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "fund_state.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
