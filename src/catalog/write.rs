// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::CatalogError;

use super::model::CatalogItem;

/// Write a full catalog snapshot to `path`, replacing whatever was there
///
/// The JSON is two-space indented with non-ASCII text kept as is. It is written
/// to a temporary sibling first and renamed into place.
pub fn write_catalog(items: &[CatalogItem], path: &Path) -> Result<(), CatalogError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CatalogError::CreateDirectoryFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let mut json = serde_json::to_string_pretty(items)?;
    json.push('\n');

    let temp_path = temp_sibling(path);
    std::fs::write(&temp_path, json).map_err(|e| CatalogError::WriteFailed {
        path: temp_path.clone(),
        source: e,
    })?;

    std::fs::rename(&temp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        CatalogError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

/// Read a catalog document back
pub fn read_catalog(path: &Path) -> Result<Vec<CatalogItem>, CatalogError> {
    let content = std::fs::read_to_string(path).map_err(|e| CatalogError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(serde_json::from_str(&content)?)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("catalog"));
    name.push(".tmp");
    path.with_file_name(name)
}
