//! Recursive discovery of JSON input files.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{EtlError, Result};

pub const INPUT_EXTENSION: &str = "json";

/// All `*.json` files under `root`, sorted by path so runs are repeatable.
pub fn find_json_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|source| EtlError::Discover {
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let ext_ok = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(INPUT_EXTENSION))
            .unwrap_or(false);
        if ext_ok {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_finds_nested_json_only() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("A").join("B");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("TRAAA.json"), "{}").unwrap();
        fs::write(dir.path().join("top.JSON"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir_all(dir.path().join("dir.json")).unwrap();

        let files = find_json_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["TRAAA.json", "top.JSON"]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            find_json_files(&missing),
            Err(EtlError::Discover { .. })
        ));
    }
}
