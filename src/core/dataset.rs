use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MatchError, Result};
use crate::utils::{has_extension, parent_dir_name};

/// Collect `<root>/<category>/<name>.<extension>`, sorted by path
///
/// Only files exactly one directory below `root` are considered. Loose files
/// in `root` and deeper subdirectories are ignored.
pub fn discover<P: AsRef<Path>>(root: P, extension: &str) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(MatchError::NotFound(format!(
            "dataset directory {}",
            root.display()
        )));
    }

    let mut files = Vec::new();
    for category in fs::read_dir(root)? {
        let category = category?.path();
        if !category.is_dir() {
            continue;
        }
        for entry in fs::read_dir(&category)? {
            let path = entry?.path();
            if path.is_file() && has_extension(&path, extension) {
                files.push(path);
            }
        }
    }

    files.sort();
    log::debug!("Found {} images under {}", files.len(), root.display());
    Ok(files)
}

/// Category label of a dataset image: the name of its directory
pub fn category_of(path: &Path) -> Option<String> {
    parent_dir_name(path)
}
