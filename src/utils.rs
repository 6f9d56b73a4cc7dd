//! Small path helpers shared by discovery and reporting

use std::path::Path;

/// Check that a file has the wanted extension, ignoring case and a leading dot
pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    let wanted = extension.trim_start_matches('.');
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

/// Name of the directory directly containing `path`
pub(crate) fn parent_dir_name(path: &Path) -> Option<String> {
    path.parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(String::from)
}
