// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Supported image formats and directory scanning

use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::{RelabelError, Result};

/// Image extensions recognized by every component that validates file type
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "jp2"];

/// Sorted list of supported extensions for display in error messages
pub fn supported_extensions() -> Vec<&'static str> {
    let mut exts = SUPPORTED_EXTENSIONS.to_vec();
    exts.sort_unstable();
    exts
}

/// Check if a file has a supported image extension
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => SUPPORTED_EXTENSIONS
            .iter()
            .any(|s| s.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Scan a directory for supported image files (non-recursive).
///
/// Returns a sorted list for stable ordering across calls.
pub fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let dir = std::fs::canonicalize(dir)
        .map_err(|_| RelabelError::Config(format!("Directory does not exist: {:?}", dir)))?;

    if !dir.is_dir() {
        return Err(RelabelError::NotADirectory(dir));
    }

    let mut images = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.is_file() && is_supported_image(&path) {
            images.push(path);
        }
    }
    images.sort();

    info!("Found {} images in {:?}", images.len(), dir);
    Ok(images)
}

/// Count supported images in a directory without materializing errors
pub fn image_count(dir: &Path) -> usize {
    match scan_directory(dir) {
        Ok(images) => images.len(),
        Err(e) => {
            error!("Error counting images in {:?}: {}", dir, e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions_case_insensitive() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPG")));
        assert!(is_supported_image(Path::new("photo.Jpeg")));
        assert!(is_supported_image(Path::new("scan.jp2")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("no_extension")));
    }

    #[test]
    fn test_scan_directory_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.jpg", "a.png", "c.txt", "d.jpeg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.jpg")).unwrap();

        let images = scan_directory(dir.path()).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.jpg", "d.jpeg"]);
    }

    #[test]
    fn test_scan_missing_directory_fails() {
        assert!(scan_directory(Path::new("/nonexistent/relabel-test")).is_err());
    }

    #[test]
    fn test_image_count_absorbs_errors() {
        assert_eq!(image_count(Path::new("/nonexistent/relabel-test")), 0);
    }
}
