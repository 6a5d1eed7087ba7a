//! Path utilities for locating test assets.
//!
//! This module provides functions to find fonts and other files across
//! multiple potential locations, supporting both local development and CI
//! environments.

use std::path::PathBuf;

/// Font locations checked after `DASHBOARD_FONT`, in order.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/local/share/fonts/DejaVuSans.ttf",
    "/Library/Fonts/DejaVuSans.ttf",
];

/// Returns the workspace root directory.
///
/// This is determined by walking up from the current crate's manifest directory
/// until we find the workspace Cargo.toml.
pub fn workspace_root() -> PathBuf {
    // Start from the test-utils crate manifest dir
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Searches for a TrueType font usable by the dashboard renderer.
///
/// This function checks the following locations in order:
/// 1. Environment variable `DASHBOARD_FONT` (if set)
/// 2. `testdata/DejaVuSans.ttf` under the workspace root
/// 3. Common system DejaVu install locations
///
/// # Returns
///
/// `Some(PathBuf)` if a font is found, `None` otherwise.
pub fn find_font() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    // Check environment variable first
    if let Ok(font) = std::env::var("DASHBOARD_FONT") {
        candidates.push(PathBuf::from(font));
    }

    candidates.push(workspace_root().join("testdata").join("DejaVuSans.ttf"));
    candidates.extend(FONT_CANDIDATES.iter().map(PathBuf::from));

    candidates.into_iter().find(|path| path.exists())
}

/// Creates a temporary directory for test output.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary test directory")
}
