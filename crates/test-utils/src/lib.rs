//! Shared test utilities for the hub dashboard workspace.
//!
//! This crate provides common testing infrastructure including:
//! - An in-process mock hub (REST + WebSocket)
//! - Font lookup and a skip macro for font-dependent tests
//! - Hub payload fixtures
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{require_font, MockHub};
//! ```

pub mod fixtures;
pub mod mock_hub;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use mock_hub::{MockHub, MockHubHandle, RecordedRequest, WsBehavior};
pub use paths::*;

/// Macro to skip a test if no TrueType font is available.
///
/// Text measurement depends on real glyph metrics, so tests that draw text
/// with the production face need a font file on disk.
///
/// # Usage
///
/// ```ignore
/// use test_utils::require_font;
///
/// #[test]
/// fn test_render_with_font() {
///     let path = require_font!();
///     // Test code using path...
/// }
/// ```
///
/// If no font is found, the test will print a skip message and return early.
#[macro_export]
macro_rules! require_font {
    () => {{
        match $crate::find_font() {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: No TrueType font found. Install DejaVu fonts or set DASHBOARD_FONT."
                );
                return;
            }
        }
    }};
}

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
