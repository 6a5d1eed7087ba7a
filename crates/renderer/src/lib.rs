//! Monochrome dashboard rendering.
//!
//! - Icon catalog with condition-token resolution and SVG rasterization
//! - Text faces (rusttype) behind a measuring trait
//! - Deterministic layout of a [`dashboard_common::Snapshot`]
//! - 1-bit frames with rotation, packing and PNG encoding

pub mod dashboard;
pub mod frame;
pub mod icons;
pub mod png;
pub mod text;

pub use dashboard::{Renderer, PANEL_HEIGHT, PANEL_WIDTH};
pub use frame::{Frame, Rotation};
pub use icons::{IconCatalog, IconMeta};
pub use text::{RustTypeFace, TextFace, DEFAULT_FONT_SIZE};
