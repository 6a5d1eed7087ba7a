//! Weather and status icons backed by SVG assets.
//!
//! Icon artwork follows the Material Design Icons naming: the metadata table
//! lists each icon's `name` and its `aliases`, and every name has a matching
//! `<name>.svg`. A built-in set is embedded in the binary; a full icon
//! directory can be loaded instead with [`IconCatalog::from_dir`].

use std::fs;
use std::path::{Path, PathBuf};

use dashboard_common::{DashError, DashResult};
use image::{GrayImage, Luma};
use serde::Deserialize;
use tracing::debug;

/// Embedded metadata table for the built-in icons
const BUILTIN_META: &str = include_str!("../assets/icons-meta.json");

/// Embedded SVG assets, keyed by icon name
const BUILTIN_SVGS: &[(&str, &str)] = &[
    ("home-lightning-bolt", include_str!("../assets/icons/home-lightning-bolt.svg")),
    ("lightning-bolt", include_str!("../assets/icons/lightning-bolt.svg")),
    ("thermometer-chevron-down", include_str!("../assets/icons/thermometer-chevron-down.svg")),
    ("thermometer-chevron-up", include_str!("../assets/icons/thermometer-chevron-up.svg")),
    ("weather-cloudy", include_str!("../assets/icons/weather-cloudy.svg")),
    ("weather-fog", include_str!("../assets/icons/weather-fog.svg")),
    ("weather-hail", include_str!("../assets/icons/weather-hail.svg")),
    ("weather-lightning", include_str!("../assets/icons/weather-lightning.svg")),
    ("weather-lightning-rainy", include_str!("../assets/icons/weather-lightning-rainy.svg")),
    ("weather-night", include_str!("../assets/icons/weather-night.svg")),
    ("weather-night-partly-cloudy", include_str!("../assets/icons/weather-night-partly-cloudy.svg")),
    ("weather-partly-cloudy", include_str!("../assets/icons/weather-partly-cloudy.svg")),
    ("weather-pouring", include_str!("../assets/icons/weather-pouring.svg")),
    ("weather-rainy", include_str!("../assets/icons/weather-rainy.svg")),
    ("weather-snowy", include_str!("../assets/icons/weather-snowy.svg")),
    ("weather-snowy-rainy", include_str!("../assets/icons/weather-snowy-rainy.svg")),
    ("weather-sunny", include_str!("../assets/icons/weather-sunny.svg")),
    ("weather-windy", include_str!("../assets/icons/weather-windy.svg")),
];

/// Name of the metadata file inside an icon directory
pub const META_FILE: &str = "icons-meta.json";

/// Prefix tried when a condition token does not match an icon name directly
const CONDITION_PREFIX: &str = "weather-";

/// One row of the icon metadata table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IconMeta {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl IconMeta {
    fn matches(&self, raw: &str, prefixed: &str) -> bool {
        self.name == raw
            || self.name == prefixed
            || self.aliases.iter().any(|a| a == raw || a == prefixed)
    }
}

#[derive(Debug, Clone)]
enum IconSource {
    Embedded(&'static str),
    File(PathBuf),
}

#[derive(Debug, Clone)]
struct IconEntry {
    meta: IconMeta,
    source: IconSource,
}

/// Ordered icon table with condition-token resolution.
#[derive(Debug, Clone)]
pub struct IconCatalog {
    entries: Vec<IconEntry>,
}

impl IconCatalog {
    /// The icon set compiled into the binary.
    pub fn builtin() -> DashResult<Self> {
        let metas = parse_meta(BUILTIN_META)?;
        let entries = metas
            .into_iter()
            .map(|meta| {
                let svg = BUILTIN_SVGS
                    .iter()
                    .find(|(name, _)| *name == meta.name)
                    .map(|(_, svg)| *svg)
                    .ok_or_else(|| DashError::Icon {
                        name: meta.name.clone(),
                        message: "no embedded SVG".to_string(),
                    })?;
                Ok(IconEntry {
                    meta,
                    source: IconSource::Embedded(svg),
                })
            })
            .collect::<DashResult<Vec<_>>>()?;

        Ok(Self { entries })
    }

    /// Load `icons-meta.json` from `dir`; SVG files are read on demand from
    /// `dir/<name>.svg`.
    pub fn from_dir(dir: impl AsRef<Path>) -> DashResult<Self> {
        let dir = dir.as_ref();
        let meta_path = dir.join(META_FILE);
        let text = fs::read_to_string(&meta_path).map_err(|e| DashError::Icon {
            name: META_FILE.to_string(),
            message: format!("{}: {}", meta_path.display(), e),
        })?;

        let entries: Vec<IconEntry> = parse_meta(&text)?
            .into_iter()
            .map(|meta| {
                let path = dir.join(format!("{}.svg", meta.name));
                IconEntry {
                    meta,
                    source: IconSource::File(path),
                }
            })
            .collect();

        debug!(dir = %dir.display(), icons = entries.len(), "Loaded icon catalog");
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.meta.name == name)
    }

    /// Icon name for a weather condition token.
    ///
    /// Scans the catalog in order; the first icon whose name is the token or
    /// `weather-<token>`, or whose aliases contain either, wins.
    pub fn resolve(&self, condition: &str) -> Option<&str> {
        let prefixed = format!("{}{}", CONDITION_PREFIX, condition);
        self.entries
            .iter()
            .find(|e| e.meta.matches(condition, &prefixed))
            .map(|e| e.meta.name.as_str())
    }

    /// Rasterize an icon to a `size` x `size` grayscale image on white.
    pub fn rasterize(&self, name: &str, size: u32) -> DashResult<GrayImage> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.meta.name == name)
            .ok_or_else(|| icon_error(name, "not in catalog"))?;

        match &entry.source {
            IconSource::Embedded(svg) => rasterize_svg(name, svg, size),
            IconSource::File(path) => {
                let svg = fs::read_to_string(path)
                    .map_err(|e| icon_error(name, format!("{}: {}", path.display(), e)))?;
                rasterize_svg(name, &svg, size)
            }
        }
    }
}

fn parse_meta(text: &str) -> DashResult<Vec<IconMeta>> {
    serde_json::from_str(text).map_err(|e| icon_error(META_FILE, e.to_string()))
}

fn icon_error(name: &str, message: impl Into<String>) -> DashError {
    DashError::Icon {
        name: name.to_string(),
        message: message.into(),
    }
}

/// Render SVG text into a square grayscale image, scaled to fit and centered.
pub fn rasterize_svg(name: &str, svg: &str, size: u32) -> DashResult<GrayImage> {
    let opt = usvg::Options::default();
    let tree = usvg::Tree::from_str(svg, &opt).map_err(|e| icon_error(name, e.to_string()))?;

    let mut pixmap = tiny_skia::Pixmap::new(size, size)
        .ok_or_else(|| icon_error(name, format!("invalid raster size {}", size)))?;
    pixmap.fill(tiny_skia::Color::WHITE);

    let svg_size = tree.size();
    let scale = (size as f32 / svg_size.width()).min(size as f32 / svg_size.height());
    let offset_x = (size as f32 - svg_size.width() * scale) / 2.0;
    let offset_y = (size as f32 - svg_size.height() * scale) / 2.0;

    let transform = tiny_skia::Transform::from_scale(scale, scale).post_translate(offset_x, offset_y);
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    // Opaque after the white fill, so premultiplied RGB is plain RGB
    let mut image = GrayImage::new(size, size);
    for (pixel, rgba) in image.pixels_mut().zip(pixmap.data().chunks_exact(4)) {
        let luma = (rgba[0] as u32 * 299 + rgba[1] as u32 * 587 + rgba[2] as u32 * 114) / 1000;
        *pixel = Luma([luma as u8]);
    }

    Ok(image)
}
