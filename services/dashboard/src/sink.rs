//! Display sinks: where a finished frame goes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use renderer::{Frame, Rotation};
use tracing::info;

/// Accepts a finished landscape frame and the rotation the panel needs.
pub trait DisplaySink {
    fn display(&mut self, frame: &Frame, rotation: Rotation) -> Result<()>;
}

/// Writes each frame as a 1-bit PNG, replacing the file atomically so a
/// reader never sees a partial image.
#[derive(Debug, Clone)]
pub struct PngFileSink {
    path: PathBuf,
}

impl PngFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DisplaySink for PngFileSink {
    fn display(&mut self, frame: &Frame, rotation: Rotation) -> Result<()> {
        let rotated = frame.rotate(rotation);
        let png = rotated.encode_png()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let tmp = self.path.with_extension("png.tmp");
        std::fs::write(&tmp, &png)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        info!(
            path = %self.path.display(),
            width = rotated.width(),
            height = rotated.height(),
            rotation = rotation.degrees(),
            bytes = png.len(),
            "Frame written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_sink_writes_rotated_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("panel.png");
        let mut sink = PngFileSink::new(&path);

        sink.display(&Frame::blank(264, 176), Rotation::Cw90).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        // IHDR width/height after rotation
        assert_eq!(u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]), 176);
        assert_eq!(u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]), 264);
        assert!(!path.with_extension("png.tmp").exists());
    }
}
