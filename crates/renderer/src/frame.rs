//! Finished 1-bit raster handed to a display sink.

use std::fmt;
use std::str::FromStr;

use dashboard_common::{DashError, DashResult};
use image::{imageops, GrayImage, Luma};
use serde::Deserialize;

use crate::png::{create_png_mono, packed_row_len};

/// Gray levels below this become black when a canvas is quantized
pub const BLACK_THRESHOLD: u8 = 128;

const BLACK: Luma<u8> = Luma([0]);
const WHITE: Luma<u8> = Luma([255]);

/// Clockwise rotation applied before the frame reaches the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "u16")]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Cw90),
            180 => Ok(Rotation::Cw180),
            270 => Ok(Rotation::Cw270),
            other => Err(format!("rotation must be 0, 90, 180 or 270, got {}", other)),
        }
    }
}

impl FromStr for Rotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let degrees: u16 = s
            .trim()
            .parse()
            .map_err(|_| format!("invalid rotation '{}'", s))?;
        Rotation::try_from(degrees)
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.degrees())
    }
}

/// A monochrome image. Every pixel is pure black or pure white.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    image: GrayImage,
}

impl Frame {
    /// All-white frame.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::from_pixel(width, height, WHITE),
        }
    }

    /// Quantize a grayscale canvas at [`BLACK_THRESHOLD`].
    pub fn from_gray(mut canvas: GrayImage) -> Self {
        for pixel in canvas.pixels_mut() {
            *pixel = if pixel[0] < BLACK_THRESHOLD { BLACK } else { WHITE };
        }
        Self { image: canvas }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `false` outside the frame.
    pub fn is_black(&self, x: u32, y: u32) -> bool {
        x < self.width() && y < self.height() && self.image.get_pixel(x, y)[0] == 0
    }

    pub fn black_pixel_count(&self) -> usize {
        self.image.pixels().filter(|p| p[0] == 0).count()
    }

    /// Black pixels inside `[x0, x1) x [y0, y1)`, clipped to the frame.
    pub fn black_pixels_in(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> usize {
        let (x1, y1) = (x1.min(self.width()), y1.min(self.height()));
        (y0..y1)
            .flat_map(|y| (x0..x1).map(move |x| (x, y)))
            .filter(|&(x, y)| self.is_black(x, y))
            .count()
    }

    pub fn rotate(&self, rotation: Rotation) -> Frame {
        let image = match rotation {
            Rotation::None => self.image.clone(),
            Rotation::Cw90 => imageops::rotate90(&self.image),
            Rotation::Cw180 => imageops::rotate180(&self.image),
            Rotation::Cw270 => imageops::rotate270(&self.image),
        };
        Frame { image }
    }

    /// One bit per pixel, MSB first, each row padded to a whole byte,
    /// 1 = white.
    pub fn to_packed(&self) -> Vec<u8> {
        let width = self.width() as usize;
        let row_len = packed_row_len(width);
        let mut packed = vec![0u8; row_len * self.height() as usize];

        for (x, y, pixel) in self.image.enumerate_pixels() {
            if pixel[0] != 0 {
                let index = y as usize * row_len + x as usize / 8;
                packed[index] |= 0x80 >> (x % 8);
            }
        }
        packed
    }

    pub fn encode_png(&self) -> DashResult<Vec<u8>> {
        create_png_mono(
            &self.to_packed(),
            self.width() as usize,
            self.height() as usize,
        )
        .map_err(DashError::Render)
    }
}
