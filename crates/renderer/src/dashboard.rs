//! Dashboard layout.
//!
//! The canvas is drawn in landscape (`panel height` x `panel width`) and laid
//! out as three strips, each with its own x-cursor:
//!
//! ```text
//! y=2    [low] 61.5°  [high] 84°
//! y=30   +------+  +------+  +------+
//!        | 3 PM |  | 4 PM |  | 5 PM |
//!        | icon |  | icon |  | icon |
//!        |  72° |  |  71° |  |  70° |
//! y=120  +------+  +------+  +------+
//! y=130  [bolt] 3.4¢  [home] 12.34 kWh
//! ```

use dashboard_common::{DashError, DashResult, ForecastPoint, Snapshot};
use image::{GrayImage, Luma};
use tracing::warn;

use crate::frame::Frame;
use crate::icons::IconCatalog;
use crate::text::TextFace;

/// Panel size in its native portrait orientation
pub const PANEL_WIDTH: u32 = 176;
pub const PANEL_HEIGHT: u32 = 264;

/// Edge length the fixed status icons are rasterized at
pub const STATUS_ICON_SIZE: u32 = 24;
/// Edge length of forecast condition icons
pub const FORECAST_ICON_SIZE: u32 = 50;

const LOW_TEMPERATURE_ICON: &str = "thermometer-chevron-down";
const HIGH_TEMPERATURE_ICON: &str = "thermometer-chevron-up";
const ELECTRIC_COST_ICON: &str = "lightning-bolt";
const ENERGY_ICON: &str = "home-lightning-bolt";

/// Placeholder for a temperature never observed
pub const MISSING_VALUE: &str = "--";

// Temperature row
const TEMPERATURE_ROW_X: i32 = 5;
const TEMPERATURE_ICON_Y: i32 = 2;
const TEMPERATURE_TEXT_Y: i32 = 5;
const TEMPERATURE_ICON_ADVANCE: i32 = 25;

// Forecast row
const FORECAST_ROW_X: i32 = 13;
const CARD_TOP: i32 = 30;
const CARD_WIDTH: i32 = 70;
const CARD_BOTTOM: i32 = 120;
const CARD_RADIUS: i32 = 7;
const CARD_PITCH: i32 = 82;
const HOUR_LABEL_Y: i32 = 32;
const FORECAST_ICON_Y: i32 = 50;
/// Temperature label sits slightly right of the card center to balance the
/// degree sign
const FORECAST_TEMPERATURE_NUDGE: i32 = 3;

// Cost + energy row
const ENERGY_ROW_X: i32 = 0;
const ENERGY_ICON_Y: i32 = 130;
const ENERGY_TEXT_Y: i32 = 133;
const ELECTRIC_COST_ICON_ADVANCE: i32 = 22;
const ENERGY_ICON_ADVANCE: i32 = 25;

/// Horizontal gap between the two items of a strip
const ITEM_GAP: i32 = 10;

/// Status icons rasterized once at construction.
#[derive(Debug, Clone)]
struct StatusIcons {
    low_temperature: GrayImage,
    high_temperature: GrayImage,
    electric_cost: GrayImage,
    energy: GrayImage,
}

/// Read-only rendering context: text face, icon catalog and pre-rasterized
/// status icons.
#[derive(Debug)]
pub struct Renderer<F> {
    face: F,
    catalog: IconCatalog,
    icons: StatusIcons,
    width: u32,
    height: u32,
}

impl<F: TextFace> Renderer<F> {
    /// Renderer for the default panel, drawn in landscape.
    pub fn new(face: F, catalog: IconCatalog) -> DashResult<Self> {
        Self::with_canvas(face, catalog, PANEL_HEIGHT, PANEL_WIDTH)
    }

    /// Renderer with an explicit canvas size. The layout is fixed, so the
    /// canvas must be at least the landscape panel size; extra space stays
    /// blank. Also fails if any status icon is missing from the catalog or
    /// cannot be rasterized.
    pub fn with_canvas(face: F, catalog: IconCatalog, width: u32, height: u32) -> DashResult<Self> {
        if width < PANEL_HEIGHT || height < PANEL_WIDTH {
            return Err(DashError::Render(format!(
                "canvas {}x{} is smaller than the {}x{} layout",
                width, height, PANEL_HEIGHT, PANEL_WIDTH
            )));
        }

        let icons = StatusIcons {
            low_temperature: catalog.rasterize(LOW_TEMPERATURE_ICON, STATUS_ICON_SIZE)?,
            high_temperature: catalog.rasterize(HIGH_TEMPERATURE_ICON, STATUS_ICON_SIZE)?,
            electric_cost: catalog.rasterize(ELECTRIC_COST_ICON, STATUS_ICON_SIZE)?,
            energy: catalog.rasterize(ENERGY_ICON, STATUS_ICON_SIZE)?,
        };

        Ok(Self {
            face,
            catalog,
            icons,
            width,
            height,
        })
    }

    /// Lay out the snapshot. Same snapshot, same frame.
    pub fn render(&self, snapshot: &Snapshot) -> Frame {
        let mut canvas = GrayImage::from_pixel(self.width, self.height, Luma([255]));

        self.draw_temperature_row(&mut canvas, snapshot);
        self.draw_forecast_row(&mut canvas, &snapshot.forecast);
        self.draw_energy_row(&mut canvas, snapshot);

        Frame::from_gray(canvas)
    }

    fn draw_temperature_row(&self, canvas: &mut GrayImage, snapshot: &Snapshot) {
        let mut x = TEMPERATURE_ROW_X;

        paste(canvas, &self.icons.low_temperature, x, TEMPERATURE_ICON_Y);
        x += TEMPERATURE_ICON_ADVANCE;
        x = self.draw_text(canvas, x, TEMPERATURE_TEXT_Y, &degrees(snapshot.day_low));
        x += ITEM_GAP;

        paste(canvas, &self.icons.high_temperature, x, TEMPERATURE_ICON_Y);
        x += TEMPERATURE_ICON_ADVANCE;
        self.draw_text(canvas, x, TEMPERATURE_TEXT_Y, &degrees(snapshot.day_high));
    }

    fn draw_forecast_row(&self, canvas: &mut GrayImage, forecast: &[ForecastPoint]) {
        let mut x = FORECAST_ROW_X;

        for point in forecast.iter().take(dashboard_common::MAX_FORECAST_POINTS) {
            draw_rounded_rect(canvas, x, CARD_TOP, x + CARD_WIDTH, CARD_BOTTOM, CARD_RADIUS);

            let center = x + CARD_WIDTH / 2;
            let hour = hour_label(point);
            let hour_width = self.face.advance_width(&hour) as i32;
            self.face.draw(canvas, center - hour_width / 2, HOUR_LABEL_Y, &hour);

            let temperature = degrees(point.temperature);
            let temperature_width = self.face.advance_width(&temperature) as i32;
            self.face.draw(
                canvas,
                center + FORECAST_TEMPERATURE_NUDGE - temperature_width / 2,
                CARD_BOTTOM - self.face.line_height() as i32,
                &temperature,
            );

            self.draw_condition_icon(canvas, &point.condition, center - FORECAST_ICON_SIZE as i32 / 2);

            x += CARD_PITCH;
        }
    }

    fn draw_condition_icon(&self, canvas: &mut GrayImage, condition: &str, x: i32) {
        let Some(name) = self.catalog.resolve(condition) else {
            warn!(condition, "No icon for forecast condition");
            return;
        };

        match self.catalog.rasterize(name, FORECAST_ICON_SIZE) {
            Ok(icon) => paste(canvas, &icon, x, FORECAST_ICON_Y),
            Err(e) => warn!(condition, icon = name, error = %e, "Failed to rasterize forecast icon"),
        }
    }

    fn draw_energy_row(&self, canvas: &mut GrayImage, snapshot: &Snapshot) {
        let mut x = ENERGY_ROW_X;

        paste(canvas, &self.icons.electric_cost, x, ENERGY_ICON_Y);
        x += ELECTRIC_COST_ICON_ADVANCE;
        x = self.draw_text(
            canvas,
            x,
            ENERGY_TEXT_Y,
            &fixed(snapshot.electric_cost_cents_per_kwh, 1, "¢"),
        );
        x += ITEM_GAP;

        paste(canvas, &self.icons.energy, x, ENERGY_ICON_Y);
        x += ENERGY_ICON_ADVANCE;
        self.draw_text(canvas, x, ENERGY_TEXT_Y, &fixed(snapshot.daily_energy_kwh, 2, " kWh"));
    }

    /// Draw left-anchored text and return the cursor after it.
    fn draw_text(&self, canvas: &mut GrayImage, x: i32, y: i32, text: &str) -> i32 {
        self.face.draw(canvas, x, y, text);
        x + self.face.advance_width(text) as i32
    }
}

/// Temperature with a degree mark, one decimal at most, `--` when unknown.
pub fn degrees(value: f64) -> String {
    format!("{}°", format_temperature(value))
}

pub fn format_temperature(value: f64) -> String {
    if !value.is_finite() {
        return MISSING_VALUE.to_string();
    }
    let rounded = (value * 10.0).round() / 10.0;
    if rounded == 0.0 {
        "0".to_string()
    } else if rounded.fract() == 0.0 {
        format!("{:.0}", rounded)
    } else {
        format!("{:.1}", rounded)
    }
}

/// Fixed-decimals value with a unit suffix, `--` when unknown.
fn fixed(value: f64, decimals: usize, unit: &str) -> String {
    if value.is_finite() {
        format!("{:.*}{}", decimals, value, unit)
    } else {
        format!("{}{}", MISSING_VALUE, unit)
    }
}

/// 12-hour clock label, e.g. `3 PM`.
pub fn hour_label(point: &ForecastPoint) -> String {
    point.timestamp.format("%-I %p").to_string()
}

/// Copy `icon` onto the canvas with its top-left at (x, y), clipped.
fn paste(canvas: &mut GrayImage, icon: &GrayImage, x: i32, y: i32) {
    for (ix, iy, pixel) in icon.enumerate_pixels() {
        put(canvas, x + ix as i32, y + iy as i32, *pixel);
    }
}

fn put(canvas: &mut GrayImage, x: i32, y: i32, pixel: Luma<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, pixel);
    }
}

/// One-pixel black outline of a rectangle with rounded corners. Both corner
/// coordinates are inclusive.
pub fn draw_rounded_rect(canvas: &mut GrayImage, x0: i32, y0: i32, x1: i32, y1: i32, radius: i32) {
    let black = Luma([0]);
    let r = radius.min((x1 - x0) / 2).min((y1 - y0) / 2).max(0);

    for x in (x0 + r)..=(x1 - r) {
        put(canvas, x, y0, black);
        put(canvas, x, y1, black);
    }
    for y in (y0 + r)..=(y1 - r) {
        put(canvas, x0, y, black);
        put(canvas, x1, y, black);
    }

    let corners = [
        (x0 + r, y0 + r, -1, -1),
        (x1 - r, y0 + r, 1, -1),
        (x0 + r, y1 - r, -1, 1),
        (x1 - r, y1 - r, 1, 1),
    ];
    for (dx, dy) in quarter_circle(r) {
        for &(cx, cy, sx, sy) in &corners {
            put(canvas, cx + sx * dx, cy + sy * dy, black);
        }
    }
}

/// Midpoint-circle points with `dx, dy >= 0` for radius `r`.
fn quarter_circle(r: i32) -> Vec<(i32, i32)> {
    let mut points = Vec::new();
    let (mut x, mut y) = (r, 0);
    let mut err = 1 - r;
    while x >= y {
        points.push((x, y));
        points.push((y, x));
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
    points
}
