//! Service configuration loaded from YAML.
//!
//! Every key is optional; a missing file section falls back to the defaults
//! of the deployment the dashboard was built for.
//!
//! ```yaml
//! hub:
//!   base_url: http://homeassistant.local:8123/api
//!   forecast_source: websocket
//!   entities:
//!     electric_cost: sensor.comed_5_minute_price
//! display:
//!   width: 176
//!   height: 264
//!   rotation: 90
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use hub_client::HubConfig;
use renderer::{Rotation, PANEL_HEIGHT, PANEL_WIDTH};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub hub: HubConfig,
    pub display: DisplayConfig,
}

/// Physical panel, in its native portrait orientation.
///
/// The dashboard layout is fixed at 264x176 landscape, so the panel must be
/// at least 176 wide and 264 tall. Larger panels leave the extra area blank.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    /// Applied to the landscape canvas before it reaches the sink
    pub rotation: Rotation,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: PANEL_WIDTH,
            height: PANEL_HEIGHT,
            rotation: Rotation::Cw90,
        }
    }
}

impl DisplayConfig {
    /// Canvas the layout is drawn on: the panel turned to landscape.
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width < PANEL_WIDTH || self.height < PANEL_HEIGHT {
            bail!(
                "Display {}x{} is smaller than the {}x{} panel the layout needs",
                self.width,
                self.height,
                PANEL_WIDTH,
                PANEL_HEIGHT
            );
        }
        Ok(())
    }
}

impl DashboardConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: DashboardConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config
            .display
            .validate()
            .with_context(|| format!("Invalid display section in {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load `path` if given, otherwise start from defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Command-line and environment values win over the file.
    pub fn apply_overrides(
        &mut self,
        url: Option<String>,
        token: Option<String>,
        rotation: Option<Rotation>,
    ) {
        if let Some(url) = url {
            self.hub.base_url = url;
        }
        if let Some(token) = token {
            self.hub.access_token = token;
        }
        if let Some(rotation) = rotation {
            self.display.rotation = rotation;
        }
    }
}
