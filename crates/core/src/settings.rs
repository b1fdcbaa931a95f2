use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Runtime tunables, read from `settings.json`. Every field has a default so
/// a missing or partial file still yields a usable configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Chat area in logical coordinates: `[x1, y1, x2, y2]`.
    pub chat_area: [i32; 4],
    /// Fixed logical-to-physical factor. `None` means measure at startup.
    pub scale_factor: Option<f64>,
    pub text_region: TextRegionLayout,
    pub content: ContentThresholds,
    /// Detections whose centers are closer than this are duplicates.
    pub duplicate_distance: f64,
    pub avatar_dir: PathBuf,
    /// Application id that gets the longer emulator settle delay.
    pub emulator_app: String,
    pub timing: Timing,
    /// Wheel lines per scroll gesture; positive scrolls towards older lines.
    pub scroll_amount: i32,
    /// Skip the gateway for text regions that look blank.
    pub skip_blank_regions: bool,
    pub debug_dir: PathBuf,
    pub gateway: GatewaySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chat_area: [660, 145, 935, 496],
            scale_factor: None,
            text_region: TextRegionLayout::default(),
            content: ContentThresholds::default(),
            duplicate_distance: 50.0,
            avatar_dir: PathBuf::from("game_elements/avatar"),
            emulator_app: "mumu".into(),
            timing: Timing::default(),
            scroll_amount: 5,
            skip_blank_regions: false,
            debug_dir: PathBuf::from("debug/avatar_template"),
            gateway: GatewaySettings::default(),
        }
    }
}

/// Placement of the text region relative to a detected avatar, in physical
/// pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextRegionLayout {
    pub offset_x: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for TextRegionLayout {
    fn default() -> Self {
        Self { offset_x: 10, width: 420, height: 222 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentThresholds {
    pub min_edge_density: f64,
    pub min_variance: f64,
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for ContentThresholds {
    fn default() -> Self {
        Self {
            min_edge_density: 0.02,
            min_variance: 100.0,
            canny_low: 50.0,
            canny_high: 150.0,
        }
    }
}

/// Delays in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub emulator_startup: f64,
    pub app_startup: f64,
    pub scroll_settle: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            emulator_startup: 3.0,
            app_startup: 1.0,
            scroll_settle: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub api_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".into(),
            model: "gpt-4o".into(),
            timeout_secs: 30,
            max_tokens: 500,
            api_key_env: "OPENAI_API_KEY".into(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }
}
