//! Session watermark.

use crate::config::WatermarkConfig;
use chrono::{DateTime, SecondsFormat, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Where the watermark is pinned on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkPosition {
    BottomRight,
    TopRight,
    BottomLeft,
    TopLeft,
    /// Centered and rotated
    Center,
}

impl WatermarkPosition {
    pub const ALL: [WatermarkPosition; 5] = [
        WatermarkPosition::BottomRight,
        WatermarkPosition::TopRight,
        WatermarkPosition::BottomLeft,
        WatermarkPosition::TopLeft,
        WatermarkPosition::Center,
    ];

    /// Margin from the viewport edge for corner positions, in px.
    pub const MARGIN_PX: u32 = 40;

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL
            .choose(rng)
            .copied()
            .unwrap_or(WatermarkPosition::Center)
    }
}

/// A rendered watermark request handed to a [`Surface`](super::Surface).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    pub text: String,
    pub opacity: f64,
    pub font_size: u32,
    pub position: WatermarkPosition,
}

impl Watermark {
    /// Session watermark: the configured prefix followed by the start time.
    pub fn session<R: Rng + ?Sized>(
        config: &WatermarkConfig,
        started: DateTime<Utc>,
        rng: &mut R,
    ) -> Self {
        Self {
            text: format!(
                "{}{}",
                config.prefix,
                started.to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
            opacity: config.opacity.clamp(0.0, 1.0),
            font_size: config.font_size,
            position: WatermarkPosition::random(rng),
        }
    }
}
