use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Output proportions accepted by the image model's `imageConfig.aspectRatio`.
///
/// Declaration order is the tie-break order used by [`AspectRatioTag::nearest`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatioTag {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[serde(rename = "16:9")]
    Landscape16x9,
}

impl AspectRatioTag {
    pub const ALL: [AspectRatioTag; 5] = [
        AspectRatioTag::Square,
        AspectRatioTag::Portrait3x4,
        AspectRatioTag::Landscape4x3,
        AspectRatioTag::Portrait9x16,
        AspectRatioTag::Landscape16x9,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatioTag::Square => "1:1",
            AspectRatioTag::Portrait3x4 => "3:4",
            AspectRatioTag::Landscape4x3 => "4:3",
            AspectRatioTag::Portrait9x16 => "9:16",
            AspectRatioTag::Landscape16x9 => "16:9",
        }
    }

    /// Anchor width/height value for the tag.
    pub fn ratio(self) -> f64 {
        match self {
            AspectRatioTag::Square => 1.0,
            AspectRatioTag::Portrait3x4 => 0.75,
            AspectRatioTag::Landscape4x3 => 1.333,
            AspectRatioTag::Portrait9x16 => 0.5625,
            AspectRatioTag::Landscape16x9 => 1.777,
        }
    }

    /// Tag whose anchor is closest to `ratio`; the earlier tag in [`Self::ALL`] wins ties.
    pub fn nearest(ratio: f64) -> Self {
        let mut best = AspectRatioTag::ALL[0];
        let mut best_delta = (best.ratio() - ratio).abs();
        for candidate in AspectRatioTag::ALL.into_iter().skip(1) {
            let delta = (candidate.ratio() - ratio).abs();
            if delta < best_delta {
                best = candidate;
                best_delta = delta;
            }
        }
        best
    }
}

impl fmt::Display for AspectRatioTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatioTag {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim();
        AspectRatioTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == normalized)
            .ok_or_else(|| format!("unsupported aspect ratio '{normalized}'"))
    }
}
