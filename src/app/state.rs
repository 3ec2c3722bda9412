// SPDX-License-Identifier: GPL-3.0-only

//! Capture session state

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Capture session state machine
///
/// ```text
///            start_camera                 capture / upload
/// CameraOff ─────────────▶ CameraLive ───────────────────────▶ Reviewing
///     │  ▲                     │  ▲                                │
///     │  └──── stop_camera ────┘  └──────────── retake ────────────┘
///     │                                                             ▲
///     └────────────────────────── upload ───────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No stream; only "turn on camera" and "upload" are offered
    #[default]
    CameraOff,
    /// Live preview
    CameraLive,
    /// A composed image is shown; only "save" and "retake" are offered
    Reviewing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::CameraOff => write!(f, "the camera is off"),
            SessionState::CameraLive => write!(f, "the camera is live"),
            SessionState::Reviewing => write!(f, "reviewing a photo"),
        }
    }
}

/// Local per-pixel color filters (preview and capture)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalFilter {
    /// Black & white
    #[default]
    Mono,
    /// Warm brownish tint
    Sepia,
    /// High contrast black & white
    Noir,
    /// Boosted saturation and contrast
    Vivid,
    /// Blue color temperature shift
    Cool,
    /// Orange/amber color temperature
    Warm,
    /// Lifted blacks with muted colors
    Fade,
    /// Two-color gradient mapping
    Duotone,
    /// Darkened edges
    Vignette,
    /// Inverted colors
    Negative,
    /// Reduced color levels (pop-art)
    Posterize,
    /// Partially inverted tones
    Solarize,
}

impl LocalFilter {
    pub const ALL: [LocalFilter; 12] = [
        LocalFilter::Mono,
        LocalFilter::Sepia,
        LocalFilter::Noir,
        LocalFilter::Vivid,
        LocalFilter::Cool,
        LocalFilter::Warm,
        LocalFilter::Fade,
        LocalFilter::Duotone,
        LocalFilter::Vignette,
        LocalFilter::Negative,
        LocalFilter::Posterize,
        LocalFilter::Solarize,
    ];

    /// Stable identifier used on the command line and in logs
    pub fn id(&self) -> &'static str {
        match self {
            LocalFilter::Mono => "mono",
            LocalFilter::Sepia => "sepia",
            LocalFilter::Noir => "noir",
            LocalFilter::Vivid => "vivid",
            LocalFilter::Cool => "cool",
            LocalFilter::Warm => "warm",
            LocalFilter::Fade => "fade",
            LocalFilter::Duotone => "duotone",
            LocalFilter::Vignette => "vignette",
            LocalFilter::Negative => "negative",
            LocalFilter::Posterize => "posterize",
            LocalFilter::Solarize => "solarize",
        }
    }
}

/// Server-side AI transforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiStyle {
    /// Cartoon-style stylization
    Stylize,
    /// Make the subject look younger
    DeAge,
}

impl AiStyle {
    pub const ALL: [AiStyle; 2] = [AiStyle::Stylize, AiStyle::DeAge];
}

impl fmt::Display for AiStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiStyle::Stylize => write!(f, "stylize"),
            AiStyle::DeAge => write!(f, "de-age"),
        }
    }
}

/// The filter applied to the next capture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum FilterSelection {
    /// Frame is drawn unchanged (displays as "ORIGINAL")
    #[default]
    PassThrough,
    /// Per-pixel filter applied while drawing
    Local(LocalFilter),
    /// Round trip through the AI transform service
    Ai(AiStyle),
}

impl FilterSelection {
    /// Every selectable filter, in picker order
    pub fn all() -> Vec<FilterSelection> {
        let mut all = vec![FilterSelection::PassThrough];
        all.extend(LocalFilter::ALL.into_iter().map(FilterSelection::Local));
        all.extend(AiStyle::ALL.into_iter().map(FilterSelection::Ai));
        all
    }

    pub fn is_ai(&self) -> bool {
        matches!(self, FilterSelection::Ai(_))
    }

    pub fn local(&self) -> Option<LocalFilter> {
        match self {
            FilterSelection::Local(filter) => Some(*filter),
            _ => None,
        }
    }
}

impl fmt::Display for FilterSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterSelection::PassThrough => write!(f, "original"),
            FilterSelection::Local(filter) => write!(f, "{}", filter.id()),
            FilterSelection::Ai(style) => write!(f, "{}", style),
        }
    }
}

impl FromStr for FilterSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "original" | "none" | "standard" => return Ok(FilterSelection::PassThrough),
            "stylize" | "cartoon" => return Ok(FilterSelection::Ai(AiStyle::Stylize)),
            "de-age" | "deage" | "younger" => return Ok(FilterSelection::Ai(AiStyle::DeAge)),
            _ => {}
        }
        LocalFilter::ALL
            .into_iter()
            .find(|f| f.id() == s)
            .map(FilterSelection::Local)
            .ok_or_else(|| format!("unknown filter '{}'", s))
    }
}

/// Which controls are enabled right now
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub turn_on_camera: bool,
    pub upload: bool,
    pub capture: bool,
    pub filters: bool,
    pub mirror: bool,
    pub switch_camera: bool,
    pub save: bool,
    pub retake: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_parse() {
        assert_eq!(
            "Sepia".parse::<FilterSelection>().unwrap(),
            FilterSelection::Local(LocalFilter::Sepia)
        );
        assert_eq!(
            "cartoon".parse::<FilterSelection>().unwrap(),
            FilterSelection::Ai(AiStyle::Stylize)
        );
        assert_eq!(
            "none".parse::<FilterSelection>().unwrap(),
            FilterSelection::PassThrough
        );
        assert!("sparkle".parse::<FilterSelection>().is_err());
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        for filter in FilterSelection::all() {
            assert_eq!(filter.to_string().parse::<FilterSelection>(), Ok(filter));
        }
    }

    #[test]
    fn test_all_filters_count() {
        assert_eq!(FilterSelection::all().len(), 1 + 12 + 2);
    }
}
