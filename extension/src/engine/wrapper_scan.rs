// Full-bleed wrapper detection
// Pure function over a layout snapshot, no DOM access here

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

/// Position of an element within one layout snapshot.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// What the scan needs to know about one rendered element.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LayoutBox {
    pub node: NodeId,
    pub tag: String,
    /// Computed `display`
    pub display: String,
    pub width: f64,
    pub height: f64,
    /// Computed `background-color`
    pub background_color: String,
}

/// Elements wide and tall enough to occlude the root background that paint an opaque color.
pub fn find_occluding_wrappers(
    boxes: &[LayoutBox],
    viewport: Viewport,
    config: &EngineConfig,
) -> Vec<NodeId> {
    if viewport.width <= 0.0 || viewport.height <= 0.0 {
        return Vec::new();
    }

    let min_width = viewport.width * config.min_width_ratio;
    let min_height = viewport.height * config.min_height_ratio;

    boxes
        .iter()
        .filter(|b| !matches!(b.tag.to_ascii_lowercase().as_str(), "html" | "body"))
        .filter(|b| is_block_level(&b.display))
        .filter(|b| b.width >= min_width && b.height >= min_height)
        .filter(|b| !is_transparent(&b.background_color))
        .map(|b| b.node)
        .collect()
}

pub fn is_block_level(display: &str) -> bool {
    let display = display.trim().to_ascii_lowercase();
    !(display.is_empty()
        || display == "none"
        || display == "contents"
        || display.starts_with("inline"))
}

/// True for `transparent`, empty values and any color whose alpha is zero.
pub fn is_transparent(color: &str) -> bool {
    let color = color.trim().to_ascii_lowercase();
    if color.is_empty() || color == "transparent" || color == "none" {
        return true;
    }

    let Some(open) = color.find('(') else {
        return false;
    };
    let inner = color[open + 1..].trim_end_matches(')');

    // Modern syntax: rgb(0 0 0 / 0), legacy: rgba(0, 0, 0, 0)
    let alpha = if let Some((_, alpha)) = inner.split_once('/') {
        Some(alpha)
    } else {
        let parts: Vec<&str> = inner.split(',').collect();
        (parts.len() == 4).then(|| parts[3])
    };

    alpha.and_then(parse_alpha).map(|a| a <= 0.0).unwrap_or(false)
}

fn parse_alpha(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    match raw.strip_suffix('%') {
        Some(percent) => percent.trim().parse::<f64>().ok().map(|p| p / 100.0),
        None => raw.parse::<f64>().ok(),
    }
}
