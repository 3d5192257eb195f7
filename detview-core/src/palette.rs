//! Fixed category colors used by the overlay, the legend, and the detection list.

use detview_utils::color::RgbaColor;

/// Visual style for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryStyle {
    pub stroke: RgbaColor,
    /// Label text drawn on top of a `stroke`-filled background.
    pub text: RgbaColor,
}

impl CategoryStyle {
    const fn solid(red: u8, green: u8, blue: u8) -> Self {
        Self {
            stroke: RgbaColor::opaque(red, green, blue),
            text: RgbaColor::WHITE,
        }
    }
}

pub const HAPPY: CategoryStyle = CategoryStyle::solid(0x10, 0xB9, 0x81);
pub const NEUTRAL: CategoryStyle = CategoryStyle::solid(0xF5, 0x9E, 0x0B);
pub const SAD: CategoryStyle = CategoryStyle::solid(0xEF, 0x44, 0x44);
pub const ANGRY: CategoryStyle = CategoryStyle::solid(0xDC, 0x26, 0x26);
pub const SURPRISED: CategoryStyle = CategoryStyle::solid(0x8B, 0x5C, 0xF6);
/// Style for any category not listed above.
pub const DEFAULT_STYLE: CategoryStyle = CategoryStyle::solid(0x63, 0x66, 0xF1);

/// Look up the style for `category`, ignoring ASCII case.
pub fn style_for(category: &str) -> CategoryStyle {
    match category.trim().to_ascii_lowercase().as_str() {
        "happy" => HAPPY,
        "neutral" => NEUTRAL,
        "sad" => SAD,
        "angry" => ANGRY,
        "surprised" => SURPRISED,
        _ => DEFAULT_STYLE,
    }
}
