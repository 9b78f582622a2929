//! Theme system

use crate::heatmap::Rgba;
use ratatui::style::Color;

/// Complete color palette for TUI rendering
#[derive(Debug, Clone, Copy)]
pub struct ThemeColors {
    // Backgrounds
    pub bg_primary: Color,
    pub bg_panel: Color,
    pub bg_status: Color,

    // Borders
    pub border_default: Color,
    pub border_focus: Color,

    // Text
    pub text_primary: Color,
    pub text_secondary: Color,
    pub text_muted: Color,

    // Status
    pub error: Color,
    pub info: Color,

    // Map
    pub map_outline: Color,
    pub button_enabled: Color,
    pub button_disabled: Color,
}

impl ThemeColors {
    /// Default theme
    pub const DEFAULT: Self = Self {
        // Backgrounds
        bg_primary: Color::Rgb(22, 24, 38),
        bg_panel: Color::Rgb(32, 35, 52),
        bg_status: Color::Rgb(15, 15, 25),

        // Borders
        border_default: Color::Rgb(130, 135, 160),
        border_focus: Color::Rgb(120, 220, 170),

        // Text
        text_primary: Color::Rgb(230, 233, 248),
        text_secondary: Color::Rgb(185, 190, 210),
        text_muted: Color::Rgb(140, 145, 168),

        // Status
        error: Color::Rgb(250, 120, 130),
        info: Color::Rgb(110, 200, 245),

        // Map
        map_outline: Color::Rgb(70, 78, 110),
        button_enabled: Color::Rgb(235, 195, 100),
        button_disabled: Color::Rgb(70, 72, 88),
    };

    /// RGB components of the map background, for alpha blending
    pub const MAP_BG: (u8, u8, u8) = (22, 24, 38);

    /// Terminal color for a gradient stop drawn over the map background
    #[inline]
    pub fn heat(&self, stop: Rgba) -> Color {
        let (r, g, b) = stop.blend_over(Self::MAP_BG);
        Color::Rgb(r, g, b)
    }
}

/// Theme container providing access to color palette
#[derive(Debug, Clone, Copy, Default)]
pub struct Theme;

impl Theme {
    #[inline]
    pub const fn colors(&self) -> ThemeColors {
        ThemeColors::DEFAULT
    }
}
