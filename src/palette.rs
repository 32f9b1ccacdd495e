//! Color themes for particle rendering.
//!
//! Every particle picks its color uniformly at random from the active
//! palette when it is created or respawned. Colors are never blended while
//! a particle is alive.
//!
//! # Example
//!
//! ```ignore
//! use hyperjump::palette::{Palette, Theme};
//!
//! let palette = Palette::for_theme(Theme::SciFi, &custom_colors);
//! let color = palette.sample(&mut rng);
//! ```

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of slots in a themed or custom palette.
pub const PALETTE_SIZE: usize = 5;

/// An 8-bit RGB color as stored in user settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb8(pub u8, pub u8, pub u8);

impl Rgb8 {
    pub const WHITE: Rgb8 = Rgb8(255, 255, 255);
    pub const CYAN: Rgb8 = Rgb8(0, 255, 255);
    pub const MAGENTA: Rgb8 = Rgb8(255, 0, 255);
    pub const YELLOW: Rgb8 = Rgb8(255, 255, 0);
    pub const BLUE: Rgb8 = Rgb8(0, 0, 255);

    /// Convert to a normalized linear `Vec3` (each channel / 255).
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(
            self.0 as f32 / 255.0,
            self.1 as f32 / 255.0,
            self.2 as f32 / 255.0,
        )
    }
}

/// Default custom palette slots.
pub const DEFAULT_CUSTOM_COLORS: [Rgb8; PALETTE_SIZE] = [
    Rgb8::WHITE,
    Rgb8::CYAN,
    Rgb8::MAGENTA,
    Rgb8::YELLOW,
    Rgb8::BLUE,
];

/// Built-in sci-fi palette: cyan, blue, purple, pink and red-orange.
const SCIFI_COLORS: [Rgb8; PALETTE_SIZE] = [
    Rgb8(0, 200, 255),
    Rgb8(80, 100, 255),
    Rgb8(200, 50, 255),
    Rgb8(255, 50, 120),
    Rgb8(255, 80, 50),
];

/// Single color used by the classic theme.
const CLASSIC_COLOR: Rgb8 = Rgb8::WHITE;

/// Color theme selected in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Neon cyan/blue/purple/pink/orange.
    #[default]
    SciFi,
    /// Plain white starfield.
    Classic,
    /// The five user-chosen colors.
    Custom,
}

/// Resolved set of colors particles are drawn from.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: Vec<Vec3>,
}

impl Palette {
    /// Resolve the palette for a theme. `custom` is only consulted for
    /// [`Theme::Custom`].
    pub fn for_theme(theme: Theme, custom: &[Rgb8; PALETTE_SIZE]) -> Self {
        let colors = match theme {
            Theme::SciFi => SCIFI_COLORS.iter().map(|c| c.to_vec3()).collect(),
            Theme::Classic => vec![CLASSIC_COLOR.to_vec3()],
            Theme::Custom => custom.iter().map(|c| c.to_vec3()).collect(),
        };
        Self { colors }
    }

    /// All colors in this palette.
    pub fn colors(&self) -> &[Vec3] {
        &self.colors
    }

    /// Whether `color` is exactly one of this palette's entries.
    pub fn contains(&self, color: Vec3) -> bool {
        self.colors.iter().any(|c| *c == color)
    }

    /// Pick one color uniformly at random.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        self.colors[rng.gen_range(0..self.colors.len())]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::for_theme(Theme::SciFi, &DEFAULT_CUSTOM_COLORS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_theme_sizes() {
        assert_eq!(Palette::for_theme(Theme::SciFi, &DEFAULT_CUSTOM_COLORS).colors().len(), 5);
        assert_eq!(Palette::for_theme(Theme::Classic, &DEFAULT_CUSTOM_COLORS).colors().len(), 1);
        assert_eq!(Palette::for_theme(Theme::Custom, &DEFAULT_CUSTOM_COLORS).colors().len(), 5);
    }

    #[test]
    fn test_custom_uses_user_colors() {
        let custom = [Rgb8(10, 20, 30); PALETTE_SIZE];
        let palette = Palette::for_theme(Theme::Custom, &custom);
        assert!(palette.contains(Rgb8(10, 20, 30).to_vec3()));
        assert!(!palette.contains(Rgb8::WHITE.to_vec3()));
    }

    #[test]
    fn test_sample_stays_in_palette() {
        let palette = Palette::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(palette.contains(palette.sample(&mut rng)));
        }
    }

    #[test]
    fn test_theme_serde_names() {
        let theme: Theme = serde_json::from_str("\"scifi\"").unwrap();
        assert_eq!(theme, Theme::SciFi);
        assert!(serde_json::from_str::<Theme>("\"neon\"").is_err());
    }
}
