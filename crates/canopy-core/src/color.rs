//! Color handling for Canopy scenes
//!
//! This module provides the [`Color`] type which wraps the `DynamicColor` type
//! from the color crate. Scene documents write colors either as three floats
//! in `0..=1` (`"1 0 0"`) or as CSS colors (`"#ff0000"`, `"red"`); both forms
//! are accepted by [`Color::parse`].

use std::{
    hash::{Hash, Hasher},
    str::FromStr,
};

use color::DynamicColor;

/// Wrapper around the `DynamicColor` type from the color crate
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Color {
    color: DynamicColor,
}

impl Eq for Color {}

impl Hash for Color {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl Color {
    /// Create a new `Color` from a CSS color string such as "#ff0000",
    /// "rgb(255, 0, 0)" or "red".
    ///
    /// # Examples
    ///
    /// ```
    /// use canopy_core::color::Color;
    ///
    /// let red = Color::new("#ff0000").unwrap();
    /// let blue = Color::new("blue").unwrap();
    /// ```
    pub fn new(color_str: &str) -> Result<Self, String> {
        match DynamicColor::from_str(color_str) {
            Ok(color) => Ok(Self { color }),
            Err(err) => Err(format!("invalid color `{color_str}`: {err}")),
        }
    }

    /// Create a color from red, green and blue components in `0..=1`.
    ///
    /// Components outside the range are clamped. Non-finite components are
    /// rejected.
    pub fn from_rgb(r: f32, g: f32, b: f32) -> Result<Self, String> {
        if let Some(bad) = [r, g, b].into_iter().find(|c| !c.is_finite()) {
            return Err(format!("color component `{bad}` is not a finite number"));
        }
        let [r, g, b] = [r, g, b].map(|c| c.clamp(0.0, 1.0) * 255.0);
        Self::new(&format!("rgb({r}, {g}, {b})"))
    }

    /// Parse a color written either as three floats (`"1 0.5 0"`) or as a CSS color.
    ///
    /// # Examples
    ///
    /// ```
    /// use canopy_core::color::Color;
    ///
    /// let a = Color::parse("1 0 0").unwrap();
    /// let b = Color::parse("red").unwrap();
    /// assert_eq!(a.components(), b.components());
    /// ```
    pub fn parse(text: &str) -> Result<Self, String> {
        let parts: Vec<&str> = text.split([' ', ',']).filter(|p| !p.is_empty()).collect();
        if parts.len() == 3 {
            let floats: Result<Vec<f32>, _> = parts.iter().map(|p| p.parse::<f32>()).collect();
            if let Ok(rgb) = floats {
                return Self::from_rgb(rgb[0], rgb[1], rgb[2]);
            }
        }
        Self::new(text.trim())
    }

    /// Returns the raw color components (red, green, blue, alpha for sRGB colors).
    pub fn components(&self) -> [f32; 4] {
        self.color.components
    }

    /// Returns the alpha (transparency) component of this color.
    pub fn alpha(&self) -> f32 {
        self.color.components[3]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::new("black").expect("'black' is a valid CSS color")
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.color)
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::*;

    #[test]
    fn test_color_new() {
        assert!(Color::new("#ff0000").is_ok());
        assert!(Color::new("not-a-color").is_err());
    }

    #[test]
    fn test_color_parse_float_triplet() {
        let color = Color::parse("1 0 0").unwrap();
        let [r, g, b, a] = color.components();
        assert!(approx_eq!(f32, r, 1.0, epsilon = 0.001));
        assert!(approx_eq!(f32, g, 0.0, epsilon = 0.001));
        assert!(approx_eq!(f32, b, 0.0, epsilon = 0.001));
        assert!(approx_eq!(f32, a, 1.0, epsilon = 0.001));
    }

    #[test]
    fn test_color_parse_css_fallback() {
        let color = Color::parse("yellow").unwrap();
        assert_eq!(color, Color::new("yellow").unwrap());
        assert!(Color::parse("1 0").is_err());
    }

    #[test]
    fn test_color_from_rgb_clamps() {
        let color = Color::from_rgb(2.0, -1.0, 0.5).unwrap();
        let [r, g, b, _] = color.components();
        assert!(approx_eq!(f32, r, 1.0, epsilon = 0.001));
        assert!(approx_eq!(f32, g, 0.0, epsilon = 0.001));
        assert!(approx_eq!(f32, b, 0.5, epsilon = 0.01));
    }

    #[test]
    fn test_color_rejects_non_finite_components() {
        assert!(Color::from_rgb(f32::NAN, 0.0, 0.0).is_err());
        assert!(Color::from_rgb(0.0, f32::INFINITY, 0.0).is_err());
        assert!(Color::parse("NaN 0 0").is_err());
        assert!(Color::parse("0 0 -inf").is_err());
    }

    #[test]
    fn test_color_default() {
        assert_eq!(Color::default().to_string(), "black");
    }
}
