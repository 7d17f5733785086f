//! Colour gradients for value-based surface colouring.
//!
//! A [`ColorGradient`] maps a scalar in `[min, max]` onto a path of RGB stops.
//! Both renderers use it: the software path colours each quad by its mean
//! height, the hardware path colours each vertex.

use crate::error::{PlotError, Result};

use iced::Color;
use serde::{Deserialize, Serialize};

// ================================================================================
// Rgb
// ================================================================================

/// An 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Parse `#rrggbb` or `rrggbb`.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(PlotError::InvalidColour(hex.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| PlotError::InvalidColour(hex.to_string()))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Squared distance from black, which decides interpolation direction.
    fn distance_from_origin(&self) -> u32 {
        let (r, g, b) = (self.red as u32, self.green as u32, self.blue as u32);
        r * r + g * g + b * b
    }

    /// Normalised RGBA for GPU upload.
    pub fn to_array(self) -> [f32; 4] {
        [
            self.red as f32 / 255.0,
            self.green as f32 / 255.0,
            self.blue as f32 / 255.0,
            1.0,
        ]
    }
}

impl From<Rgb> for Color {
    fn from(rgb: Rgb) -> Self {
        Color::from_rgb8(rgb.red, rgb.green, rgb.blue)
    }
}

// ================================================================================
// Named palettes
// ================================================================================

/// Named palettes usable as gradient stops.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColormapName {
    /// Blue → cyan → green → yellow → red.
    #[default]
    Default,

    /// Perceptually uniform colormap (purple → blue → green → yellow).
    Viridis,

    /// Similar to Viridis but with more purple/yellow tones.
    Plasma,

    /// Improved rainbow (deep blue → cyan → yellow → red).
    Turbo,

    /// Classic heat map (black → red → yellow).
    Heat,

    /// Simple grayscale (black → white).
    Grayscale,
}

impl ColormapName {
    /// The evenly spaced stops making up this palette.
    pub fn stops(&self) -> Vec<Rgb> {
        match self {
            ColormapName::Default => default_stops(),
            ColormapName::Viridis => vec![
                Rgb::new(68, 1, 84),
                Rgb::new(72, 36, 117),
                Rgb::new(52, 73, 120),
                Rgb::new(33, 102, 94),
                Rgb::new(134, 130, 38),
                Rgb::new(253, 231, 37),
            ],
            ColormapName::Plasma => vec![
                Rgb::new(13, 8, 135),
                Rgb::new(70, 1, 156),
                Rgb::new(141, 7, 106),
                Rgb::new(195, 48, 55),
                Rgb::new(245, 97, 29),
                Rgb::new(240, 249, 33),
            ],
            ColormapName::Turbo => vec![
                Rgb::new(46, 18, 115),
                Rgb::new(0, 77, 189),
                Rgb::new(0, 199, 222),
                Rgb::new(0, 250, 153),
                Rgb::new(217, 247, 28),
                Rgb::new(247, 110, 0),
                Rgb::new(224, 0, 0),
            ],
            ColormapName::Heat => vec![
                Rgb::BLACK,
                Rgb::new(128, 0, 0),
                Rgb::new(255, 0, 0),
                Rgb::new(255, 128, 0),
                Rgb::new(255, 255, 0),
            ],
            ColormapName::Grayscale => vec![Rgb::BLACK, Rgb::WHITE],
        }
    }
}

/// The five-stop ramp used when no gradient is configured.
pub fn default_stops() -> Vec<Rgb> {
    vec![
        Rgb::new(0, 0, 255),
        Rgb::new(0, 255, 255),
        Rgb::new(0, 255, 0),
        Rgb::new(255, 255, 0),
        Rgb::new(255, 0, 0),
    ]
}

// ================================================================================
// ColorGradient
// ================================================================================

/// A path through RGB space over a value domain.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorGradient {
    min: f64,
    max: f64,
    stops: Vec<Rgb>,
}

impl ColorGradient {
    pub fn new(min: f64, max: f64, stops: Vec<Rgb>) -> Result<Self> {
        if stops.is_empty() {
            return Err(PlotError::EmptyGradient);
        }
        Ok(Self { min, max, stops })
    }

    /// Gradient over the default ramp.
    pub fn with_default_stops(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            stops: default_stops(),
        }
    }

    pub fn stops(&self) -> &[Rgb] {
        &self.stops
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// The colour at `value`.
    ///
    /// Anything outside the domain, NaN, or a single-stop gradient yields the
    /// first stop. Values above `max` deliberately do not map to the last stop.
    ///
    /// Inside a segment the blend starts from whichever bounding stop lies
    /// closer to black and runs toward the other one, and channels are
    /// truncated rather than rounded.
    pub fn colour(&self, value: f64) -> Rgb {
        let first = self.stops[0];
        if value.is_nan() || value < self.min || value > self.max || self.stops.len() == 1 {
            return first;
        }

        let scaled = unit_interval(value, self.min, self.max);
        let segments = self.stops.len() - 1;
        let width = 1.0 / segments as f64;

        // stops a value of exactly `max` from reading past the last stop
        let index = ((scaled / width) as usize).min(segments - 1);

        let (Some(&lower), Some(&upper)) = (self.stops.get(index), self.stops.get(index + 1))
        else {
            return first;
        };

        let fraction = unit_interval(scaled, index as f64 * width, (index + 1) as f64 * width);
        let (nearest, farthest, t) = if lower.distance_from_origin() > upper.distance_from_origin()
        {
            (upper, lower, 1.0 - fraction)
        } else {
            (lower, upper, fraction)
        };

        let blend = |from: u8, to: u8| (from as f64 + t * (to as f64 - from as f64)) as u8;
        Rgb::new(
            blend(nearest.red, farthest.red),
            blend(nearest.green, farthest.green),
            blend(nearest.blue, farthest.blue),
        )
    }
}

fn unit_interval(value: f64, min: f64, max: f64) -> f64 {
    if min == max {
        return 0.0;
    }
    (value - min) / (max - min)
}
