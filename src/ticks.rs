//! Nice-number axis scaling and tick label generation.

/// How [`nice_num`] snaps a value onto the 1/2/5/10 ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NiceRounding {
    /// Nearest rung, which may land below the input.
    Round,
    /// Smallest rung at or above the input, used for axis maxima.
    Ceil,
}

/// Number of tick intervals on the z axis when it is scaled automatically.
pub const Z_AXIS_TICKS: usize = 10;

/// Default number of tick intervals for the sample-index axes.
pub const DEFAULT_INDEX_TICKS: usize = 4;

/// Snap `x` onto 1, 2, 5 or 10 times a power of ten.
///
/// Non-positive or non-finite input has no magnitude and is returned as is.
pub fn nice_num(x: f64, rounding: NiceRounding) -> f64 {
    if !(x.is_finite() && x > 0.0) {
        return x;
    }

    let exponent = x.log10().floor();
    let magnitude = 10.0_f64.powf(exponent);
    let fraction = x / magnitude;

    let nice_factor = match rounding {
        NiceRounding::Round => {
            if fraction < 1.5 {
                1.0
            } else if fraction < 3.0 {
                2.0
            } else if fraction < 7.0 {
                5.0
            } else {
                10.0
            }
        }
        NiceRounding::Ceil => {
            if fraction <= 1.0 {
                1.0
            } else if fraction <= 2.0 {
                2.0
            } else if fraction <= 5.0 {
                5.0
            } else {
                10.0
            }
        }
    };

    nice_factor * magnitude
}

/// Render a tick value with at most two decimals and no trailing zeros.
pub fn format_tick(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    // avoids printing "-0"
    if rounded == 0.0 {
        return "0".to_string();
    }
    format!("{rounded}")
}

/// Labels for an automatically scaled z axis: [`Z_AXIS_TICKS`] + 1 evenly
/// spaced values from 0 to `nice_max`.
pub fn z_axis_labels(nice_max: f64) -> Vec<String> {
    let interval = nice_max / Z_AXIS_TICKS as f64;
    (0..=Z_AXIS_TICKS)
        .map(|i| format_tick(i as f64 * interval))
        .collect()
}

/// Evenly spaced sample-index labels for an axis holding `count` samples.
pub fn index_labels(count: usize) -> Vec<String> {
    let last = count.saturating_sub(1);
    let ticks = DEFAULT_INDEX_TICKS.min(last).max(1);
    (0..=ticks)
        .map(|k| format_tick(k as f64 * last as f64 / ticks as f64))
        .collect()
}

/// Tick labels for the three axes of a hardware plot.
///
/// The number of tick intervals on each axis is one less than its label count.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AxisTicks {
    pub x: Vec<String>,
    pub y: Vec<String>,
    pub z: Vec<String>,
}

impl AxisTicks {
    pub fn x_ticks(&self) -> usize {
        self.x.len().saturating_sub(1)
    }

    pub fn y_ticks(&self) -> usize {
        self.y.len().saturating_sub(1)
    }

    pub fn z_ticks(&self) -> usize {
        self.z.len().saturating_sub(1)
    }
}
