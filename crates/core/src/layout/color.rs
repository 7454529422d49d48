use serde::{Serialize, Serializer};
use std::fmt;

/// Returns at or beyond this magnitude (in percent) render fully saturated.
pub const SATURATION_PCT: f64 = 5.0;

const RED: [f64; 3] = [0.6, 0.0, 0.0];
const GRAY: [f64; 3] = [0.35, 0.35, 0.35];
const GREEN: [f64; 3] = [0.0, 0.6, 0.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({},{},{})", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Heatmap color for a daily return: red below zero, gray at zero, green above,
/// saturating at ±[`SATURATION_PCT`].
pub fn color_for_pct(pct: f64) -> Rgb {
    let pct = if pct.is_nan() { 0.0 } else { pct };
    let t = ((pct + SATURATION_PCT) / (2.0 * SATURATION_PCT)).clamp(0.0, 1.0);

    let (from, to, u) = if t < 0.5 {
        (RED, GRAY, t / 0.5)
    } else {
        (GRAY, GREEN, (t - 0.5) / 0.5)
    };

    let channel = |i: usize| {
        let v = from[i] + (to[i] - from[i]) * u;
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgb {
        r: channel(0),
        g: channel(1),
        b: channel(2),
    }
}
