//! Colour ramp used for the filled elevation grid.

use tiny_skia::Color;

/// Rainbow ramp: violet at 0, through blue, green and yellow, to red at 1.
pub fn rainbow(t: f64) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    let r = (2.0 * t - 0.5).abs();
    let g = (t * std::f64::consts::PI).sin();
    let b = (t * std::f64::consts::FRAC_PI_2).cos();
    [channel(r), channel(g), channel(b)]
}

fn channel(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Maps elevations onto the ramp over a fixed range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalize {
    pub min: f64,
    pub max: f64,
}

impl Normalize {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn fraction(&self, z: f64) -> f64 {
        let span = self.max - self.min;
        if span.abs() < f64::EPSILON {
            0.5
        } else {
            (z - self.min) / span
        }
    }

    pub fn color(&self, z: f64) -> Color {
        let [r, g, b] = rainbow(self.fraction(z));
        Color::from_rgba8(r, g, b, 255)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_ends() {
        assert_eq!(rainbow(0.0), [128, 0, 255]);
        assert_eq!(rainbow(1.0), [255, 0, 0]);
        assert_eq!(rainbow(-3.0), rainbow(0.0));
    }

    #[test]
    fn flat_range_maps_to_middle() {
        let n = Normalize::new(5.0, 5.0);
        assert_eq!(n.fraction(5.0), 0.5);
        assert_eq!(Normalize::new(0.0, 10.0).fraction(2.5), 0.25);
    }
}
