use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

const ARCSEC_PER_RADIAN: f64 = 180.0 / PI * 3600.0;

/// Linear pixel → arcsecond scale of an autocollimator.
///
/// A beam tilt of θ moves the spot by `2 · f · θ` in the focal plane, so one
/// pixel corresponds to `pitch / (2 · f)` radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConverter {
    arcsec_per_pixel: f64,
}

impl CalibrationConverter {
    pub fn from_optics(pixel_pitch_m: f64, focal_length_m: f64) -> Self {
        Self {
            arcsec_per_pixel: pixel_pitch_m / (2.0 * focal_length_m) * ARCSEC_PER_RADIAN,
        }
    }

    pub fn from_factor(arcsec_per_pixel: f64) -> Self {
        Self { arcsec_per_pixel }
    }

    pub fn factor(&self) -> f64 {
        self.arcsec_per_pixel
    }

    pub fn pixels_to_arcsec(&self, pixels: f64) -> f64 {
        pixels * self.arcsec_per_pixel
    }

    pub fn arcsec_to_pixels(&self, arcsec: f64) -> f64 {
        arcsec / self.arcsec_per_pixel
    }
}

/// Height difference over a baseline `increment_m` produced by a tilt of `arcsec`.
pub fn arcsec_to_microns(arcsec: f64, increment_m: f64) -> f64 {
    arcsec * PI * increment_m * 1e6 / (3600.0 * 180.0)
}

pub fn microns_to_arcsec(microns: f64, increment_m: f64) -> f64 {
    microns * 3600.0 * 180.0 / (PI * increment_m * 1e6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_from_optics() {
        // 5.86 µm pixels behind a 300 mm objective
        let converter = CalibrationConverter::from_optics(5.86e-6, 0.3);
        assert!((converter.factor() - 2.014_5).abs() < 1e-3);
        assert!((converter.pixels_to_arcsec(10.0) - 10.0 * converter.factor()).abs() < 1e-12);
        assert!((converter.arcsec_to_pixels(converter.pixels_to_arcsec(3.25)) - 3.25).abs() < 1e-12);
    }

    #[test]
    fn test_one_arcsec_over_100mm() {
        // 1" over 100 mm is roughly half a micron
        let microns = arcsec_to_microns(1.0, 0.1);
        assert!((microns - 0.484_813_7).abs() < 1e-6);
    }

    #[test]
    fn test_micron_arcsec_round_trip() {
        for &(value, increment) in &[(12.5, 0.1), (-3.2, 0.05), (0.0, 1.0)] {
            let back = microns_to_arcsec(arcsec_to_microns(value, increment), increment);
            assert!((back - value).abs() < 1e-9);
            let forward = arcsec_to_microns(microns_to_arcsec(value, increment), increment);
            assert!((forward - value).abs() < 1e-9);
        }
    }
}
