//! Length quantities written with a unit suffix, e.g. `"5.86 um"` or `"300 mm"`,
//! and second counts turned into durations.

use std::time::Duration;

use crate::{Error, Result};

/// Convert a second count from a config file or the command line.
///
/// Negative, NaN, infinite and overflowing values are reported as
/// [`Error::InvalidInput`] for `field`.
pub fn seconds(field: &'static str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|_| Error::InvalidInput {
        field,
        value: secs.to_string(),
    })
}

/// Parse a length and normalise it to metres.
///
/// A bare number is taken as metres.
pub fn parse_length_m(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let value: f64 = number.trim().parse().map_err(|_| Error::Config(format!(
        "{:?} is not a length (expected e.g. \"300 mm\")",
        text
    )))?;

    let scale = match unit.trim() {
        "" | "m" => 1.0,
        "cm" => 1e-2,
        "mm" => 1e-3,
        "um" | "µm" | "μm" => 1e-6,
        "nm" => 1e-9,
        other => return Err(Error::UnknownUnit(other.to_string())),
    };

    let metres = value * scale;
    if !metres.is_finite() {
        return Err(Error::Config(format!("{:?} is not a finite length", text)));
    }
    Ok(metres)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-12 * b.abs().max(1.0)
    }

    #[test]
    fn test_seconds_rejects_non_finite_and_negative() {
        assert_eq!(seconds("window", 1.5).unwrap(), Duration::from_millis(1500));
        assert_eq!(seconds("window", 0.0).unwrap(), Duration::ZERO);
        for bad in [-1.0, f64::NAN, f64::INFINITY, 1e30] {
            assert!(matches!(
                seconds("window", bad),
                Err(Error::InvalidInput { field: "window", .. })
            ));
        }
    }

    #[test]
    fn test_parse_common_units() {
        assert!(close(parse_length_m("5.86 um").unwrap(), 5.86e-6));
        assert!(close(parse_length_m("5.86µm").unwrap(), 5.86e-6));
        assert!(close(parse_length_m("300 mm").unwrap(), 0.3));
        assert!(close(parse_length_m(" 0.3 ").unwrap(), 0.3));
        assert!(close(parse_length_m("1.5e2 nm").unwrap(), 1.5e-7));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_length_m("300 furlongs"), Err(Error::UnknownUnit(_))));
        assert!(matches!(parse_length_m("mm"), Err(Error::Config(_))));
        assert!(parse_length_m("").is_err());
    }
}
