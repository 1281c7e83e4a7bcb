use ndarray::Axis as NdAxis;
use serde::{Deserialize, Serialize};

use crate::frame::{Axis, AxisPair, ChannelSelector, Frame};
use crate::Result;

/// Summed intensities indexed by pixel coordinate along one axis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntensityProfile {
    values: Vec<f64>,
}

impl IntensityProfile {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// First index holding the largest value.
    pub fn argmax(&self) -> Option<usize> {
        self.values
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (index, &value)| match best {
                Some((_, best_value)) if best_value >= value => best,
                _ => Some((index, value)),
            })
            .map(|(index, _)| index)
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    pub fn min(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::min)
    }
}

impl From<Vec<f64>> for IntensityProfile {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

/// Sum the frame along the axis orthogonal to `axis`.
///
/// The X profile has one entry per column, the Y profile one per row.
pub fn project(frame: &Frame, axis: Axis, channel: ChannelSelector) -> Result<IntensityProfile> {
    let plane = frame.intensity(channel)?;
    let summed = match axis {
        Axis::X => plane.sum_axis(NdAxis(0)),
        Axis::Y => plane.sum_axis(NdAxis(1)),
    };
    Ok(IntensityProfile::new(summed.to_vec()))
}

/// Both profiles from a single channel reduction.
pub fn project_both(frame: &Frame, channel: ChannelSelector) -> Result<AxisPair<IntensityProfile>> {
    let plane = frame.intensity(channel)?;
    Ok(AxisPair::new(
        IntensityProfile::new(plane.sum_axis(NdAxis(0)).to_vec()),
        IntensityProfile::new(plane.sum_axis(NdAxis(1)).to_vec()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_frame() -> Frame {
        Frame::mono(array![[1u16, 2, 3], [4, 5, 6]], 8).unwrap()
    }

    #[test]
    fn test_project_sums_orthogonal_axis() {
        let frame = sample_frame();
        let x = project(&frame, Axis::X, ChannelSelector::Mono).unwrap();
        let y = project(&frame, Axis::Y, ChannelSelector::Mono).unwrap();
        assert_eq!(x.values(), &[5.0, 7.0, 9.0]);
        assert_eq!(y.values(), &[6.0, 15.0]);
    }

    #[test]
    fn test_project_both_matches_single_axis() {
        let frame = sample_frame();
        let both = project_both(&frame, ChannelSelector::Mono).unwrap();
        assert_eq!(both.x, project(&frame, Axis::X, ChannelSelector::Mono).unwrap());
        assert_eq!(both.y, project(&frame, Axis::Y, ChannelSelector::Mono).unwrap());
    }

    #[test]
    fn test_argmax_takes_first_maximum() {
        let profile = IntensityProfile::new(vec![1.0, 4.0, 4.0, 2.0]);
        assert_eq!(profile.argmax(), Some(1));
        assert_eq!(profile.max(), Some(4.0));
        assert_eq!(IntensityProfile::default().argmax(), None);
    }
}
