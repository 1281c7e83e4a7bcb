use std::fmt;
use std::ops::{Index, IndexMut};

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis as NdAxis};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Image axis a profile or peak position refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub const BOTH: [Axis; 2] = [Axis::X, Axis::Y];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
        }
    }
}

/// One value per image axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisPair<T> {
    pub x: T,
    pub y: T,
}

impl<T> AxisPair<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }

    pub fn from_fn(mut f: impl FnMut(Axis) -> T) -> Self {
        Self {
            x: f(Axis::X),
            y: f(Axis::Y),
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> AxisPair<U> {
        AxisPair {
            x: f(self.x),
            y: f(self.y),
        }
    }

    pub fn as_ref(&self) -> AxisPair<&T> {
        AxisPair {
            x: &self.x,
            y: &self.y,
        }
    }
}

impl<T> Index<Axis> for AxisPair<T> {
    type Output = T;

    fn index(&self, axis: Axis) -> &T {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
        }
    }
}

impl<T> IndexMut<Axis> for AxisPair<T> {
    fn index_mut(&mut self, axis: Axis) -> &mut T {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
        }
    }
}

/// How multi-channel pixels are reduced to one intensity before projection.
///
/// The selector is part of the processing configuration and passed into every
/// projection; it is never guessed from the frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSelector {
    /// Frame must have exactly one channel.
    #[default]
    Mono,
    /// Use a single channel by index.
    Channel(usize),
    /// Sum every channel.
    Sum,
    /// ITU-R BT.601 weighting of the first three channels in RGB order.
    Luminance,
}

impl fmt::Display for ChannelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelSelector::Mono => write!(f, "mono"),
            ChannelSelector::Channel(index) => write!(f, "channel {index}"),
            ChannelSelector::Sum => write!(f, "sum"),
            ChannelSelector::Luminance => write!(f, "luminance"),
        }
    }
}

const LUMA_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// A camera frame: `height x width x channels` samples of a fixed bit depth.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pixels: Array3<u16>,
    bit_depth: u8,
}

impl Frame {
    pub fn mono(pixels: Array2<u16>, bit_depth: u8) -> Result<Self> {
        Self::from_channels(pixels.insert_axis(NdAxis(2)), bit_depth)
    }

    pub fn from_channels(pixels: Array3<u16>, bit_depth: u8) -> Result<Self> {
        if !(1..=16).contains(&bit_depth) {
            return Err(Error::InvalidFrame(format!(
                "bit depth {bit_depth} outside 1..=16"
            )));
        }
        let (height, width, channels) = pixels.dim();
        if height == 0 || width == 0 || channels == 0 {
            return Err(Error::InvalidFrame(format!(
                "empty frame {width}x{height}x{channels}"
            )));
        }
        Ok(Self { pixels, bit_depth })
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn channels(&self) -> usize {
        self.pixels.dim().2
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    /// Largest representable sample value for this bit depth.
    pub fn max_value(&self) -> u16 {
        ((1u32 << self.bit_depth) - 1) as u16
    }

    pub fn pixels(&self) -> ArrayView3<'_, u16> {
        self.pixels.view()
    }

    /// Reduce the frame to one `f64` intensity plane.
    pub fn intensity(&self, selector: ChannelSelector) -> Result<Array2<f64>> {
        let channels = self.channels();
        let mismatch = || Error::ChannelMismatch {
            selector: selector.to_string(),
            channels,
        };

        match selector {
            ChannelSelector::Mono if channels == 1 => Ok(self.plane(0)),
            ChannelSelector::Mono => Err(mismatch()),
            ChannelSelector::Channel(index) if index < channels => Ok(self.plane(index)),
            ChannelSelector::Channel(_) => Err(mismatch()),
            ChannelSelector::Sum => Ok(self.pixels.mapv(f64::from).sum_axis(NdAxis(2))),
            ChannelSelector::Luminance => match channels {
                1 => Ok(self.plane(0)),
                3 | 4 => {
                    let mut plane = Array2::<f64>::zeros((self.height(), self.width()));
                    for (index, weight) in LUMA_WEIGHTS.iter().enumerate() {
                        plane.scaled_add(*weight, &self.channel_view(index).mapv(f64::from));
                    }
                    Ok(plane)
                }
                _ => Err(mismatch()),
            },
        }
    }

    fn channel_view(&self, index: usize) -> ArrayView2<'_, u16> {
        self.pixels.index_axis(NdAxis(2), index)
    }

    fn plane(&self, index: usize) -> Array2<f64> {
        self.channel_view(index).mapv(f64::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_rejects_bad_bit_depth() {
        let pixels = Array2::<u16>::zeros((4, 4));
        assert!(Frame::mono(pixels.clone(), 0).is_err());
        assert!(Frame::mono(pixels, 17).is_err());
    }

    #[test]
    fn test_mono_selector_requires_single_channel() {
        let frame = Frame::from_channels(Array3::<u16>::zeros((2, 2, 3)), 8).unwrap();
        assert!(matches!(
            frame.intensity(ChannelSelector::Mono),
            Err(Error::ChannelMismatch { channels: 3, .. })
        ));
        assert!(frame.intensity(ChannelSelector::Channel(3)).is_err());
        assert!(frame.intensity(ChannelSelector::Channel(2)).is_ok());
    }

    #[test]
    fn test_sum_and_luminance() {
        let mut pixels = Array3::<u16>::zeros((1, 2, 3));
        pixels[[0, 0, 0]] = 100;
        pixels[[0, 1, 1]] = 100;
        let frame = Frame::from_channels(pixels, 8).unwrap();

        let summed = frame.intensity(ChannelSelector::Sum).unwrap();
        assert_eq!(summed, array![[100.0, 100.0]]);

        let luma = frame.intensity(ChannelSelector::Luminance).unwrap();
        assert!((luma[[0, 0]] - 29.9).abs() < 1e-9);
        assert!((luma[[0, 1]] - 58.7).abs() < 1e-9);
    }

    #[test]
    fn test_axis_pair_indexing() {
        let mut pair = AxisPair::new(1, 2);
        pair[Axis::Y] = 5;
        assert_eq!(pair[Axis::X], 1);
        assert_eq!(pair.y, 5);
        assert_eq!(pair.map(|v| v * 2), AxisPair::new(2, 10));
    }
}
