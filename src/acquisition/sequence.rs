use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::DynamicImage;
use ndarray::Array3;
use tracing::debug;

use super::FrameSource;
use crate::frame::Frame;
use crate::{Error, Result};

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "tif", "tiff", "bmp", "jpg", "jpeg"];

/// Load one image file as a frame.
///
/// Grayscale images become single-channel frames, colour images keep three
/// channels. 8-bit formats report a bit depth of 8, everything else 16.
pub fn load_frame<P: AsRef<Path>>(path: P) -> Result<Frame> {
    let img = image::open(path.as_ref())?;
    let (width, height) = (img.width() as usize, img.height() as usize);

    let (data, channels, bit_depth): (Vec<u16>, usize, u8) = match img {
        DynamicImage::ImageLuma8(buf) => (buf.into_raw().into_iter().map(u16::from).collect(), 1, 8),
        DynamicImage::ImageLuma16(buf) => (buf.into_raw(), 1, 16),
        DynamicImage::ImageLumaA8(_) => (
            img.to_luma8().into_raw().into_iter().map(u16::from).collect(),
            1,
            8,
        ),
        DynamicImage::ImageRgb8(buf) => (buf.into_raw().into_iter().map(u16::from).collect(), 3, 8),
        DynamicImage::ImageRgba8(_) => (
            img.to_rgb8().into_raw().into_iter().map(u16::from).collect(),
            3,
            8,
        ),
        DynamicImage::ImageLumaA16(_) => (img.to_luma16().into_raw(), 1, 16),
        other => (other.to_rgb16().into_raw(), 3, 16),
    };

    let pixels = Array3::from_shape_vec((height, width, channels), data)
        .map_err(|e| Error::InvalidFrame(e.to_string()))?;
    Frame::from_channels(pixels, bit_depth)
}

/// Replays image files in name order, optionally looping.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    index: usize,
    looping: bool,
}

impl ImageSequenceSource {
    pub fn new(paths: Vec<PathBuf>) -> Result<Self> {
        if paths.is_empty() {
            return Err(Error::Acquisition("image sequence is empty".to_string()));
        }
        Ok(Self {
            paths,
            index: 0,
            looping: false,
        })
    }

    /// Every image file directly inside `dir`, sorted by file name.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();
        debug!(dir = %dir.as_ref().display(), count = paths.len(), "image sequence loaded");
        Self::new(paths)
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn name(&self) -> &str {
        "image-sequence"
    }

    fn next_frame(&mut self, _timeout: Duration) -> Result<Frame> {
        if self.index >= self.paths.len() {
            if !self.looping {
                return Err(Error::Acquisition("image sequence exhausted".to_string()));
            }
            self.index = 0;
        }
        let path = &self.paths[self.index];
        self.index += 1;
        load_frame(path)
    }
}
