//! video — frame type plus the pixel conversions around it
//!
//! Frames travel through a tick as packed RGB24.  Cameras that deliver BGR
//! are normalised on entry; the display surface wants packed `0RGB` words on
//! exit; the analysis endpoint wants a base64-wrapped JPEG.

use std::io::Cursor;

use anyhow::{ensure, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, ExtendedColorType, RgbImage};

/// JPEG quality used for frames sent to the analysis endpoint.
pub const JPEG_QUALITY: u8 = 95;

/// A single captured frame in RGB24 format, along with a capture sequence
/// number used to correlate log lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
    pub data: Vec<u8>, // packed RGB24, row-major
    pub width: u32,
    pub height: u32,
    pub seq: u64,
}

/// Byte order of the three colour channels as delivered by a frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

impl RgbFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, seq: u64) -> Result<Self> {
        ensure!(
            data.len() == width as usize * height as usize * 3,
            "frame buffer holds {} bytes, expected {}x{}x3",
            data.len(),
            width,
            height
        );
        Ok(Self {
            data,
            width,
            height,
            seq,
        })
    }

    /// A frame filled with one colour.  Mostly useful for placeholders and tests.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            data,
            width,
            height,
            seq: 0,
        }
    }

    pub fn from_image(img: RgbImage, seq: u64) -> Self {
        let (width, height) = img.dimensions();
        Self {
            data: img.into_raw(),
            width,
            height,
            seq,
        }
    }

    /// Reinterpret the frame as an `RgbImage`, taking its buffer.  Pair with
    /// [`RgbFrame::restore`] to hand the buffer back without copying.
    /// On error the frame is left untouched.
    pub fn take_image(&mut self) -> Result<RgbImage> {
        ensure!(
            self.data.len() == self.width as usize * self.height as usize * 3,
            "frame buffer of {} bytes does not match {}x{} RGB",
            self.data.len(),
            self.width,
            self.height
        );
        let data = std::mem::take(&mut self.data);
        RgbImage::from_raw(self.width, self.height, data).context("frame buffer too small")
    }

    pub fn restore(&mut self, img: RgbImage) {
        self.data = img.into_raw();
    }

    /// Bring the frame into RGB order if the source delivered something else.
    pub fn normalize(&mut self, order: ChannelOrder) {
        if order == ChannelOrder::Bgr {
            swap_red_blue(self);
        }
    }

    /// Compress to JPEG and wrap in base64 for embedding in a JSON body.
    pub fn to_base64_jpeg(&self) -> Result<String, image::ImageError> {
        let mut jpeg = Vec::with_capacity(self.data.len() / 8);
        JpegEncoder::new_with_quality(Cursor::new(&mut jpeg), JPEG_QUALITY).encode(
            &self.data,
            self.width,
            self.height,
            ExtendedColorType::Rgb8,
        )?;
        Ok(STANDARD.encode(jpeg))
    }
}

/// Swap the first and third channel of every pixel in place (RGB ↔ BGR).
pub fn swap_red_blue(frame: &mut RgbFrame) {
    for px in frame.data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
}

/// Pack the frame into `0RGB` words, reusing `out` between calls.
pub fn pack_0rgb(frame: &RgbFrame, out: &mut Vec<u32>) {
    out.clear();
    out.extend(
        frame
            .data
            .chunks_exact(3)
            .map(|px| (px[0] as u32) << 16 | (px[1] as u32) << 8 | px[2] as u32),
    );
}

/// Load an image file from disk as an `RgbFrame`.
pub fn load_frame<P: AsRef<std::path::Path>>(path: P) -> Result<RgbFrame> {
    let path = path.as_ref();
    let img = image::open(path)
        .with_context(|| format!("failed to open image {}", path.display()))?
        .to_rgb8();
    Ok(RgbFrame::from_image(img, 0))
}

/// Write a frame to disk; the format follows the file extension.
pub fn save_frame<P: AsRef<std::path::Path>>(frame: &RgbFrame, path: P) -> Result<()> {
    let path = path.as_ref();
    image::save_buffer(
        path,
        &frame.data,
        frame.width,
        frame.height,
        ExtendedColorType::Rgb8,
    )
    .with_context(|| format!("failed to write image {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_mismatched_buffer() {
        assert!(RgbFrame::new(vec![0; 11], 2, 2, 0).is_err());
        assert!(RgbFrame::new(vec![0; 12], 2, 2, 0).is_ok());
    }

    #[test]
    fn bgr_frames_are_normalised() {
        let mut frame = RgbFrame::solid(2, 1, [10, 20, 30]);
        frame.normalize(ChannelOrder::Bgr);
        assert_eq!(frame.data, vec![30, 20, 10, 30, 20, 10]);

        frame.normalize(ChannelOrder::Rgb);
        assert_eq!(frame.data, vec![30, 20, 10, 30, 20, 10]);
    }

    #[test]
    fn packs_pixels_as_0rgb() {
        let frame = RgbFrame::solid(1, 2, [0x12, 0x34, 0x56]);
        let mut out = vec![7; 9];
        pack_0rgb(&frame, &mut out);
        assert_eq!(out, vec![0x0012_3456, 0x0012_3456]);
    }

    #[test]
    fn take_and_restore_keeps_buffer() {
        let mut frame = RgbFrame::solid(3, 2, [1, 2, 3]);
        let original = frame.clone();
        let img = frame.take_image().unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        frame.restore(img);
        assert_eq!(frame, original);
    }

    #[test]
    fn take_image_fails_on_bad_dimensions() {
        let mut frame = RgbFrame::solid(3, 2, [1, 2, 3]);
        frame.width = 4;
        assert!(frame.take_image().is_err());
        assert_eq!(frame.data.len(), 18);
    }

    #[test]
    fn base64_jpeg_decodes_to_same_size() {
        let frame = RgbFrame::solid(16, 8, [200, 100, 50]);
        let encoded = frame.to_base64_jpeg().unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }
}
