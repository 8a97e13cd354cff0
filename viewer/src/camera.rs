use anyhow::{Context, Result};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use tracing::info;

use moodlens_core::display::FrameSource;
use moodlens_core::video::RgbFrame;

/// A local camera, streamed as RGB.
pub struct CameraSource {
    index: u32,
    camera: Option<Camera>,
    seq: u64,
}

impl CameraSource {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            camera: None,
            seq: 0,
        }
    }
}

impl FrameSource for CameraSource {
    fn open(&mut self) -> Result<()> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(self.index), requested)
            .with_context(|| format!("failed to open camera {}", self.index))?;
        camera
            .open_stream()
            .with_context(|| format!("failed to start stream on camera {}", self.index))?;

        info!(
            index = self.index,
            resolution = %camera.resolution(),
            fps = camera.frame_rate(),
            "camera opened"
        );
        self.camera = Some(camera);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<RgbFrame>> {
        let camera = self.camera.as_mut().context("camera is not open")?;
        let buffer = camera.frame().context("failed to grab camera frame")?;
        // nokhwa hands back its own `image` version, so cross over via raw bytes.
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .context("failed to decode camera frame")?;
        let (width, height) = (decoded.width(), decoded.height());

        self.seq += 1;
        RgbFrame::new(decoded.into_raw(), width, height, self.seq).map(Some)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut camera) = self.camera.take() {
            camera
                .stop_stream()
                .with_context(|| format!("failed to stop camera {}", self.index))?;
            info!(index = self.index, frames = self.seq, "camera closed");
        }
        Ok(())
    }
}
