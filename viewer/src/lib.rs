pub mod camera;
pub mod window;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use moodlens_core::{
    client::DEFAULT_ENDPOINT,
    display::{DisplayLoop, DEFAULT_INTERVAL},
    pipeline::Pipeline,
    rendering::LabelFace,
    runtime::load_label_face,
};

pub use camera::CameraSource;
pub use window::WindowSurface;

/// Everything the live viewer needs to start.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub endpoint: String,
    pub camera_index: u32,
    pub interval: Duration,
    pub font: Option<PathBuf>,
    pub title: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            camera_index: 0,
            interval: DEFAULT_INTERVAL,
            font: None,
            title: "Live Camera Feed".to_string(),
        }
    }
}

/// Open the camera and a window, then annotate frames until the window closes.
pub fn run(config: ViewerConfig) -> Result<()> {
    let label_face = load_label_face(config.font.as_deref())
        .map(|face| Box::new(face) as Box<dyn LabelFace>);
    let pipeline = Pipeline::connect(config.endpoint, label_face);

    let mut display = DisplayLoop::new(
        CameraSource::new(config.camera_index),
        WindowSurface::new(config.title),
        pipeline,
    )
    .with_interval(config.interval);

    display.run()
}
