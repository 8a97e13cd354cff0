use anyhow::{anyhow, Result};
use minifb::{Key, Window, WindowOptions};

use moodlens_core::display::DisplaySurface;
use moodlens_core::video::{pack_0rgb, RgbFrame};

/// Size of the blank window shown until the first frame arrives.
pub const PLACEHOLDER_SIZE: (usize, usize) = (640, 480);

/// Native window showing one image, sized to the frames it is given.
///
/// The window appears blank when the surface is opened and is recreated
/// whenever the frame size changes.  Closing it, or pressing Escape, ends the
/// display loop.
pub struct WindowSurface {
    title: String,
    window: Option<Window>,
    size: (usize, usize),
    buffer: Vec<u32>,
}

impl WindowSurface {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            window: None,
            size: PLACEHOLDER_SIZE,
            buffer: Vec::new(),
        }
    }

    fn create(&mut self, size: (usize, usize)) -> Result<()> {
        let window = Window::new(&self.title, size.0, size.1, WindowOptions::default())
            .map_err(|e| anyhow!("failed to open window: {e}"))?;
        tracing::debug!(width = size.0, height = size.1, "display window created");
        self.window = Some(window);
        self.size = size;
        Ok(())
    }
}

impl DisplaySurface for WindowSurface {
    fn open(&mut self) -> Result<()> {
        self.create(self.size)?;
        self.buffer.clear();
        self.buffer.resize(self.size.0 * self.size.1, 0);
        if let Some(window) = self.window.as_mut() {
            window
                .update_with_buffer(&self.buffer, self.size.0, self.size.1)
                .map_err(|e| anyhow!("failed to update window: {e}"))?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.window
            .as_ref()
            .is_some_and(|w| w.is_open() && !w.is_key_down(Key::Escape))
    }

    fn present(&mut self, frame: &RgbFrame) -> Result<()> {
        let size = (frame.width as usize, frame.height as usize);
        if self.window.is_none() || self.size != size {
            self.create(size)?;
        }

        pack_0rgb(frame, &mut self.buffer);
        if let Some(window) = self.window.as_mut() {
            window
                .update_with_buffer(&self.buffer, size.0, size.1)
                .map_err(|e| anyhow!("failed to update window: {e}"))?;
        }
        Ok(())
    }

    fn idle(&mut self) -> Result<()> {
        if let Some(window) = self.window.as_mut() {
            window.update();
        }
        Ok(())
    }
}
