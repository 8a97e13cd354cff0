//! display — the capture → analyze → render → present loop
//!
//! [`DisplayLoop`] owns the frame source and the display surface for the
//! whole run.  Exactly one tick is in flight at a time: the analysis request
//! blocks the tick, so the refresh rate is bounded by the service round trip
//! plus the fixed inter-tick delay.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::client::{FrameAnalyzer, OutcomeKind};
use crate::pipeline::Pipeline;
use crate::video::{ChannelOrder, RgbFrame};

/// Delay between the end of one tick and the start of the next.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(10);

/// While acquisition keeps failing, only every Nth failure is logged at `warn`.
const FAILURE_WARN_EVERY: u64 = 100;

/// Somewhere frames come from, typically a camera.
pub trait FrameSource {
    /// Acquire the device.  Called once, before the first frame.
    fn open(&mut self) -> Result<()>;

    /// Next frame, or `Ok(None)` when none is ready this tick.
    fn next_frame(&mut self) -> Result<Option<RgbFrame>>;

    /// Channel order of the frames returned by [`FrameSource::next_frame`].
    fn channel_order(&self) -> ChannelOrder {
        ChannelOrder::Rgb
    }

    /// Release the device.  Called once, after the last frame.
    fn close(&mut self) -> Result<()>;
}

/// Where annotated frames are shown.
pub trait DisplaySurface {
    /// Make the surface visible.  Called once, before the source is opened,
    /// so the user can close the app even if no frame ever arrives.
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// `false` once the user has closed the surface; the loop then stops.
    fn is_open(&self) -> bool;

    fn present(&mut self, frame: &RgbFrame) -> Result<()>;

    /// Called on ticks with no frame so the surface can keep handling events.
    fn idle(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickReport {
    /// No frame was available; nothing was analyzed or shown.
    Skipped,
    Rendered {
        seq: u64,
        faces: usize,
        outcome: OutcomeKind,
    },
}

pub struct DisplayLoop<S, D, A> {
    source: S,
    surface: D,
    pipeline: Pipeline<A>,
    interval: Duration,
    ticks: u64,
    skipped: u64,
    failures_in_a_row: u64,
}

impl<S, D, A> DisplayLoop<S, D, A>
where
    S: FrameSource,
    D: DisplaySurface,
    A: FrameAnalyzer,
{
    pub fn new(source: S, surface: D, pipeline: Pipeline<A>) -> Self {
        Self {
            source,
            surface,
            pipeline,
            interval: DEFAULT_INTERVAL,
            ticks: 0,
            skipped: 0,
            failures_in_a_row: 0,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run a single capture → analyze → render → present cycle.
    ///
    /// The source must already be open; [`DisplayLoop::run`] takes care of
    /// that.
    pub fn tick(&mut self) -> Result<TickReport> {
        self.ticks += 1;
        let mut frame = match self.source.next_frame() {
            Ok(Some(frame)) => {
                self.failures_in_a_row = 0;
                frame
            }
            Ok(None) => return self.skip(),
            Err(e) => {
                if self.failures_in_a_row % FAILURE_WARN_EVERY == 0 {
                    warn!(
                        tick = self.ticks,
                        failures = self.failures_in_a_row + 1,
                        "frame acquisition failed: {e:#}"
                    );
                } else {
                    debug!(tick = self.ticks, "frame acquisition failed: {e:#}");
                }
                self.failures_in_a_row += 1;
                return self.skip();
            }
        };

        frame.normalize(self.source.channel_order());
        let outcome = self.pipeline.process(&mut frame);
        self.surface.present(&frame)?;

        Ok(TickReport::Rendered {
            seq: frame.seq,
            faces: outcome.faces().len(),
            outcome: outcome.kind(),
        })
    }

    fn skip(&mut self) -> Result<TickReport> {
        self.skipped += 1;
        self.surface.idle()?;
        Ok(TickReport::Skipped)
    }

    /// Open the surface and the source, then tick until the surface closes.
    pub fn run(&mut self) -> Result<()> {
        self.run_for(u64::MAX).map(|_| ())
    }

    /// Like [`DisplayLoop::run`] but stops after `max_ticks` ticks.  Returns
    /// the number of ticks performed.  Once opened, the source is closed on
    /// every exit path.
    pub fn run_for(&mut self, max_ticks: u64) -> Result<u64> {
        self.surface.open()?;
        self.source.open()?;
        info!(interval_ms = self.interval.as_millis() as u64, "display loop started");

        let start = self.ticks;
        let result = self.drive(max_ticks);
        if let Err(e) = self.source.close() {
            warn!("failed to close frame source: {e:#}");
        }

        info!(
            ticks = self.ticks - start,
            skipped = self.skipped,
            "display loop stopped"
        );
        result.map(|()| self.ticks - start)
    }

    fn drive(&mut self, max_ticks: u64) -> Result<()> {
        let mut done = 0;
        while done < max_ticks && self.surface.is_open() {
            self.tick()?;
            done += 1;
            if !self.interval.is_zero() {
                thread::sleep(self.interval);
            }
        }
        Ok(())
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn into_parts(self) -> (S, D, Pipeline<A>) {
        (self.source, self.surface, self.pipeline)
    }
}
