use std::time::{Duration, Instant};

use crate::client::{AnalysisClient, AnalysisOutcome, FrameAnalyzer};
use crate::rendering::{LabelFace, OverlayRenderer};
use crate::video::RgbFrame;

/// Stage timings are logged once every this many frames.
const PROFILE_EVERY: u64 = 300;

pub struct Analyzer<A> {
    inner: A,
    prof_frames: u64,
    prof_analyze: Duration,
    prof_failures: u64,
}

impl<A: FrameAnalyzer> Analyzer<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            prof_frames: 0,
            prof_analyze: Duration::ZERO,
            prof_failures: 0,
        }
    }

    pub fn analyze(&mut self, frame: &RgbFrame) -> AnalysisOutcome {
        let analyze_start = Instant::now();
        let outcome = self.inner.analyze(frame);
        self.prof_analyze += analyze_start.elapsed();
        self.prof_frames += 1;
        if !matches!(outcome, AnalysisOutcome::Faces(_)) {
            self.prof_failures += 1;
        }

        if self.prof_frames % PROFILE_EVERY == 0 {
            tracing::info!(
                frames = self.prof_frames,
                unanswered = self.prof_failures,
                analyze_ms_per_frame = format!(
                    "{:.2}",
                    self.prof_analyze.as_secs_f64() * 1000.0 / self.prof_frames as f64
                ),
                "pipeline analyze timings"
            );
        }

        outcome
    }
}

pub struct Renderer {
    renderer: OverlayRenderer,
    prof_frames: u64,
    prof_render: Duration,
}

impl Renderer {
    pub fn new(renderer: OverlayRenderer) -> Self {
        Self {
            renderer,
            prof_frames: 0,
            prof_render: Duration::ZERO,
        }
    }

    /// Draw the outcome's faces onto `frame`.  Failures are logged and leave
    /// the frame as it was, so it can still be shown.
    pub fn render(&mut self, frame: &mut RgbFrame, outcome: &AnalysisOutcome) {
        let render_start = Instant::now();
        let result = self.renderer.render_faces(frame, outcome.faces());
        self.prof_render += render_start.elapsed();
        self.prof_frames += 1;

        if let Err(e) = result {
            tracing::warn!(seq = frame.seq, "render error: {e}");
        }

        if self.prof_frames % PROFILE_EVERY == 0 {
            tracing::info!(
                frames = self.prof_frames,
                render_ms_per_frame = format!(
                    "{:.2}",
                    self.prof_render.as_secs_f64() * 1000.0 / self.prof_frames as f64
                ),
                "pipeline render timings"
            );
        }
    }
}

/// Analyze-then-render for a single frame.
pub struct Pipeline<A> {
    analyzer: Analyzer<A>,
    renderer: Renderer,
}

impl<A: FrameAnalyzer> Pipeline<A> {
    pub fn new(analyzer: A, renderer: OverlayRenderer) -> Self {
        Self {
            analyzer: Analyzer::new(analyzer),
            renderer: Renderer::new(renderer),
        }
    }

    /// Annotate `frame` in place and report what the analysis service said.
    pub fn process(&mut self, frame: &mut RgbFrame) -> AnalysisOutcome {
        let outcome = self.analyzer.analyze(frame);
        self.renderer.render(frame, &outcome);
        outcome
    }

    pub fn into_parts(self) -> (Analyzer<A>, Renderer) {
        (self.analyzer, self.renderer)
    }
}

impl Pipeline<AnalysisClient> {
    /// Pipeline talking to `endpoint`.  Without a label face only boxes are drawn.
    pub fn connect(endpoint: impl Into<String>, label_face: Option<Box<dyn LabelFace>>) -> Self {
        let client = AnalysisClient::new(endpoint);
        tracing::info!(endpoint = client.endpoint(), "analysis client ready");
        let renderer = match label_face {
            Some(face) => OverlayRenderer::new(face),
            None => {
                tracing::warn!("no label font available; drawing face boxes only");
                OverlayRenderer::without_labels()
            }
        };
        Self::new(client, renderer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::AnalysisResult;

    struct Canned(fn() -> AnalysisOutcome);

    impl FrameAnalyzer for Canned {
        fn analyze(&mut self, _frame: &RgbFrame) -> AnalysisOutcome {
            (self.0)()
        }
    }

    fn one_face() -> AnalysisOutcome {
        AnalysisOutcome::Faces(
            serde_json::from_str::<AnalysisResult>(
                r#"{"face": [{"box": [2, 2, 8, 8], "emotion": [{"emotion": "angry", "score": 1.0}]}]}"#,
            )
            .unwrap(),
        )
    }

    #[test]
    fn rejected_frames_pass_through_unchanged() {
        let mut pipeline = Pipeline::new(
            Canned(|| AnalysisOutcome::Rejected { status: 503 }),
            OverlayRenderer::without_labels(),
        );
        let mut frame = RgbFrame::solid(16, 16, [1, 2, 3]);
        let original = frame.clone();
        let outcome = pipeline.process(&mut frame);
        assert!(matches!(outcome, AnalysisOutcome::Rejected { status: 503 }));
        assert_eq!(frame, original);
    }

    #[test]
    fn faces_are_drawn() {
        let mut pipeline = Pipeline::new(Canned(one_face), OverlayRenderer::without_labels());
        let mut frame = RgbFrame::solid(16, 16, [0, 0, 0]);
        let outcome = pipeline.process(&mut frame);
        assert_eq!(outcome.faces().len(), 1);
        assert_eq!(&frame.data[(2 * 16 + 2) * 3..(2 * 16 + 2) * 3 + 3], &[255, 0, 0]);
    }

    #[test]
    fn render_error_keeps_frame_data() {
        let (_, mut renderer) =
            Pipeline::new(Canned(one_face), OverlayRenderer::without_labels()).into_parts();
        let mut frame = RgbFrame::solid(16, 16, [0, 0, 0]);
        frame.width = 17;
        renderer.render(&mut frame, &one_face());
        assert_eq!(frame.data.len(), 16 * 16 * 3);
    }
}
