//! client — blocking HTTP bridge to the face/emotion analysis service
//!
//! One `POST` per frame, body `{"image": "<base64 JPEG>"}`.  The caller always
//! gets an [`AnalysisOutcome`] back; nothing here returns `Err`, so a dead or
//! unhappy service can never stop the display loop.

use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::detection::{AnalysisResult, FaceDetection};
use crate::video::RgbFrame;

/// Where the analysis service listens unless told otherwise.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/frame";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),

    #[error("request to analysis service failed: {0}")]
    Transport(#[source] Box<ureq::Transport>),

    #[error("malformed analysis response: {0}")]
    Decode(#[source] std::io::Error),
}

/// What became of one analysis request.
#[derive(Debug)]
pub enum AnalysisOutcome {
    /// The service answered 200; it may still have found no faces.
    Faces(AnalysisResult),
    /// The service answered with something other than 200.
    Rejected { status: u16 },
    /// The request never produced a usable answer.
    Failed(ClientError),
}

impl AnalysisOutcome {
    /// Faces to draw.  Rejected and failed requests draw nothing.
    pub fn faces(&self) -> &[FaceDetection] {
        match self {
            AnalysisOutcome::Faces(result) => &result.faces,
            _ => &[],
        }
    }

    /// The result to hand to the renderer, empty unless the service answered 200.
    pub fn into_result(self) -> AnalysisResult {
        match self {
            AnalysisOutcome::Faces(result) => result,
            _ => AnalysisResult::default(),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            AnalysisOutcome::Faces(_) => OutcomeKind::Faces,
            AnalysisOutcome::Rejected { .. } => OutcomeKind::Rejected,
            AnalysisOutcome::Failed(_) => OutcomeKind::Failed,
        }
    }
}

/// Payload-free mirror of [`AnalysisOutcome`] for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Faces,
    Rejected,
    Failed,
}

/// Anything that can turn a frame into face detections.
pub trait FrameAnalyzer {
    fn analyze(&mut self, frame: &RgbFrame) -> AnalysisOutcome;
}

#[derive(Serialize)]
struct FrameRequest<'a> {
    image: &'a str,
}

pub struct AnalysisClient {
    agent: ureq::Agent,
    endpoint: String,
}

impl AnalysisClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, frame: &RgbFrame) -> Result<AnalysisOutcome, ClientError> {
        let image = frame.to_base64_jpeg()?;
        let response = match self
            .agent
            .post(&self.endpoint)
            .send_json(FrameRequest { image: &image })
        {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => return Ok(AnalysisOutcome::Rejected { status }),
            Err(ureq::Error::Transport(t)) => return Err(ClientError::Transport(Box::new(t))),
        };

        if response.status() != 200 {
            return Ok(AnalysisOutcome::Rejected {
                status: response.status(),
            });
        }

        let result: AnalysisResult = response.into_json().map_err(ClientError::Decode)?;
        Ok(AnalysisOutcome::Faces(result))
    }
}

impl Default for AnalysisClient {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl FrameAnalyzer for AnalysisClient {
    fn analyze(&mut self, frame: &RgbFrame) -> AnalysisOutcome {
        let start = Instant::now();
        let outcome = self
            .request(frame)
            .unwrap_or_else(AnalysisOutcome::Failed);
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match &outcome {
            AnalysisOutcome::Faces(result) => {
                debug!(seq = frame.seq, faces = result.faces.len(), elapsed_ms, "frame analyzed")
            }
            AnalysisOutcome::Rejected { status } => {
                debug!(seq = frame.seq, status, elapsed_ms, "analysis service rejected frame")
            }
            AnalysisOutcome::Failed(e) => {
                warn!(seq = frame.seq, elapsed_ms, "analysis failed: {e}")
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BBox;

    #[test]
    fn only_successful_outcomes_carry_faces() {
        let face = serde_json::from_str::<AnalysisResult>(
            r#"{"face": [{"box": [1, 2, 3, 4], "emotion": [{"emotion": "sad", "score": 0.5}]}]}"#,
        )
        .unwrap();

        let ok = AnalysisOutcome::Faces(face);
        assert_eq!(ok.kind(), OutcomeKind::Faces);
        assert_eq!(ok.faces()[0].bbox, BBox::new(1, 2, 3, 4));

        let rejected = AnalysisOutcome::Rejected { status: 500 };
        assert_eq!(rejected.kind(), OutcomeKind::Rejected);
        assert!(rejected.faces().is_empty());
        assert!(rejected.into_result().is_empty());
    }

    #[test]
    fn request_body_has_single_image_key() {
        let body = serde_json::to_value(FrameRequest { image: "abc=" }).unwrap();
        assert_eq!(body, serde_json::json!({"image": "abc="}));
    }

    #[test]
    fn unreachable_service_is_a_failed_outcome() {
        // nothing listens on the discard port
        let mut client = AnalysisClient::new("http://127.0.0.1:9/frame");
        let outcome = client.analyze(&RgbFrame::solid(4, 4, [0, 0, 0]));
        assert!(matches!(
            outcome,
            AnalysisOutcome::Failed(ClientError::Transport(_))
        ));
    }
}
