//! detection — faces as reported by the analysis service
//!
//! The service answers each frame with a JSON document whose `face` array
//! carries one entry per detected face.  Only the fields the overlay needs
//! are modelled; everything else in the payload is ignored.

use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

/// Largest coordinate magnitude accepted from the service.  Anything beyond
/// is clamped so box and label arithmetic stays far from `i32` overflow.
pub const MAX_COORD: i32 = 1 << 16;

/// Pixel-space bounding box, `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Every field limited to `±MAX_COORD`.
    pub fn clamped(self) -> Self {
        let c = |v: i32| v.clamp(-MAX_COORD, MAX_COORD);
        Self::new(c(self.x), c(self.y), c(self.width), c(self.height))
    }
}

impl<'de> Deserialize<'de> for BBox {
    /// `[x, y, w, h]`; the service may send fractional pixels, which are
    /// rounded, and each value is clamped to `±MAX_COORD`.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<f64>::deserialize(deserializer)?;
        match raw.as_slice() {
            // `as` saturates and maps NaN to 0
            [x, y, w, h] => Ok(BBox::new(
                x.round() as i32,
                y.round() as i32,
                w.round() as i32,
                h.round() as i32,
            )
            .clamped()),
            other => Err(de::Error::invalid_length(other.len(), &"a box of [x, y, w, h]")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmotionScore {
    pub emotion: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FaceDetection {
    #[serde(rename = "box")]
    pub bbox: BBox,
    /// `None` whenever the service sent anything other than a number.
    #[serde(default, deserialize_with = "numeric_or_unknown")]
    pub age: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, rename = "genderScore")]
    pub gender_score: f64,
    #[serde(default, rename = "emotion")]
    pub emotions: Vec<EmotionScore>,
}

impl FaceDetection {
    /// Highest-scoring emotion.  Ties go to the earliest entry in service order.
    pub fn dominant_emotion(&self) -> Option<&EmotionScore> {
        self.emotions.iter().fold(None, |best, candidate| match best {
            Some(b) if candidate.score <= b.score => Some(b),
            _ => Some(candidate),
        })
    }
}

/// One frame's worth of detections.  A response without a `face` key carries
/// no faces.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, rename = "face")]
    pub faces: Vec<FaceDetection>,
}

impl AnalysisResult {
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

fn numeric_or_unknown<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(Value::deserialize(deserializer)?.as_f64())
}
