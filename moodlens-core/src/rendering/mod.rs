//! rendering — draw face annotations over a frame
//!
//! Every face gets a box coloured by its dominant emotion, then a stack of
//! labels growing upward from just above the box: demographics first, then
//! one line per emotion.  Each label paints an opaque background sized to
//! the measured text before the text itself, so it stays legible over any
//! video content.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::detection::{AnalysisResult, EmotionScore, FaceDetection};
use crate::video::RgbFrame;

/// Box colour for emotions missing from [`EMOTION_COLORS`], and for faces
/// with no emotion scores at all.
pub const FALLBACK_COLOR: Rgb<u8> = Rgb([128, 128, 128]);

pub const EMOTION_COLORS: [(&str, Rgb<u8>); 7] = [
    ("happy", Rgb([255, 255, 0])),   // yellow
    ("sad", Rgb([0, 0, 255])),       // blue
    ("angry", Rgb([255, 0, 0])),     // red
    ("surprise", Rgb([0, 255, 255])), // cyan
    ("neutral", Rgb([128, 128, 128])),
    ("disgust", Rgb([34, 139, 34])), // forest green
    ("fear", Rgb([255, 0, 255])),    // magenta
];

pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const LABEL_BACKGROUND: Rgb<u8> = Rgb([50, 50, 50]);

/// Stroke width of the face box.
const BOX_THICKNESS: i32 = 2;
/// Text is drawn this many times, one pixel apart, to embolden it.
const TEXT_THICKNESS: i32 = 2;
/// First label baseline sits this far above the box.
const LABEL_OFFSET: i32 = 10;
/// Vertical distance between stacked labels.
const LABEL_GAP: i32 = 20;
/// Background padding above the text top and below the baseline.
const BACKGROUND_PAD_TOP: i32 = 5;
const BACKGROUND_PAD_BOTTOM: i32 = 10;

/// Label font scale, relative to a nominal 30 px glyph height.
pub const FONT_SCALE: f32 = 0.5;
const PX_PER_FONT_SCALE: f32 = 30.0;

pub fn emotion_color(label: &str) -> Rgb<u8> {
    EMOTION_COLORS
        .iter()
        .find(|(name, _)| *name == label)
        .map_or(FALLBACK_COLOR, |(_, color)| *color)
}

// ── Label text & layout ──────────────────────────────────────────────────────

pub fn format_age(age: Option<f64>) -> String {
    match age {
        Some(a) if a.is_finite() && a.fract() == 0.0 => format!("{a:.0}"),
        Some(a) if a.is_finite() => format!("{a:.1}"),
        _ => "N/A".to_string(),
    }
}

pub fn demographics_text(face: &FaceDetection) -> String {
    format!(
        "Age: {}, Gender: {} ({:.2})",
        format_age(face.age),
        face.gender.as_deref().unwrap_or("N/A"),
        face.gender_score
    )
}

pub fn emotion_text(score: &EmotionScore) -> String {
    format!("{}: {:.1}%", score.emotion, score.score * 100.0)
}

/// A line of text anchored at its bottom-left corner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub text: String,
    pub x: i32,
    pub baseline: i32,
}

/// Labels for one face, bottom-most first.
pub fn face_labels(face: &FaceDetection) -> Vec<Label> {
    let texts =
        std::iter::once(demographics_text(face)).chain(face.emotions.iter().map(emotion_text));
    let anchor = face.bbox.clamped();
    let mut baseline = anchor.y.saturating_sub(LABEL_OFFSET);
    texts
        .map(|text| {
            let label = Label {
                text,
                x: anchor.x,
                baseline,
            };
            baseline = baseline.saturating_sub(LABEL_GAP);
            label
        })
        .collect()
}

/// Background rectangle behind a label whose text measures `text_w × text_h`.
pub fn label_background(label: &Label, text_w: u32, text_h: u32) -> Rect {
    let top = label
        .baseline
        .saturating_sub(text_h as i32)
        .saturating_sub(BACKGROUND_PAD_TOP);
    let height = text_h + (BACKGROUND_PAD_TOP + BACKGROUND_PAD_BOTTOM) as u32 + 1;
    Rect::at(label.x, top).of_size(text_w + 1, height)
}

// ── Fonts ────────────────────────────────────────────────────────────────────

/// Text measurement and rasterisation used for labels.
pub trait LabelFace {
    /// Pixel extent `(width, height)` of `text`.
    fn measure(&self, text: &str) -> (u32, u32);
    /// Draw `text` with its top-left corner at `(x, y)`.
    fn draw(&self, canvas: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>);
}

pub struct TrueTypeFace {
    font: FontVec,
    scale: PxScale,
}

impl TrueTypeFace {
    pub fn from_bytes(bytes: Vec<u8>, font_scale: f32) -> Result<Self> {
        let font = FontVec::try_from_vec(bytes).map_err(|e| anyhow!("invalid font data: {e}"))?;
        Ok(Self {
            font,
            scale: PxScale::from(font_scale * PX_PER_FONT_SCALE),
        })
    }

    pub fn load<P: AsRef<Path>>(path: P, font_scale: f32) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read font {}", path.display()))?;
        Self::from_bytes(bytes, font_scale)
            .with_context(|| format!("failed to parse font {}", path.display()))
    }
}

impl LabelFace for TrueTypeFace {
    fn measure(&self, text: &str) -> (u32, u32) {
        text_size(self.scale, &self.font, text)
    }

    fn draw(&self, canvas: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>) {
        draw_text_mut(canvas, color, x, y, self.scale, &self.font, text);
    }
}

// ── Renderer ─────────────────────────────────────────────────────────────────

/// Draws analysis results onto frames.  Without a [`LabelFace`] only the
/// boxes are drawn.
pub struct OverlayRenderer {
    face: Option<Box<dyn LabelFace>>,
}

impl OverlayRenderer {
    pub fn new(face: Box<dyn LabelFace>) -> Self {
        Self { face: Some(face) }
    }

    pub fn without_labels() -> Self {
        Self { face: None }
    }

    pub fn draws_labels(&self) -> bool {
        self.face.is_some()
    }

    pub fn render(&self, frame: &mut RgbFrame, result: &AnalysisResult) -> Result<()> {
        self.render_faces(frame, &result.faces)
    }

    /// Annotate `frame` in place.  With no faces the frame is not touched.
    pub fn render_faces(&self, frame: &mut RgbFrame, faces: &[FaceDetection]) -> Result<()> {
        if faces.is_empty() {
            return Ok(());
        }
        let mut img = frame.take_image()?;
        for face in faces {
            self.draw_face(&mut img, face);
        }
        frame.restore(img);
        Ok(())
    }

    fn draw_face(&self, img: &mut RgbImage, face: &FaceDetection) {
        let color = face
            .dominant_emotion()
            .map_or(FALLBACK_COLOR, |e| emotion_color(&e.emotion));
        draw_box(img, face, color);

        if let Some(font) = &self.face {
            for label in face_labels(face) {
                draw_label(img, font.as_ref(), &label);
            }
        }
    }
}

impl std::fmt::Debug for OverlayRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRenderer")
            .field("labels", &self.draws_labels())
            .finish()
    }
}

fn draw_box(img: &mut RgbImage, face: &FaceDetection, color: Rgb<u8>) {
    let b = face.bbox.clamped();
    // Grow the stroke inward so the outer edge stays on the reported box.
    for inset in 0..BOX_THICKNESS {
        let w = b.width.saturating_sub(2 * inset);
        let h = b.height.saturating_sub(2 * inset);
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(b.x.saturating_add(inset), b.y.saturating_add(inset))
            .of_size(w as u32, h as u32);
        draw_hollow_rect_mut(img, rect, color);
    }
}

fn draw_label(img: &mut RgbImage, font: &dyn LabelFace, label: &Label) {
    let (w, h) = font.measure(&label.text);
    let w = w + (TEXT_THICKNESS - 1) as u32;
    draw_filled_rect_mut(img, label_background(label, w, h), LABEL_BACKGROUND);

    let top = label.baseline.saturating_sub(h as i32);
    for dx in 0..TEXT_THICKNESS {
        font.draw(img, &label.text, label.x.saturating_add(dx), top, TEXT_COLOR);
    }
}
