use std::path::{Path, PathBuf};

use crate::rendering::{TrueTypeFace, FONT_SCALE};

/// Environment variable naming a TrueType/OpenType font for labels.
pub const FONT_ENV: &str = "MOODLENS_FONT";

/// Resolve the label font path.
///
/// Priority order:
/// 1) `explicit` (the `--font` flag), if the file exists
/// 2) `MOODLENS_FONT`, if the file exists
/// 3) well-known system font locations
pub fn locate_font(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            tracing::info!(path = %path.display(), "using font from command line");
            return Some(path.to_path_buf());
        }
        tracing::warn!(
            path = %path.display(),
            "font file does not exist; attempting auto-discovery"
        );
    }

    if let Some(existing) = std::env::var_os(FONT_ENV) {
        let existing_path = PathBuf::from(existing);
        if existing_path.is_file() {
            tracing::info!(path = %existing_path.display(), "using {FONT_ENV} from environment");
            return Some(existing_path);
        }
        tracing::warn!(
            path = %existing_path.display(),
            "{FONT_ENV} is set but file does not exist; attempting auto-discovery"
        );
    }

    let found = font_candidates().into_iter().find(|c| c.is_file());
    match &found {
        Some(path) => tracing::info!(path = %path.display(), "discovered system font"),
        None => tracing::warn!("could not locate a label font; set {FONT_ENV} or pass --font"),
    }
    found
}

/// Locate and parse the label font.  Any failure is logged and yields `None`.
pub fn load_label_face(explicit: Option<&Path>) -> Option<TrueTypeFace> {
    let path = locate_font(explicit)?;
    match TrueTypeFace::load(&path, FONT_SCALE) {
        Ok(face) => Some(face),
        Err(e) => {
            tracing::warn!("could not load label font: {e:#}");
            None
        }
    }
}

fn font_candidates() -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = [
        // Linux
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
        "/usr/share/fonts/noto/NotoSans-Regular.ttf",
        // macOS
        "/System/Library/Fonts/Helvetica.ttc",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "/Library/Fonts/Arial.ttf",
        // Windows
        "C:\\Windows\\Fonts\\arial.ttf",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.insert(0, cwd.join("fonts/label.ttf"));
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_existing_font_wins() {
        let path = std::env::temp_dir().join(format!("moodlens-font-{}.ttf", std::process::id()));
        std::fs::write(&path, b"not really a font").unwrap();
        assert_eq!(locate_font(Some(path.as_path())), Some(path.clone()));
        // present but unparsable
        assert!(TrueTypeFace::load(&path, FONT_SCALE).is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn candidates_cover_every_platform() {
        let candidates = font_candidates();
        assert!(candidates.iter().any(|c| c.to_string_lossy().contains("DejaVu")));
        assert!(candidates.iter().any(|c| c.to_string_lossy().contains("Helvetica")));
        assert!(candidates.iter().any(|c| c.to_string_lossy().contains("Arial")));
    }
}
