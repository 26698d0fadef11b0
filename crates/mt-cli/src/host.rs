//! Terminal host collaborators: an audio sink that logs instead of playing,
//! and an ASCII rendering of a headless surface.

use std::collections::BTreeMap;
use std::path::Path;

use mt_core::{AudioSink, HeadlessSurface};

const AUDIO_EXTENSIONS: &[&str] = &["ogg", "mp3", "wav", "flac", "webm"];

/// Counts playback requests per sound path.
#[derive(Debug, Default)]
pub struct LoggingAudio {
    played: BTreeMap<String, usize>,
}

impl LoggingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, path: &str) -> usize {
        self.played.get(path).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.played.values().sum()
    }
}

impl AudioSink for LoggingAudio {
    fn play(&mut self, path: &str, volume: f64) {
        let known = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if !known {
            tracing::warn!("unsupported audio file {path}");
        }
        tracing::debug!("play {path} at {volume:.2}");
        *self.played.entry(path.to_string()).or_default() += 1;
    }
}

/// Draw the surface's markers on a square character grid. `radius_px` is
/// the distance from the centre that maps to the grid edge.
pub fn render_ascii(surface: &HeadlessSurface, cells: usize, radius_px: f64) -> String {
    let cells = cells.max(3) | 1;
    let half = (cells / 2) as f64;
    let mut grid = vec![vec!['.'; cells]; cells];
    let mid = cells / 2;
    grid[mid][mid] = '+';

    if radius_px > 0.0 {
        for marker in surface.visible_markers() {
            let col = (half + marker.x / radius_px * half).round();
            let row = (half + marker.y / radius_px * half).round();
            if (0.0..cells as f64).contains(&col) && (0.0..cells as f64).contains(&row) {
                grid[row as usize][col as usize] = '*';
            }
        }
    }

    let mut out = String::with_capacity(cells * (cells + 1));
    for row in grid {
        out.extend(row);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use mt_core::{Marker, RenderSurface};

    use super::*;

    #[test]
    fn test_counts_plays() {
        let mut audio = LoggingAudio::new();
        audio.play("sounds/wave.ogg", 0.5);
        audio.play("sounds/wave.ogg", 0.5);
        audio.play("sounds/beep.xyz", 1.0);
        assert_eq!(audio.count("sounds/wave.ogg"), 2);
        assert_eq!(audio.total(), 3);
    }

    #[test]
    fn test_render_places_marker() {
        let mut surface = HeadlessSurface::new();
        surface.place_marker(
            0,
            Some(Marker {
                x: 50.0,
                y: 0.0,
                scale: 1.0,
                opacity: 1.0,
            }),
        );
        let art = render_ascii(&surface, 5, 100.0);
        let rows: Vec<&str> = art.lines().collect();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[2], "..+*.");
    }

    #[test]
    fn test_render_drops_out_of_frame() {
        let mut surface = HeadlessSurface::new();
        surface.place_marker(
            0,
            Some(Marker {
                x: 0.0,
                y: -500.0,
                scale: 1.0,
                opacity: 1.0,
            }),
        );
        assert!(!render_ascii(&surface, 5, 100.0).contains('*'));
    }
}
