//! In-memory collaborators for hosts without a real renderer or mixer.

use crate::surface::{AudioSink, Marker, RenderSurface, TextureId};

/// Records the latest state of every drawable instead of drawing it.
#[derive(Clone, Debug, Default)]
pub struct HeadlessSurface {
    pub size: u32,
    pub markers: Vec<Option<Marker>>,
    pub beam_fraction: f64,
    pub readout: String,
    pub readout_alpha: f64,
    pub textures: Vec<String>,
    pub frames: u64,
    pub clears: u64,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible_markers(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter().flatten()
    }
}

impl RenderSurface for HeadlessSurface {
    fn load_texture(&mut self, path: &str) -> TextureId {
        self.textures.push(path.to_string());
        self.textures.len() as TextureId
    }

    fn resize(&mut self, size: u32) {
        self.size = size;
    }

    fn place_marker(&mut self, slot: usize, marker: Option<Marker>) {
        if slot >= self.markers.len() {
            self.markers.resize(slot + 1, None);
        }
        self.markers[slot] = marker;
    }

    fn set_sweep(&mut self, beam_fraction: f64) {
        self.beam_fraction = beam_fraction;
    }

    fn set_readout(&mut self, text: &str, alpha: f64) {
        self.readout.clear();
        self.readout.push_str(text);
        self.readout_alpha = alpha;
    }

    fn present(&mut self) {
        self.frames += 1;
    }

    fn clear(&mut self) {
        self.markers.clear();
        self.readout.clear();
        self.readout_alpha = 0.0;
        self.beam_fraction = 0.0;
        self.clears += 1;
    }
}

/// Keeps every playback request.
#[derive(Clone, Debug, Default)]
pub struct RecordingAudio {
    pub played: Vec<(String, f64)>,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, path: &str) -> usize {
        self.played.iter().filter(|(p, _)| p == path).count()
    }
}

impl AudioSink for RecordingAudio {
    fn play(&mut self, path: &str, volume: f64) {
        self.played.push((path.to_string(), volume));
    }
}
