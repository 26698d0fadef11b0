//! Rendering and audio seams, plus the process-wide texture cache.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::constants::{BACKGROUND_TEXTURE, PING_ALPHA_TEXTURE, PING_COLOR_TEXTURE};

pub type TextureId = u32;

/// One visible signal marker. Offsets are px from the surface centre, y down.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Marker {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub opacity: f64,
}

/// Drawing surface handed over by the window host.
pub trait RenderSurface {
    fn load_texture(&mut self, path: &str) -> TextureId;
    fn resize(&mut self, size: u32);
    /// Show a marker in `slot`, or hide the slot with `None`.
    fn place_marker(&mut self, slot: usize, marker: Option<Marker>);
    fn set_sweep(&mut self, beam_fraction: f64);
    fn set_readout(&mut self, text: &str, alpha: f64);
    fn present(&mut self);
    /// Drop everything drawn so far.
    fn clear(&mut self);
}

/// Fire-and-forget sound playback.
pub trait AudioSink {
    fn play(&mut self, path: &str, volume: f64);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureSet {
    pub background: TextureId,
    pub ping_color: TextureId,
    pub ping_alpha: TextureId,
}

/// Textures shared by every device built in this process. Loaded on first
/// use, then reused across device re-initialisations.
#[derive(Debug, Default)]
pub struct RenderCache {
    textures: OnceLock<TextureSet>,
    loads: AtomicUsize,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn textures(&self, surface: &mut dyn RenderSurface) -> TextureSet {
        *self.textures.get_or_init(|| {
            self.loads.fetch_add(1, Ordering::Relaxed);
            TextureSet {
                background: surface.load_texture(BACKGROUND_TEXTURE),
                ping_color: surface.load_texture(PING_COLOR_TEXTURE),
                ping_alpha: surface.load_texture(PING_ALPHA_TEXTURE),
            }
        })
    }

    /// How many times the texture set was built (0 or 1).
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}
