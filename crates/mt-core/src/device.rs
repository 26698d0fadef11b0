//! Device façade: one scan + sweep + cue pipeline per open tracker window.
//!
//! Holds no algorithm of its own. Each tick runs, in order: sweep advance,
//! scan, cue evaluation, then the audio and drawing side effects.

use std::sync::Arc;
use std::time::Duration;

use crate::constants::{MAX_SIZE, MIN_GLOBAL_SCALE, RADAR_FILL};
use crate::cue::{CueFrame, CueGate};
use crate::geometry::{ScanFilters, ScanResult, TokenId, scan_with_capacity};
use crate::scene::{MapProvider, SceneId};
use crate::settings::TrackerSettings;
use crate::surface::{AudioSink, Marker, RenderCache, RenderSurface, TextureSet};
use crate::sweep::SweepClock;

/// What the device is centred on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackTarget {
    pub scene_id: SceneId,
    pub token_id: Option<TokenId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    pub scan: ScanResult,
    pub frame: CueFrame,
}

pub struct TrackerDevice {
    settings: TrackerSettings,
    filters: ScanFilters,
    sweep: SweepClock,
    cues: CueGate,
    cache: Arc<RenderCache>,
    textures: Option<TextureSet>,
    target: Option<TrackTarget>,
    running: bool,
}

impl TrackerDevice {
    pub fn new(settings: TrackerSettings, cache: Arc<RenderCache>) -> Self {
        let cues = CueGate::new(
            settings.wave_cooldown(),
            settings.ping_cooldown(),
            settings.sweep_window(),
        );
        Self {
            filters: settings.scan_filters(),
            sweep: SweepClock::new(settings.speed),
            cues,
            cache,
            textures: None,
            target: None,
            running: false,
            settings,
        }
    }

    /// Bind to a surface and start accepting ticks.
    pub fn initialize(&mut self, surface: &mut dyn RenderSurface) {
        self.textures = Some(self.cache.textures(surface));
        surface.resize(self.settings.size);
        for slot in 0..self.settings.signal_capacity {
            surface.place_marker(slot, None);
        }
        self.running = true;
    }

    pub fn set_target(&mut self, scene_id: &str, token_id: Option<&str>) {
        self.target = Some(TrackTarget {
            scene_id: scene_id.to_string(),
            token_id: token_id.map(str::to_string),
        });
    }

    pub fn target(&self) -> Option<&TrackTarget> {
        self.target.as_ref()
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn textures(&self) -> Option<TextureSet> {
        self.textures
    }

    /// Apply new settings in place. A size change needs a full rebuild, which
    /// the owning client handles.
    pub fn update_settings(&mut self, settings: TrackerSettings) {
        self.filters = settings.scan_filters();
        self.sweep.set_speed(settings.speed);
        self.cues.configure(
            settings.wave_cooldown(),
            settings.ping_cooldown(),
            settings.sweep_window(),
        );
        self.settings = settings;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn phase(&self) -> f64 {
        self.sweep.phase()
    }

    pub fn cues(&self) -> &CueGate {
        &self.cues
    }

    /// Stop ticking and drop pending cooldowns.
    pub fn stop(&mut self) {
        self.running = false;
        self.cues.release_all();
    }

    pub fn global_scale(&self) -> f64 {
        (f64::from(self.settings.size) / MAX_SIZE).clamp(MIN_GLOBAL_SCALE, 1.0)
    }

    /// Surface px per world unit.
    pub fn px_per_unit(&self) -> f64 {
        RADAR_FILL * self.global_scale() * MAX_SIZE * 0.5 / self.settings.max_distance
    }

    /// Scan around the current target. Missing target, scene or reference
    /// token all give the empty result.
    pub fn snapshot(&self, map: &dyn MapProvider) -> (ScanResult, String) {
        let max = self.settings.max_distance;
        let fallback = self.settings.unit_fallback.clone();

        let Some(target) = &self.target else {
            return (ScanResult::empty(max), fallback);
        };
        let Some(scene) = map.scene(&target.scene_id) else {
            tracing::debug!("scene {} not found", target.scene_id);
            return (ScanResult::empty(max), fallback);
        };
        let unit = if scene.grid.unit_label.is_empty() {
            fallback
        } else {
            scene.grid.unit_label.clone()
        };
        let Some(reference) = target.token_id.as_deref().and_then(|id| scene.token(id)) else {
            return (ScanResult::empty(max), unit);
        };

        let reference = reference.sample(&scene.grid);
        let candidates = scene.samples();
        let result = scan_with_capacity(
            &reference,
            &candidates,
            &scene.grid,
            max,
            &self.filters,
            self.settings.signal_capacity,
        );
        (result, unit)
    }

    /// One frame. Returns `None` once stopped.
    pub fn tick(
        &mut self,
        dt: f64,
        now: Duration,
        map: &dyn MapProvider,
        audio: &mut dyn AudioSink,
        surface: &mut dyn RenderSurface,
    ) -> Option<TickReport> {
        if !self.running {
            return None;
        }

        let phase = self.sweep.advance(dt);
        let (scan, unit) = self.snapshot(map);
        let frame = self.cues.evaluate(
            phase,
            scan.nearest_distance,
            self.settings.max_distance,
            &unit,
            self.settings.muted,
            now,
        );

        for &cue in &frame.cues {
            let sound = self.settings.sounds.for_cue(cue);
            tracing::debug!("cue {} -> {}", cue.name(), sound.path);
            audio.play(&sound.path, self.settings.volume_for(cue));
        }
        self.draw(surface, &scan, &frame);

        Some(TickReport { scan, frame })
    }

    fn draw(&self, surface: &mut dyn RenderSurface, scan: &ScanResult, frame: &CueFrame) {
        let scale = self.global_scale();
        let ppu = self.px_per_unit();
        for slot in 0..self.settings.signal_capacity {
            let marker = scan.signals.get(slot).map(|s| Marker {
                x: s.bearing.x * s.distance * ppu,
                y: s.bearing.y * s.distance * ppu,
                scale,
                opacity: 1.0,
            });
            surface.place_marker(slot, marker);
        }
        surface.set_sweep(frame.beam_fraction);
        surface.set_readout(&frame.readout.text, frame.readout.alpha);
        surface.present();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::{Cue, PingBand};
    use crate::geometry::GridMetrics;
    use crate::headless::{HeadlessSurface, RecordingAudio};
    use crate::scene::{Scene, TokenRecord};

    fn scene() -> Scene {
        // centres at (50,50) and (350,450): 3-4-5 cells apart
        Scene {
            id: "deck".into(),
            name: "Deck".into(),
            grid: GridMetrics::new(100.0, 5.0, "ft"),
            tokens: vec![
                TokenRecord::new("marine", 0.0, 0.0),
                TokenRecord::new("xeno", 300.0, 400.0),
            ],
        }
    }

    fn device() -> (TrackerDevice, HeadlessSurface) {
        let mut dev = TrackerDevice::new(TrackerSettings::default(), Arc::new(RenderCache::new()));
        let mut surface = HeadlessSurface::new();
        dev.initialize(&mut surface);
        dev.set_target("deck", Some("marine"));
        (dev, surface)
    }

    #[test]
    fn test_tick_places_marker_and_reads_out() {
        let (mut dev, mut surface) = device();
        let mut audio = RecordingAudio::new();
        let map = scene();

        // jump the beam to the rim
        let report = dev
            .tick(0.8, Duration::ZERO, &map, &mut audio, &mut surface)
            .unwrap();
        assert_eq!(report.scan.signals.len(), 1);
        assert_eq!(report.frame.cues, vec![Cue::Ping(PingBand::Close)]);
        assert_eq!(surface.readout, "25.0 ft");
        assert_eq!(surface.visible_markers().count(), 1);

        let m = surface.markers[0].unwrap();
        let ppu = dev.px_per_unit();
        assert!((m.x - 0.6 * 25.0 * ppu).abs() < 1e-9);
        assert!((m.y - 0.8 * 25.0 * ppu).abs() < 1e-9);
        assert_eq!(audio.played, vec![("sounds/close.ogg".to_string(), 0.5)]);
    }

    #[test]
    fn test_missing_reference_dims_display() {
        let (mut dev, mut surface) = device();
        dev.set_target("deck", Some("nobody"));
        let mut audio = RecordingAudio::new();

        let report = dev
            .tick(0.8, Duration::ZERO, &scene(), &mut audio, &mut surface)
            .unwrap();
        assert!(report.scan.signals.is_empty());
        assert_eq!(report.scan.nearest_distance, 80.0);
        assert!(!report.frame.readout.has_target);
        assert_eq!(surface.readout_alpha, 0.0);
        assert!(audio.played.is_empty());
    }

    #[test]
    fn test_missing_scene_does_not_panic() {
        let (mut dev, mut surface) = device();
        dev.set_target("nowhere", None);
        let mut audio = RecordingAudio::new();
        let report = dev.tick(0.016, Duration::ZERO, &scene(), &mut audio, &mut surface);
        assert!(report.is_some());
    }

    #[test]
    fn test_stopped_device_ignores_ticks() {
        let (mut dev, mut surface) = device();
        let mut audio = RecordingAudio::new();
        dev.tick(0.8, Duration::ZERO, &scene(), &mut audio, &mut surface);
        assert!(dev.cues().ping().is_locked());

        dev.stop();
        assert!(!dev.cues().ping().is_locked());
        let frames = surface.frames;
        assert!(dev.tick(0.1, Duration::ZERO, &scene(), &mut audio, &mut surface).is_none());
        assert_eq!(surface.frames, frames);
    }

    #[test]
    fn test_muted_plays_nothing() {
        let (mut dev, mut surface) = device();
        dev.update_settings(TrackerSettings {
            muted: true,
            ..Default::default()
        });
        let mut audio = RecordingAudio::new();
        for _ in 0..120 {
            dev.tick(1.0 / 60.0, Duration::ZERO, &scene(), &mut audio, &mut surface);
        }
        assert!(audio.played.is_empty());
        assert_eq!(surface.frames, 120);
    }

    #[test]
    fn test_unused_slots_hidden() {
        let (mut dev, mut surface) = device();
        let mut audio = RecordingAudio::new();
        dev.tick(0.5, Duration::ZERO, &scene(), &mut audio, &mut surface);
        assert_eq!(surface.markers.len(), 20);
        assert!(surface.markers[1..].iter().all(Option::is_none));
    }

    #[test]
    fn test_textures_loaded_once_per_cache() {
        let cache = Arc::new(RenderCache::new());
        let mut surface = HeadlessSurface::new();
        for _ in 0..3 {
            let mut dev = TrackerDevice::new(TrackerSettings::default(), Arc::clone(&cache));
            dev.initialize(&mut surface);
            assert!(dev.textures().is_some());
        }
        assert_eq!(cache.load_count(), 1);
        assert_eq!(surface.textures.len(), 3);
    }

    #[test]
    fn test_scale_clamps() {
        let small = TrackerDevice::new(
            TrackerSettings {
                size: 10,
                ..Default::default()
            },
            Arc::new(RenderCache::new()),
        );
        assert_eq!(small.global_scale(), MIN_GLOBAL_SCALE);
        let full = TrackerDevice::new(
            TrackerSettings {
                size: 512,
                ..Default::default()
            },
            Arc::new(RenderCache::new()),
        );
        assert_eq!(full.global_scale(), 1.0);
    }
}
