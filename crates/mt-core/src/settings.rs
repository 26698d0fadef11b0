//! Tracker settings model. Values come from the configuration store; the core
//! only reads them.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_IMMOBILE_STATUSES, MAX_SIZE, PING_COOLDOWN_MS, SIGNAL_CAPACITY, SWEEP_WINDOW,
    WAVE_COOLDOWN_MS,
};
use crate::cue::{Cue, PingBand};
use crate::geometry::ScanFilters;
use crate::sweep::SweepWindow;

pub const MIN_SIZE: u32 = 50;
pub const MIN_MAX_DISTANCE: f64 = 5.0;
pub const MAX_MAX_DISTANCE: f64 = 100.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoundSpec {
    pub path: String,
    pub volume: f64,
}

impl SoundSpec {
    pub fn new(path: &str, volume: f64) -> Self {
        Self {
            path: path.to_string(),
            volume,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueSounds {
    pub wave: SoundSpec,
    pub close: SoundSpec,
    pub medium: SoundSpec,
    pub far: SoundSpec,
}

impl Default for CueSounds {
    fn default() -> Self {
        Self {
            wave: SoundSpec::new("sounds/wave.ogg", 0.5),
            close: SoundSpec::new("sounds/close.ogg", 1.0),
            medium: SoundSpec::new("sounds/medium.ogg", 0.8),
            far: SoundSpec::new("sounds/far.ogg", 0.6),
        }
    }
}

impl CueSounds {
    pub fn for_cue(&self, cue: Cue) -> &SoundSpec {
        match cue {
            Cue::Wave => &self.wave,
            Cue::Ping(PingBand::Close) => &self.close,
            Cue::Ping(PingBand::Medium) => &self.medium,
            Cue::Ping(PingBand::Far) => &self.far,
        }
    }

    fn iter(&self) -> impl Iterator<Item = (&'static str, &SoundSpec)> {
        [
            ("wave", &self.wave),
            ("close", &self.close),
            ("medium", &self.medium),
            ("far", &self.far),
        ]
        .into_iter()
    }
}

/// All recognized tracker settings, keyed in camelCase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerSettings {
    pub enabled: bool,
    /// Only privileged users may open a tracker of their own.
    pub gm_only: bool,
    /// Radar range in world units.
    pub max_distance: f64,
    /// Surface edge length in px.
    pub size: u32,
    pub see_players: bool,
    /// Sweep revolutions per second.
    pub speed: f64,
    pub status_filters: Vec<String>,
    pub invert_status_filters: bool,
    pub muted: bool,
    pub volume: f64,
    pub sounds: CueSounds,
    pub wave_cooldown_ms: u64,
    pub ping_cooldown_ms: u64,
    pub sweep_window: [f64; 2],
    pub signal_capacity: usize,
    /// Unit label used when the scene has none.
    pub unit_fallback: String,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            gm_only: true,
            max_distance: 80.0,
            size: 200,
            see_players: true,
            speed: 1.0,
            status_filters: DEFAULT_IMMOBILE_STATUSES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            invert_status_filters: false,
            muted: false,
            volume: 0.5,
            sounds: CueSounds::default(),
            wave_cooldown_ms: WAVE_COOLDOWN_MS,
            ping_cooldown_ms: PING_COOLDOWN_MS,
            sweep_window: SWEEP_WINDOW,
            signal_capacity: SIGNAL_CAPACITY,
            unit_fallback: String::new(),
        }
    }
}

impl TrackerSettings {
    /// Keys accepted by the configuration store.
    pub const KEYS: &'static [&'static str] = &[
        "enabled",
        "gmOnly",
        "maxDistance",
        "size",
        "seePlayers",
        "speed",
        "statusFilters",
        "invertStatusFilters",
        "muted",
        "volume",
        "sounds",
        "waveCooldownMs",
        "pingCooldownMs",
        "sweepWindow",
        "signalCapacity",
        "unitFallback",
    ];

    pub fn is_known_key(key: &str) -> bool {
        Self::KEYS.contains(&key)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(MIN_MAX_DISTANCE..=MAX_MAX_DISTANCE).contains(&self.max_distance) {
            return Err(SettingsError::OutOfRange {
                key: "maxDistance",
                value: self.max_distance,
            });
        }
        if !(MIN_SIZE..=MAX_SIZE as u32).contains(&self.size) {
            return Err(SettingsError::OutOfRange {
                key: "size",
                value: f64::from(self.size),
            });
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(SettingsError::OutOfRange {
                key: "speed",
                value: self.speed,
            });
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(SettingsError::OutOfRange {
                key: "volume",
                value: self.volume,
            });
        }
        if self.signal_capacity == 0 {
            return Err(SettingsError::OutOfRange {
                key: "signalCapacity",
                value: 0.0,
            });
        }
        let [start, end] = self.sweep_window;
        if !(0.0 <= start && start < end && end <= 1.0) {
            return Err(SettingsError::InvalidWindow { start, end });
        }
        for (cue, sound) in self.sounds.iter() {
            if sound.path.trim().is_empty() {
                return Err(SettingsError::MalformedSoundPath {
                    cue,
                    path: sound.path.clone(),
                });
            }
            if !(0.0..=1.0).contains(&sound.volume) {
                return Err(SettingsError::OutOfRange {
                    key: "sounds",
                    value: sound.volume,
                });
            }
        }
        Ok(())
    }

    pub fn scan_filters(&self) -> ScanFilters {
        ScanFilters {
            show_player_tokens: self.see_players,
            immobile_statuses: self.status_filters.iter().cloned().collect::<HashSet<_>>(),
            invert_immobile: self.invert_status_filters,
        }
    }

    pub fn sweep_window(&self) -> SweepWindow {
        SweepWindow::from(self.sweep_window)
    }

    pub fn wave_cooldown(&self) -> Duration {
        Duration::from_millis(self.wave_cooldown_ms)
    }

    pub fn ping_cooldown(&self) -> Duration {
        Duration::from_millis(self.ping_cooldown_ms)
    }

    /// Effective playback volume for a cue.
    pub fn volume_for(&self, cue: Cue) -> f64 {
        self.sounds.for_cue(cue).volume * self.volume
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsError {
    OutOfRange { key: &'static str, value: f64 },
    InvalidWindow { start: f64, end: f64 },
    MalformedSoundPath { cue: &'static str, path: String },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::OutOfRange { key, value } => {
                write!(f, "setting '{key}' out of range: {value}")
            }
            SettingsError::InvalidWindow { start, end } => {
                write!(f, "sweep window [{start}, {end}) must lie inside [0, 1]")
            }
            SettingsError::MalformedSoundPath { cue, path } => {
                write!(f, "malformed sound path for '{cue}': {path:?}")
            }
        }
    }
}

impl std::error::Error for SettingsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert_eq!(TrackerSettings::default().validate(), Ok(()));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let s: TrackerSettings =
            serde_json::from_str(r#"{"maxDistance": 40, "seePlayers": false}"#).unwrap();
        assert_eq!(s.max_distance, 40.0);
        assert!(!s.see_players);
        assert_eq!(s.size, 200);
        assert_eq!(s.ping_cooldown_ms, 1200);
    }

    #[test]
    fn test_keys_match_serialized_fields() {
        let value = serde_json::to_value(TrackerSettings::default()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), TrackerSettings::KEYS.len());
        for key in TrackerSettings::KEYS {
            assert!(obj.contains_key(*key), "missing key {key}");
        }
    }

    #[test]
    fn test_rejects_out_of_range() {
        let s = TrackerSettings {
            max_distance: 500.0,
            ..Default::default()
        };
        assert!(matches!(
            s.validate(),
            Err(SettingsError::OutOfRange { key: "maxDistance", .. })
        ));

        let s = TrackerSettings {
            size: 20,
            ..Default::default()
        };
        assert!(s.validate().is_err());

        let s = TrackerSettings {
            sweep_window: [0.3, 0.2],
            ..Default::default()
        };
        assert!(matches!(s.validate(), Err(SettingsError::InvalidWindow { .. })));
    }

    #[test]
    fn test_rejects_empty_sound_path() {
        let mut s = TrackerSettings::default();
        s.sounds.far.path = " ".into();
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("far"));
    }

    #[test]
    fn test_filters_follow_settings() {
        let s = TrackerSettings {
            see_players: false,
            invert_status_filters: true,
            ..Default::default()
        };
        let f = s.scan_filters();
        assert!(!f.show_player_tokens);
        assert!(f.invert_immobile);
        assert!(f.immobile_statuses.contains("unconscious"));
    }

    #[test]
    fn test_cue_volume_scales_by_master() {
        let s = TrackerSettings::default();
        assert!((s.volume_for(Cue::Ping(PingBand::Close)) - 0.5).abs() < 1e-12);
        assert!((s.volume_for(Cue::Wave) - 0.25).abs() < 1e-12);
    }
}
