/// Edge length of a full-size radar surface, in px.
pub const MAX_SIZE: f64 = 512.0;

/// Edge length of a full-size signal marker, in px.
pub const MAX_PING_SIZE: f64 = 64.0;

/// Default number of marker slots (and therefore signals kept per scan).
pub const SIGNAL_CAPACITY: usize = 20;

/// Offsets below this many grid cells on both axes count as overlapping.
pub const DEGENERATE_OFFSET: f64 = 0.01;

/// Smallest scale the surface artwork is drawn at.
pub const MIN_GLOBAL_SCALE: f64 = 0.05;

/// Fraction of the surface radius covered by `maxDistance`.
pub const RADAR_FILL: f64 = 0.8;

/// Default wave cooldown in milliseconds.
pub const WAVE_COOLDOWN_MS: u64 = 200;

/// Default ping cooldown in milliseconds.
pub const PING_COOLDOWN_MS: u64 = 1200;

/// Default phase band in which the wave cue may fire.
pub const SWEEP_WINDOW: [f64; 2] = [0.1, 0.2];

/// Readout shown while the beam has not reached any contact.
pub const NO_TARGET_READOUT: &str = "--";

/// Statuses that keep a token off the radar by default.
pub const DEFAULT_IMMOBILE_STATUSES: [&str; 5] =
    ["dead", "unconscious", "asleep", "stunned", "paralysis"];

pub const BACKGROUND_TEXTURE: &str = "textures/motion_tracker_background.webp";
pub const PING_COLOR_TEXTURE: &str = "textures/motion_tracker_ping_color.webp";
pub const PING_ALPHA_TEXTURE: &str = "textures/motion_tracker_ping_alpha.webp";
