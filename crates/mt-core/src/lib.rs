//! Motion tracker engine.
//!
//! A radar-style proximity readout for tokens on a gridded map: each tick
//! scans the tracked token's scene for nearby movers, advances a rotating
//! sweep and gates the wave/ping cues. A small broadcast protocol keeps
//! every participant's window in step with the tracker's owner.
//!
//! Zero I/O. Rendering, audio, transport and persistence sit behind the
//! traits in [`surface`], [`scene`] and [`clock`].

pub mod authority;
pub mod clock;
pub mod constants;
pub mod cue;
pub mod device;
pub mod geometry;
pub mod headless;
pub mod protocol;
pub mod scene;
pub mod session;
pub mod settings;
pub mod surface;
pub mod sweep;

pub use authority::{AuthorityLevel, Roster, UserId};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use cue::{Cooldown, CooldownState, Cue, CueFrame, CueGate, PingBand, Readout, format_distance};
pub use device::{TickReport, TrackTarget, TrackerDevice};
pub use geometry::{
    GridMetrics, ScanFilters, ScanResult, Signal, TokenId, TokenSample, Vec2, measure, scan,
    scan_with_capacity,
};
pub use headless::{HeadlessSurface, RecordingAudio};
pub use protocol::{MessageKind, Notify, TrackerMessage};
pub use scene::{MapProvider, Scene, SceneId, TokenRecord};
pub use session::{Effect, Session, TrackerClient, Visibility, WindowState};
pub use settings::{CueSounds, SettingsError, SoundSpec, TrackerSettings};
pub use surface::{AudioSink, Marker, RenderCache, RenderSurface, TextureId, TextureSet};
pub use sweep::{SweepClock, SweepWindow, beam_fraction};
