//! Cue gate: decides when the wave and ping sounds fire and what the distance
//! readout shows.
//!
//! Each cue is an edge-triggered latch (`Idle -> Locked -> Idle`). Firing
//! locks it until `now` passes the release time, so a gate that stays open
//! fires once per cooldown window.

use std::time::Duration;

use crate::constants::NO_TARGET_READOUT;
use crate::sweep::{SweepWindow, beam_fraction};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CooldownState {
    Idle,
    Locked { release_at: Duration },
}

#[derive(Clone, Debug)]
pub struct Cooldown {
    duration: Duration,
    state: CooldownState,
}

impl Cooldown {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            state: CooldownState::Idle,
        }
    }

    pub fn state(&self) -> CooldownState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.state, CooldownState::Locked { .. })
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    /// Release the lock if its timer has run out.
    pub fn poll(&mut self, now: Duration) {
        if let CooldownState::Locked { release_at } = self.state
            && now >= release_at
        {
            self.state = CooldownState::Idle;
        }
    }

    /// Fire if idle. Returns whether the cue fired.
    pub fn try_fire(&mut self, now: Duration) -> bool {
        self.poll(now);
        match self.state {
            CooldownState::Idle => {
                self.state = CooldownState::Locked {
                    release_at: now + self.duration,
                };
                true
            }
            CooldownState::Locked { .. } => false,
        }
    }

    /// Drop any pending lock immediately.
    pub fn release(&mut self) {
        self.state = CooldownState::Idle;
    }
}

/// Proximity bucket of the nearest contact, in thirds of the range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PingBand {
    Close,
    Medium,
    Far,
}

impl PingBand {
    pub fn from_distance(nearest: f64, max_distance: f64) -> Self {
        let third = max_distance / 3.0;
        if nearest < third {
            PingBand::Close
        } else if nearest < 2.0 * third {
            PingBand::Medium
        } else {
            PingBand::Far
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PingBand::Close => "close",
            PingBand::Medium => "medium",
            PingBand::Far => "far",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cue {
    Wave,
    Ping(PingBand),
}

impl Cue {
    pub fn name(self) -> &'static str {
        match self {
            Cue::Wave => "wave",
            Cue::Ping(band) => band.as_str(),
        }
    }
}

/// Distance readout for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Readout {
    pub text: String,
    pub alpha: f64,
    pub has_target: bool,
}

/// Everything the gate decided for one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct CueFrame {
    pub phase: f64,
    pub beam_fraction: f64,
    /// Beam radius in world units.
    pub sweep_distance: f64,
    /// Cues that fired this tick, wave first.
    pub cues: Vec<Cue>,
    pub readout: Readout,
}

/// Format a distance with the scene's unit label.
pub fn format_distance(distance: f64, unit: &str) -> String {
    if unit.is_empty() {
        format!("{distance:.1}")
    } else {
        format!("{distance:.1} {unit}")
    }
}

#[derive(Clone, Debug)]
pub struct CueGate {
    wave: Cooldown,
    ping: Cooldown,
    window: SweepWindow,
    last_message: String,
}

impl CueGate {
    pub fn new(wave_cooldown: Duration, ping_cooldown: Duration, window: SweepWindow) -> Self {
        Self {
            wave: Cooldown::new(wave_cooldown),
            ping: Cooldown::new(ping_cooldown),
            window,
            last_message: String::new(),
        }
    }

    pub fn configure(&mut self, wave_cooldown: Duration, ping_cooldown: Duration, window: SweepWindow) {
        self.wave.set_duration(wave_cooldown);
        self.ping.set_duration(ping_cooldown);
        self.window = window;
    }

    pub fn wave(&self) -> &Cooldown {
        &self.wave
    }

    pub fn ping(&self) -> &Cooldown {
        &self.ping
    }

    /// Readout text produced by the most recent evaluation.
    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    /// Drop both locks. Used at teardown so no release is left pending.
    pub fn release_all(&mut self) {
        self.wave.release();
        self.ping.release();
    }

    /// Evaluate one tick. Must run after the tick's scan so `nearest` is
    /// current.
    pub fn evaluate(
        &mut self,
        phase: f64,
        nearest: f64,
        max_distance: f64,
        unit: &str,
        muted: bool,
        now: Duration,
    ) -> CueFrame {
        let beam = beam_fraction(phase);
        let sweep_distance = beam * max_distance;
        let crossed = sweep_distance > nearest;

        self.wave.poll(now);
        self.ping.poll(now);
        if !crossed {
            // re-arm so the next crossing can fire
            self.ping.release();
        }

        let mut cues = Vec::new();
        if !muted {
            if self.window.contains(phase) && self.wave.try_fire(now) {
                cues.push(Cue::Wave);
            }
            if crossed && self.ping.try_fire(now) {
                cues.push(Cue::Ping(PingBand::from_distance(nearest, max_distance)));
            }
        }

        let readout = if crossed {
            Readout {
                text: format_distance(nearest, unit),
                alpha: beam,
                has_target: true,
            }
        } else {
            Readout {
                text: NO_TARGET_READOUT.to_string(),
                alpha: 1.0 - beam,
                has_target: false,
            }
        };
        self.last_message.clone_from(&readout.text);

        CueFrame {
            phase,
            beam_fraction: beam,
            sweep_distance,
            cues,
            readout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn gate() -> CueGate {
        CueGate::new(ms(200), ms(1200), SweepWindow::new(0.1, 0.2))
    }

    #[test]
    fn test_cooldown_locks_until_release_time() {
        let mut c = Cooldown::new(ms(100));
        assert!(c.try_fire(ms(0)));
        assert!(!c.try_fire(ms(50)));
        assert!(!c.try_fire(ms(99)));
        assert!(c.try_fire(ms(100)));
        assert_eq!(c.state(), CooldownState::Locked { release_at: ms(200) });
    }

    #[test]
    fn test_band_thirds() {
        assert_eq!(PingBand::from_distance(10.0, 90.0), PingBand::Close);
        assert_eq!(PingBand::from_distance(30.0, 90.0), PingBand::Medium);
        assert_eq!(PingBand::from_distance(59.0, 90.0), PingBand::Medium);
        assert_eq!(PingBand::from_distance(60.0, 90.0), PingBand::Far);
    }

    #[test]
    fn test_wave_fires_once_inside_window() {
        let mut g = gate();
        let f = g.evaluate(0.12, 80.0, 80.0, "ft", false, ms(0));
        assert_eq!(f.cues, vec![Cue::Wave]);
        let f = g.evaluate(0.15, 80.0, 80.0, "ft", false, ms(50));
        assert!(f.cues.is_empty());
        let f = g.evaluate(0.5, 80.0, 80.0, "ft", false, ms(300));
        assert!(f.cues.is_empty());
        assert!(!g.wave().is_locked());
    }

    #[test]
    fn test_ping_debounce_under_sustained_crossing() {
        let mut g = gate();
        // beam parked at the rim, contact at 25 -> gate open every tick
        let fired: usize = (0..60)
            .map(|i| g.evaluate(0.8, 25.0, 80.0, "ft", false, ms(i * 16)).cues.len())
            .sum();
        assert_eq!(fired, 1);

        // cooldown elapsed, gate still open -> fires again
        let f = g.evaluate(0.8, 25.0, 80.0, "ft", false, ms(1200));
        assert_eq!(f.cues, vec![Cue::Ping(PingBand::Close)]);
    }

    #[test]
    fn test_ping_rearms_when_beam_falls_behind() {
        let mut g = gate();
        assert_eq!(g.evaluate(0.9, 25.0, 80.0, "ft", false, ms(0)).cues.len(), 1);
        assert!(g.ping().is_locked());

        // beam back at the centre: lock cleared at once
        g.evaluate(0.0, 25.0, 80.0, "ft", false, ms(10));
        assert!(!g.ping().is_locked());
        let f = g.evaluate(0.9, 25.0, 80.0, "ft", false, ms(20));
        assert_eq!(f.cues, vec![Cue::Ping(PingBand::Close)]);
    }

    #[test]
    fn test_muted_still_updates_readout() {
        let mut g = gate();
        let f = g.evaluate(0.9, 25.0, 80.0, "ft", true, ms(0));
        assert!(f.cues.is_empty());
        assert_eq!(f.readout.text, "25.0 ft");
        assert!(f.readout.has_target);
        assert!(!g.ping().is_locked());
    }

    #[test]
    fn test_readout_alpha_follows_beam() {
        let mut g = gate();
        let f = g.evaluate(0.5, 60.0, 80.0, "m", false, ms(0));
        // beam at 40 < 60: not reached yet
        assert_eq!(f.readout.text, NO_TARGET_READOUT);
        assert!((f.readout.alpha - 0.5).abs() < 1e-9);

        let f = g.evaluate(0.9, 60.0, 80.0, "m", false, ms(16));
        assert_eq!(f.readout.text, "60.0 m");
        assert_eq!(f.readout.alpha, 1.0);
        assert_eq!(g.last_message(), "60.0 m");
    }

    #[test]
    fn test_no_contact_never_pings() {
        let mut g = gate();
        for i in 0..100 {
            let phase = i as f64 / 100.0;
            let f = g.evaluate(phase, 80.0, 80.0, "ft", false, ms(i * 10));
            assert!(!f.cues.iter().any(|c| matches!(c, Cue::Ping(_))));
        }
    }

    #[test]
    fn test_release_all() {
        let mut g = gate();
        g.evaluate(0.15, 10.0, 80.0, "ft", false, ms(0));
        g.evaluate(0.9, 10.0, 80.0, "ft", false, ms(1));
        assert!(g.wave().is_locked());
        assert!(g.ping().is_locked());
        g.release_all();
        assert!(!g.wave().is_locked());
        assert!(!g.ping().is_locked());
    }
}
