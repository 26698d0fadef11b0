//! Sweep clock: a repeating phase in [0, 1) advanced by `speed * dt`.
//!
//! The beam position is a ramp confined to the middle third of each
//! revolution: parked at the centre for the first third, travelling outward
//! during the second, parked at the rim for the last.

use serde::{Deserialize, Serialize};

const THIRD: f64 = 1.0 / 3.0;

/// Beam position in [0, 1] for a phase (any real, wrapped first).
pub fn beam_fraction(phase: f64) -> f64 {
    let p = phase.rem_euclid(1.0);
    ((p - THIRD) * 3.0).clamp(0.0, 1.0)
}

/// Half-open phase band `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepWindow {
    pub start: f64,
    pub end: f64,
}

impl SweepWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, phase: f64) -> bool {
        phase >= self.start && phase < self.end
    }
}

impl From<[f64; 2]> for SweepWindow {
    fn from([start, end]: [f64; 2]) -> Self {
        Self::new(start, end)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SweepClock {
    phase: f64,
    speed: f64,
}

impl SweepClock {
    pub fn new(speed: f64) -> Self {
        Self { phase: 0.0, speed }
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    /// Advance by `dt` seconds and return the new phase.
    /// Negative or non-finite steps leave the phase untouched.
    pub fn advance(&mut self, dt: f64) -> f64 {
        let step = self.speed * dt;
        if !step.is_finite() || step <= 0.0 {
            return self.phase;
        }
        let next = (self.phase + step).rem_euclid(1.0);
        // rem_euclid can round up to exactly 1.0 for tiny negative residues
        self.phase = if next >= 1.0 { 0.0 } else { next };
        self.phase
    }

    pub fn beam_fraction(&self) -> f64 {
        beam_fraction(self.phase)
    }

    /// Simulated beam radius in world units.
    pub fn sweep_distance(&self, max_distance: f64) -> f64 {
        self.beam_fraction() * max_distance
    }
}
