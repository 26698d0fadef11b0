//! Scan geometry: turns token positions into polar (distance, bearing) signals.
//!
//! Stateless. Every call builds a fresh [`ScanResult`] from its inputs, so the
//! device can rescan on every frame without carrying anything over.

use std::collections::HashSet;
use std::ops::{Div, Sub};

use serde::{Deserialize, Serialize};

use crate::constants::{DEGENERATE_OFFSET, SIGNAL_CAPACITY};

pub type TokenId = String;

/// 2D vector in map pixel space (y grows downward).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Bearing reported for a contact sitting exactly on the reference.
    pub const NORTH: Self = Self { x: 0.0, y: -1.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn scale(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Div<f64> for Vec2 {
    type Output = Self;

    fn div(self, rhs: f64) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

/// Per-scene grid description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridMetrics {
    pub cell_size_px: f64,
    pub distance_per_cell: f64,
    #[serde(default)]
    pub unit_label: String,
}

impl GridMetrics {
    pub fn new(cell_size_px: f64, distance_per_cell: f64, unit_label: &str) -> Self {
        Self {
            cell_size_px,
            distance_per_cell,
            unit_label: unit_label.to_string(),
        }
    }

    /// Both scale factors must be finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.cell_size_px.is_finite()
            && self.cell_size_px > 0.0
            && self.distance_per_cell.is_finite()
            && self.distance_per_cell > 0.0
    }
}

/// A token as seen by one scan. Built fresh from the map provider each frame.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenSample {
    pub id: TokenId,
    pub center: Vec2,
    /// Active status-effect ids on the token's actor.
    pub statuses: Vec<String>,
    pub player_controlled: bool,
    pub hidden: bool,
}

impl TokenSample {
    pub fn new(id: &str, x: f64, y: f64) -> Self {
        Self {
            id: id.to_string(),
            center: Vec2::new(x, y),
            statuses: Vec::new(),
            player_controlled: false,
            hidden: false,
        }
    }
}

/// One detected contact relative to the reference token.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Signal {
    /// World units (grid distance), never pixels.
    pub distance: f64,
    /// Unit vector from the reference toward the contact.
    pub bearing: Vec2,
}

#[derive(Clone, Debug, Default)]
pub struct ScanFilters {
    pub show_player_tokens: bool,
    pub immobile_statuses: HashSet<String>,
    pub invert_immobile: bool,
}

impl ScanFilters {
    /// True when the token's statuses intersect the immobile set, flipped by
    /// `invert_immobile`.
    pub fn is_immobile(&self, token: &TokenSample) -> bool {
        let hit = token
            .statuses
            .iter()
            .any(|s| self.immobile_statuses.contains(s));
        hit != self.invert_immobile
    }

    pub fn is_visible(&self, token: &TokenSample) -> bool {
        self.show_player_tokens || !token.player_controlled
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScanResult {
    /// In-range signals in candidate order, truncated at capacity.
    pub signals: Vec<Signal>,
    /// Closest surviving candidate, clamped to `max_distance`.
    pub nearest_distance: f64,
}

impl ScanResult {
    /// The missing-context result: no signals, nearest pinned at the range.
    pub fn empty(max_distance: f64) -> Self {
        Self {
            signals: Vec::new(),
            nearest_distance: max_distance,
        }
    }
}

/// Scan with the default slot capacity.
pub fn scan(
    reference: &TokenSample,
    candidates: &[TokenSample],
    metrics: &GridMetrics,
    max_distance: f64,
    filters: &ScanFilters,
) -> ScanResult {
    scan_with_capacity(
        reference,
        candidates,
        metrics,
        max_distance,
        filters,
        SIGNAL_CAPACITY,
    )
}

/// Filter candidates and convert survivors to signals.
///
/// `nearest_distance` considers every surviving candidate, including those
/// beyond `max_distance`, but starts at `max_distance` so it never exceeds it.
/// Signals past `capacity` are dropped without notice.
pub fn scan_with_capacity(
    reference: &TokenSample,
    candidates: &[TokenSample],
    metrics: &GridMetrics,
    max_distance: f64,
    filters: &ScanFilters,
    capacity: usize,
) -> ScanResult {
    let mut result = ScanResult::empty(max_distance);
    if !metrics.is_valid() {
        return result;
    }

    for candidate in candidates {
        if candidate.id == reference.id || candidate.hidden {
            continue;
        }
        if filters.is_immobile(candidate) || !filters.is_visible(candidate) {
            continue;
        }

        let signal = measure(reference.center, candidate.center, metrics);
        result.nearest_distance = result.nearest_distance.min(signal.distance);

        if signal.distance < max_distance && result.signals.len() < capacity {
            result.signals.push(signal);
        }
    }

    result
}

/// Polar offset from `from` to `to` in world units.
pub fn measure(from: Vec2, to: Vec2, metrics: &GridMetrics) -> Signal {
    let d = (to - from) / metrics.cell_size_px;
    let norm = d.length();

    let degenerate = d.x.abs() < DEGENERATE_OFFSET && d.y.abs() < DEGENERATE_OFFSET;
    let magnitude = if degenerate { DEGENERATE_OFFSET } else { norm };
    let bearing = if norm > f64::EPSILON {
        d / norm
    } else {
        Vec2::NORTH
    };

    Signal {
        distance: metrics.distance_per_cell * magnitude,
        bearing,
    }
}
