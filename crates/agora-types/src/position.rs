//! Positions on the world's movement plane.
//!
//! The world is rendered in 3D but agents only ever move across the X-Z
//! plane; the Y axis is a fixed height owned by the renderer and is ignored
//! (and silently dropped) when positions are deserialized.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Default half-width of the square world. Valid coordinates lie in
/// `[-WORLD_BOUND, WORLD_BOUND]` on both axes.
pub const WORLD_BOUND: f64 = 4.0;

/// A point on the X-Z movement plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Position {
    /// Create a position from raw coordinates.
    pub const fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    /// Clamp both axes independently into `[-bound, bound]`.
    ///
    /// Non-finite coordinates collapse to `0.0` so the result is always a
    /// usable point inside the world. A negative `bound` is taken by
    /// magnitude; a NaN `bound` collapses the world to the origin.
    #[must_use]
    pub fn clamped(self, bound: f64) -> Self {
        Self {
            x: clamp_axis(self.x, bound),
            z: clamp_axis(self.z, bound),
        }
    }

    /// Whether both axes already lie inside `[-bound, bound]`.
    pub fn within(&self, bound: f64) -> bool {
        self.x.is_finite()
            && self.z.is_finite()
            && self.x.abs() <= bound
            && self.z.abs() <= bound
    }

    /// Euclidean distance to another point on the plane.
    pub fn distance_to(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.z - other.z)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.z)
    }
}

fn clamp_axis(value: f64, bound: f64) -> f64 {
    let bound = if bound.is_nan() { 0.0 } else { bound.abs() };
    if value.is_finite() {
        value.clamp(-bound, bound)
    } else {
        0.0
    }
}
