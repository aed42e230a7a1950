//! Ground-plane coordinates and range bands.
//!
//! The simulation is 3-D but units only ever navigate the ground plane, so
//! every position handled here is an `(x, z)` pair in world units.

/// A position on the ground plane.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f32,
    pub z: f32,
}

impl Point {
    #[inline]
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    /// Euclidean distance in world units.
    #[inline]
    pub fn distance(self, other: Point) -> f32 {
        self.distance_sq(other).sqrt()
    }

    /// Squared distance, cheaper than [`distance`](Self::distance) for
    /// comparisons against a squared radius.
    #[inline]
    pub fn distance_sq(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dz = other.z - self.z;
        dx * dx + dz * dz
    }

    /// Move at most `step` units from `self` toward `target`.
    ///
    /// Returns `target` exactly once the remaining distance is within `step`,
    /// so callers can detect arrival with `==`.
    pub fn step_toward(self, target: Point, step: f32) -> Point {
        let d = self.distance(target);
        if d <= step || d == 0.0 {
            return target;
        }
        let t = step / d;
        Point {
            x: self.x + (target.x - self.x) * t,
            z: self.z + (target.z - self.z) * t,
        }
    }

    #[inline]
    pub fn offset(self, by: Point) -> Point {
        Point { x: self.x + by.x, z: self.z + by.z }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.z)
    }
}

/// An annulus of acceptable distances to a target, e.g. a ranged attack that
/// must stay at least `min` away but within `max`.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeBand {
    pub min: f32,
    pub max: f32,
}

impl RangeBand {
    #[inline]
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Melee-style band: anything up to `max`.
    #[inline]
    pub fn within(max: f32) -> Self {
        Self { min: 0.0, max }
    }

    #[inline]
    pub fn contains(self, distance: f32) -> bool {
        distance >= self.min && distance <= self.max
    }
}
