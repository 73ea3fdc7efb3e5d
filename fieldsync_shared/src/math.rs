//! Math types.
//!
//! 2D only. `Matrix` is an affine transform stored as six coefficients:
//!
//! ```text
//! | m0 m2 m4 |
//! | m1 m3 m5 |
//! ```
//!
//! `m4`/`m5` carry the translation, so a player "at (x, y)" is `Matrix::at(Vec2::new(x, y))`.

use serde::{Deserialize, Serialize};

/// 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }

    pub fn scaled(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s)
    }

    pub fn len(self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// 2D affine transform. Serialized as a bare array of its six coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Matrix(pub [f64; 6]);

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Self = Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    /// Identity moved to `point`.
    pub fn at(point: Vec2) -> Self {
        Self::IDENTITY.moved(point)
    }

    /// Translates by `delta`.
    pub fn moved(self, delta: Vec2) -> Self {
        let mut m = self.0;
        m[4] += delta.x;
        m[5] += delta.y;
        Self(m)
    }

    /// Scales by `scale` per axis around `around`.
    pub fn scaled_xy(self, around: Vec2, scale: Vec2) -> Self {
        let mut m = self.moved(around.scaled(-1.0)).0;
        m[0] *= scale.x;
        m[2] *= scale.x;
        m[4] *= scale.x;
        m[1] *= scale.y;
        m[3] *= scale.y;
        m[5] *= scale.y;
        Self(m).moved(around)
    }

    /// Uniform scale around `around`.
    pub fn scaled(self, around: Vec2, s: f64) -> Self {
        self.scaled_xy(around, Vec2::new(s, s))
    }

    /// Rotates by `angle` radians around `around`.
    pub fn rotated(self, around: Vec2, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        self.moved(around.scaled(-1.0))
            .chained(Self([cos, sin, -sin, cos, 0.0, 0.0]))
            .moved(around)
    }

    /// Applies `self` first, then `next`.
    pub fn chained(self, next: Self) -> Self {
        let m = self.0;
        let n = next.0;
        Self([
            n[0] * m[0] + n[2] * m[1],
            n[1] * m[0] + n[3] * m[1],
            n[0] * m[2] + n[2] * m[3],
            n[1] * m[2] + n[3] * m[3],
            n[0] * m[4] + n[2] * m[5] + n[4],
            n[1] * m[4] + n[3] * m[5] + n[5],
        ])
    }

    /// Transforms a point.
    pub fn project(self, p: Vec2) -> Vec2 {
        let m = self.0;
        Vec2::new(m[0] * p.x + m[2] * p.y + m[4], m[1] * p.x + m[3] * p.y + m[5])
    }

    /// Where the origin lands, i.e. the placement position.
    pub fn position(self) -> Vec2 {
        self.project(Vec2::ZERO)
    }

    pub fn is_finite(self) -> bool {
        self.0.iter().all(|c| c.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec2, b: Vec2) -> bool {
        a.sub(b).len() < 1e-9
    }

    #[test]
    fn at_sets_translation() {
        let m = Matrix::at(Vec2::new(250.0, 500.0));
        assert_eq!(m.0, [1.0, 0.0, 0.0, 1.0, 250.0, 500.0]);
        assert_eq!(m.position(), Vec2::new(250.0, 500.0));
    }

    #[test]
    fn rotation_quarter_turn_about_point() {
        let around = Vec2::new(10.0, 10.0);
        let m = Matrix::IDENTITY.rotated(around, std::f64::consts::FRAC_PI_2);
        assert!(close(m.project(Vec2::new(20.0, 10.0)), Vec2::new(10.0, 20.0)));
        assert!(close(m.project(around), around));
    }

    #[test]
    fn scale_keeps_pivot_fixed() {
        let pivot = Vec2::new(5.0, 5.0);
        let m = Matrix::at(Vec2::new(1.0, 2.0)).scaled(pivot, 2.0);
        assert!(close(m.project(Vec2::new(4.0, 3.0)), Vec2::new(5.0, 5.0)));
        assert!(close(m.position(), Vec2::new(-3.0, -1.0)));
    }

    #[test]
    fn serializes_as_bare_array() {
        let json = serde_json::to_string(&Matrix::at(Vec2::new(100.0, 100.0))).unwrap();
        assert_eq!(json, "[1.0,0.0,0.0,1.0,100.0,100.0]");
    }
}
