//! Input handling.
//!
//! In a real client this would sample the mouse every frame. The core only needs "where is my
//! player now", so sources return an absolute field position, or `None` to leave it unchanged.

use std::collections::VecDeque;

use crate::math::Vec2;

/// Source of local position samples.
pub trait PositionSource: Send {
    /// Samples the position after `dt` seconds have passed since the previous call.
    fn sample(&mut self, dt: f64) -> Option<Vec2>;
}

/// Circles around a home point. Used by the headless binaries.
#[derive(Debug, Clone)]
pub struct OrbitInput {
    pub center: Vec2,
    pub radius: f64,
    /// Radians per second.
    pub speed: f64,
    angle: f64,
}

impl OrbitInput {
    pub fn new(center: Vec2, radius: f64, speed: f64) -> Self {
        Self {
            center,
            radius,
            speed,
            angle: 0.0,
        }
    }
}

impl PositionSource for OrbitInput {
    fn sample(&mut self, dt: f64) -> Option<Vec2> {
        self.angle = (self.angle + self.speed * dt) % std::f64::consts::TAU;
        let (sin, cos) = self.angle.sin_cos();
        Some(self.center.add(Vec2::new(cos, sin).scaled(self.radius)))
    }
}

/// Replays fixed samples, then holds still.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    samples: VecDeque<Vec2>,
}

impl ScriptedInput {
    pub fn new(samples: impl IntoIterator<Item = Vec2>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl PositionSource for ScriptedInput {
    fn sample(&mut self, _dt: f64) -> Option<Vec2> {
        self.samples.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbit_stays_on_circle() {
        let center = Vec2::new(250.0, 250.0);
        let mut input = OrbitInput::new(center, 40.0, 2.0);
        for _ in 0..20 {
            let p = input.sample(0.05).unwrap();
            assert!((p.sub(center).len() - 40.0).abs() < 1e-9);
        }
    }

    #[test]
    fn scripted_runs_out() {
        let mut input = ScriptedInput::new([Vec2::new(1.0, 1.0)]);
        assert_eq!(input.sample(0.0), Some(Vec2::new(1.0, 1.0)));
        assert_eq!(input.sample(0.0), None);
        assert_eq!(input.remaining(), 0);
    }
}
