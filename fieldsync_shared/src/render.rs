//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend. A window/sprite layer
//! implements `RenderBackend`; headless binaries and tests use the implementations here.

use tracing::{debug, trace};

use crate::{math::Matrix, world::PlayerId};

/// A minimal rendering API: one sprite per player, placed by its matrix.
pub trait RenderBackend: Send {
    fn begin_frame(&mut self);
    fn draw_player(&mut self, id: PlayerId, draw_matrix: &Matrix);
    fn end_frame(&mut self);
}

/// A no-op renderer useful for headless tests.
#[derive(Default)]
pub struct NullRenderer;

impl RenderBackend for NullRenderer {
    fn begin_frame(&mut self) {}
    fn draw_player(&mut self, _id: PlayerId, _draw_matrix: &Matrix) {}
    fn end_frame(&mut self) {}
}

/// Logs placements instead of drawing. Emits a `debug` summary every `every` frames.
pub struct TraceRenderer {
    frame: u64,
    every: u64,
    line: Vec<String>,
}

impl TraceRenderer {
    pub fn new(every: u64) -> Self {
        Self {
            frame: 0,
            every: every.max(1),
            line: Vec::new(),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frame
    }
}

impl RenderBackend for TraceRenderer {
    fn begin_frame(&mut self) {
        self.line.clear();
    }

    fn draw_player(&mut self, id: PlayerId, draw_matrix: &Matrix) {
        let pos = draw_matrix.position();
        trace!(player = %id, x = pos.x, y = pos.y, "draw");
        self.line.push(format!("{id}:({:.0},{:.0})", pos.x, pos.y));
    }

    fn end_frame(&mut self) {
        if self.frame % self.every == 0 {
            debug!(frame = self.frame, players = %self.line.join(" "), "frame");
        }
        self.frame += 1;
    }
}

/// Records every drawn frame. Test helper.
#[derive(Default)]
pub struct RecordingRenderer {
    pub frames: Vec<Vec<(PlayerId, Matrix)>>,
    current: Vec<(PlayerId, Matrix)>,
}

impl RenderBackend for RecordingRenderer {
    fn begin_frame(&mut self) {
        self.current.clear();
    }

    fn draw_player(&mut self, id: PlayerId, draw_matrix: &Matrix) {
        self.current.push((id, *draw_matrix));
    }

    fn end_frame(&mut self) {
        self.frames.push(std::mem::take(&mut self.current));
    }
}
