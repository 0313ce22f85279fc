//! Seam to the external drawing layer.

use tracing::{debug, trace};
use truth_proto::Truth;

/// Receives entity snapshots to draw and undraw. Implementations live in the
/// GUI layer; the core only calls these in a well-defined order.
pub trait Renderer {
    /// Remove the visual representation of `truth`.
    fn retract(&mut self, truth: &Truth);

    /// Draw `truth`.
    fn draw(&mut self, truth: &Truth);

    /// Mark the entity being dragged, or clear the mark with `None`.
    fn highlight(&mut self, _truth: Option<&Truth>) {}

    /// Toggle per-entity detail for `truth`.
    fn select(&mut self, _truth: &Truth) {}
}

/// Renderer that draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn retract(&mut self, _truth: &Truth) {}

    fn draw(&mut self, _truth: &Truth) {}
}

/// Renderer that reports every call through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRenderer;

impl Renderer for TracingRenderer {
    fn retract(&mut self, truth: &Truth) {
        trace!(target: "xs::render", id = %truth.stage_id, "render.retract");
    }

    fn draw(&mut self, truth: &Truth) {
        trace!(
            target: "xs::render",
            id = %truth.stage_id,
            x = truth.pose.x,
            y = truth.pose.y,
            th = truth.pose.th,
            "render.draw"
        );
    }

    fn highlight(&mut self, truth: Option<&Truth>) {
        match truth {
            Some(truth) => debug!(
                target: "xs::render",
                id = %truth.stage_id,
                x = truth.pose.x,
                y = truth.pose.y,
                "render.highlight"
            ),
            None => debug!(target: "xs::render", "render.highlight_cleared"),
        }
    }

    fn select(&mut self, truth: &Truth) {
        debug!(target: "xs::render", id = %truth.stage_id, "render.select");
    }
}
