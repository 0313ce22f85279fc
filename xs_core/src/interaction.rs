//! Drag-to-move and click handling on top of the truth store.

use std::f64::consts::PI;

use tracing::{debug, info};
use truth_proto::{encode_truth, normalize_angle, EntityId, Pose, Truth, TruthRecord};

use crate::environment::Environment;
use crate::queue::{PushOutcome, QueueClosed, TruthQueue};
use crate::render::Renderer;
use crate::store::TruthStore;

/// Heading step applied by one rotate click.
pub const ROTATE_STEP: f64 = PI / 10.0;

/// Entity id the server reads as "save the world file".
pub const SAVE_WORLD_ID: i32 = -1;

/// Command record asking the server to save its world: every field zero
/// except `stage_id = -1` and `x = 1`.
pub fn save_world_command() -> TruthRecord {
    TruthRecord {
        stage_id: SAVE_WORLD_ID,
        x: 1,
        ..TruthRecord::default()
    }
}

/// User intent forwarded from the GUI layer. Positions are world meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionEvent {
    DragStart { x: f64, y: f64 },
    /// `heading: None` keeps the snapshot's current heading.
    DragMove { x: f64, y: f64, heading: Option<f64> },
    Rotate { delta: f64 },
    DragStop,
    /// Start dragging when idle, stop when dragging.
    Toggle { x: f64, y: f64 },
    /// Ask the renderer to toggle detail for the nearest entity. Ignored
    /// while dragging.
    Select { x: f64, y: f64 },
    /// Ask the server to save its world. Accepted in any state.
    SaveWorld,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Dragging(Truth),
}

/// What a handled event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionOutcome {
    Ignored,
    Started(EntityId),
    /// A record for the entity was queued; `dropped` is set when the queue
    /// had to discard its oldest entry to make room.
    Sent { id: EntityId, dropped: bool },
    Stopped { id: EntityId, dropped: bool },
    Selected(EntityId),
    SaveRequested { dropped: bool },
}

impl InteractionOutcome {
    /// Whether the event pushed a record to the outbound queue.
    pub fn sent(&self) -> bool {
        matches!(
            self,
            InteractionOutcome::Sent { .. }
                | InteractionOutcome::Stopped { .. }
                | InteractionOutcome::SaveRequested { .. }
        )
    }

    pub fn dropped(&self) -> bool {
        matches!(
            self,
            InteractionOutcome::Sent { dropped: true, .. }
                | InteractionOutcome::Stopped { dropped: true, .. }
                | InteractionOutcome::SaveRequested { dropped: true }
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    state: InteractionState,
    bounds: Option<(f64, f64)>,
}

impl InteractionController {
    /// Controller that clamps drag positions to the environment.
    pub fn new(environment: &Environment) -> Self {
        Self {
            state: InteractionState::Idle,
            bounds: Some(environment.world_bounds()),
        }
    }

    /// Controller with no position limits.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, InteractionState::Dragging(_))
    }

    /// The optimistic copy of the entity being dragged.
    pub fn snapshot(&self) -> Option<&Truth> {
        match &self.state {
            InteractionState::Dragging(truth) => Some(truth),
            InteractionState::Idle => None,
        }
    }

    pub fn handle<R: Renderer + ?Sized>(
        &mut self,
        event: InteractionEvent,
        store: &TruthStore,
        outbound: &TruthQueue,
        renderer: &mut R,
    ) -> Result<InteractionOutcome, QueueClosed> {
        match event {
            InteractionEvent::DragStart { x, y } => Ok(self.start(x, y, store, renderer)),
            InteractionEvent::DragMove { x, y, heading } => {
                self.move_to(x, y, heading, outbound, renderer)
            }
            InteractionEvent::Rotate { delta } => self.rotate(delta, outbound, renderer),
            InteractionEvent::DragStop => self.stop(outbound, renderer),
            InteractionEvent::Toggle { x, y } => {
                if self.is_dragging() {
                    self.stop(outbound, renderer)
                } else {
                    Ok(self.start(x, y, store, renderer))
                }
            }
            InteractionEvent::Select { x, y } => Ok(self.select(x, y, store, renderer)),
            InteractionEvent::SaveWorld => {
                let pushed = outbound.push(save_world_command())?;
                info!(target: "xs::interaction", "world.save_requested");
                Ok(InteractionOutcome::SaveRequested {
                    dropped: pushed == PushOutcome::DroppedOldest,
                })
            }
        }
    }

    fn start<R: Renderer + ?Sized>(
        &mut self,
        x: f64,
        y: f64,
        store: &TruthStore,
        renderer: &mut R,
    ) -> InteractionOutcome {
        if self.is_dragging() {
            return InteractionOutcome::Ignored;
        }
        let Some(truth) = store.nearest_truth(x, y) else {
            debug!(target: "xs::interaction", x, y, "drag.start.no_entity");
            return InteractionOutcome::Ignored;
        };
        let snapshot = truth.clone();
        let id = snapshot.stage_id;
        info!(
            target: "xs::interaction",
            %id,
            x = snapshot.pose.x,
            y = snapshot.pose.y,
            "drag.started"
        );
        renderer.highlight(Some(&snapshot));
        self.state = InteractionState::Dragging(snapshot);
        InteractionOutcome::Started(id)
    }

    fn move_to<R: Renderer + ?Sized>(
        &mut self,
        x: f64,
        y: f64,
        heading: Option<f64>,
        outbound: &TruthQueue,
        renderer: &mut R,
    ) -> Result<InteractionOutcome, QueueClosed> {
        let Some(current) = self.snapshot() else {
            return Ok(InteractionOutcome::Ignored);
        };
        let (x, y) = self.clamp(x, y);
        let th = heading.map_or(current.pose.th, normalize_angle);
        let moved = current.with_pose(Pose::new(x, y, th));
        self.replace_snapshot(moved, outbound, renderer)
    }

    fn rotate<R: Renderer + ?Sized>(
        &mut self,
        delta: f64,
        outbound: &TruthQueue,
        renderer: &mut R,
    ) -> Result<InteractionOutcome, QueueClosed> {
        let Some(current) = self.snapshot() else {
            return Ok(InteractionOutcome::Ignored);
        };
        let pose = current.pose;
        let rotated = current.with_pose(Pose::new(pose.x, pose.y, normalize_angle(pose.th + delta)));
        self.replace_snapshot(rotated, outbound, renderer)
    }

    fn replace_snapshot<R: Renderer + ?Sized>(
        &mut self,
        snapshot: Truth,
        outbound: &TruthQueue,
        renderer: &mut R,
    ) -> Result<InteractionOutcome, QueueClosed> {
        let id = snapshot.stage_id;
        let pushed = outbound.push(encode_truth(&snapshot))?;
        debug!(
            target: "xs::interaction",
            %id,
            x = snapshot.pose.x,
            y = snapshot.pose.y,
            th = snapshot.pose.th,
            "drag.moved"
        );
        renderer.highlight(Some(&snapshot));
        self.state = InteractionState::Dragging(snapshot);
        Ok(InteractionOutcome::Sent {
            id,
            dropped: pushed == PushOutcome::DroppedOldest,
        })
    }

    fn stop<R: Renderer + ?Sized>(
        &mut self,
        outbound: &TruthQueue,
        renderer: &mut R,
    ) -> Result<InteractionOutcome, QueueClosed> {
        let InteractionState::Dragging(snapshot) = std::mem::take(&mut self.state) else {
            return Ok(InteractionOutcome::Ignored);
        };
        let id = snapshot.stage_id;
        renderer.highlight(None);
        let pushed = outbound.push(encode_truth(&snapshot))?;
        info!(
            target: "xs::interaction",
            %id,
            x = snapshot.pose.x,
            y = snapshot.pose.y,
            "drag.stopped"
        );
        Ok(InteractionOutcome::Stopped {
            id,
            dropped: pushed == PushOutcome::DroppedOldest,
        })
    }

    fn select<R: Renderer + ?Sized>(
        &self,
        x: f64,
        y: f64,
        store: &TruthStore,
        renderer: &mut R,
    ) -> InteractionOutcome {
        if self.is_dragging() {
            return InteractionOutcome::Ignored;
        }
        match store.nearest_truth(x, y) {
            Some(truth) => {
                debug!(target: "xs::interaction", id = %truth.stage_id, "entity.selected");
                renderer.select(truth);
                InteractionOutcome::Selected(truth.stage_id)
            }
            None => InteractionOutcome::Ignored,
        }
    }

    fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        match self.bounds {
            Some((max_x, max_y)) => (x.clamp(0.0, max_x), y.clamp(0.0, max_y)),
            None => (x, y),
        }
    }
}
