//! Force-directed layout of agents and their directed trade relationships.
//!
//! Snapshots from the backend replace the topology wholesale while the
//! physical state of every surviving node (position, velocity, pin) is kept.

pub mod engine;
pub mod interaction;
pub mod physics;
pub mod visual;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::model::network::GraphSnapshot;

pub use engine::{GraphEngine, IngestReport, NodeState};
pub use interaction::{DragState, PointerEvent};
pub use physics::PhysicsConfig;
pub use visual::{EdgeSprite, GraphFrame, NodeSprite};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Point) -> f64 {
        (self - other).length()
    }

    pub fn scale(self, factor: f64) -> Point {
        Point::new(self.x * factor, self.y * factor)
    }
}

impl std::ops::Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(960.0, 600.0)
    }
}

/// Shared access to the engine for the poll loop, the physics stepper and
/// input handling. All mutation goes through one mutex, so an ingest and a
/// tick never interleave.
#[derive(Clone)]
pub struct GraphHandle {
    engine: Arc<Mutex<GraphEngine>>,
    wake: Arc<Notify>,
}

impl GraphHandle {
    pub fn new(engine: GraphEngine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            wake: Arc::new(Notify::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GraphEngine> {
        self.engine.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn ingest(&self, snapshot: &GraphSnapshot) -> IngestReport {
        let report = self.lock().ingest_snapshot(snapshot);
        self.wake.notify_one();
        report
    }

    pub fn pointer(&self, event: PointerEvent) -> DragState {
        let state = self.lock().handle_pointer(event);
        self.wake.notify_one();
        state
    }

    pub fn with<R>(&self, f: impl FnOnce(&GraphEngine) -> R) -> R {
        f(&self.lock())
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut GraphEngine) -> R) -> R {
        let result = f(&mut self.lock());
        self.wake.notify_one();
        result
    }

    pub fn frame(&self) -> GraphFrame {
        self.lock().frame()
    }

    /// Advance the layout every `frame_period` until `shutdown` fires. While
    /// the layout is settled the task sleeps until an ingest or drag wakes it.
    pub async fn run_stepper(self, frame_period: Duration, shutdown: Arc<Notify>) {
        let mut interval = tokio::time::interval(frame_period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last = tokio::time::Instant::now();

        loop {
            if self.with(GraphEngine::is_settled) {
                tokio::select! {
                    biased;
                    _ = shutdown.notified() => break,
                    _ = self.wake.notified() => {}
                }
                interval.reset();
                last = tokio::time::Instant::now();
                continue;
            }

            tokio::select! {
                biased;
                _ = shutdown.notified() => break,
                now = interval.tick() => {
                    let elapsed = now.duration_since(last);
                    last = now;
                    self.lock().step(elapsed);
                }
            }
        }
        tracing::debug!("physics stepper stopped");
    }
}
