//! Pointer-driven dragging of nodes.
//!
//! A dragged node is pinned to the pointer and the solver is held warm so the
//! neighbours follow. Releasing, or losing the pointer, unpins the node and
//! lets the layout cool down again.

use serde::{Deserialize, Serialize};

use super::Point;
use super::engine::GraphEngine;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DragState {
    #[default]
    Idle,
    Dragging { node: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PointerEvent {
    Down { at: Point },
    Move { at: Point },
    Up { at: Point },
    /// Pointer left the surface or capture was lost mid-drag.
    Leave,
}

impl GraphEngine {
    pub fn drag_state(&self) -> &DragState {
        &self.drag
    }

    /// Topmost node whose disc contains `at`.
    pub fn hit_test(&self, at: Point) -> Option<&str> {
        self.nodes()
            .iter()
            .rev()
            .find(|n| n.position.distance(at) <= n.radius)
            .map(|n| n.id.as_str())
    }

    /// Pin `id` and start dragging it. A drag already in progress on another
    /// node is released first, so at most one node is ever pinned by a drag.
    pub fn begin_drag(&mut self, id: &str) -> Result<()> {
        if self.node(id).is_none() {
            return Err(Error::NotFound(format!("node {id}")));
        }
        if let DragState::Dragging { node } = std::mem::take(&mut self.drag) {
            if let Some(previous) = self.node_mut(&node) {
                previous.pin = None;
            }
            tracing::debug!(node = %node, "drag released by a new press");
        }

        let alpha_target = self.config().drag_alpha_target;
        let node = self
            .node_mut(id)
            .ok_or_else(|| Error::NotFound(format!("node {id}")))?;
        node.pin = Some(node.position);
        node.velocity = Point::default();

        self.set_alpha_target(alpha_target);
        self.reheat(alpha_target);
        self.drag = DragState::Dragging { node: id.to_string() };
        tracing::debug!(node = %id, "drag started");
        Ok(())
    }

    /// Move the dragged node to `at`. The node is placed immediately; the
    /// next tick only carries the rest of the graph along.
    pub fn update_drag(&mut self, at: Point) -> bool {
        let DragState::Dragging { node } = &self.drag else {
            return false;
        };
        let id = node.clone();
        match self.node_mut(&id) {
            Some(node) => {
                node.pin = Some(at);
                node.position = at;
                node.velocity = Point::default();
                true
            }
            None => false,
        }
    }

    pub fn end_drag(&mut self) {
        if let DragState::Dragging { node } = std::mem::take(&mut self.drag) {
            if let Some(state) = self.node_mut(&node) {
                state.pin = None;
            }
            tracing::debug!(node = %node, "drag ended");
        }
        self.set_alpha_target(0.0);
    }

    /// Pointer capture lost mid-drag. Behaves like a release at the last
    /// known position.
    pub fn cancel_drag(&mut self) {
        if self.drag != DragState::Idle {
            tracing::debug!("drag cancelled");
        }
        self.end_drag();
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> DragState {
        match event {
            PointerEvent::Down { at } => {
                if let Some(id) = self.hit_test(at).map(str::to_string) {
                    // The node exists, so pinning cannot fail.
                    let _ = self.begin_drag(&id);
                }
            }
            PointerEvent::Move { at } => {
                self.update_drag(at);
            }
            PointerEvent::Up { at } => {
                self.update_drag(at);
                self.end_drag();
            }
            PointerEvent::Leave => self.cancel_drag(),
        }
        self.drag.clone()
    }
}
