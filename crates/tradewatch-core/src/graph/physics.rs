//! One integration tick of the layout solver.
//!
//! Forces act on velocities scaled by the global energy `alpha`; positions
//! then advance by the damped velocity. Pinned nodes are held at their pin.

use serde::{Deserialize, Serialize};

use super::Point;
use super::engine::{EdgeState, NodeState};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Rest length of an edge spring.
    pub link_distance: f64,
    /// Pairwise charge; negative values repel.
    pub charge: f64,
    /// Squared distance below which charge is clamped.
    pub charge_distance_min2: f64,
    /// Fraction of the centroid offset corrected per tick.
    pub center_strength: f64,
    /// Minimum center distance of two nodes, as a multiple of their radii sum.
    pub collide_factor: f64,
    pub collide_strength: f64,
    pub alpha_min: f64,
    pub alpha_decay: f64,
    pub velocity_decay: f64,
    /// Energy restored after a topology refresh.
    pub reheat_alpha: f64,
    /// Energy the solver is held at while a node is dragged.
    pub drag_alpha_target: f64,
    /// Half-width of the square new nodes are scattered in around the center.
    pub spawn_jitter: f64,
    pub ticks_per_second: f64,
    /// Cap on catch-up ticks per `step` call.
    pub max_ticks_per_step: u32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        let alpha_min = 0.001;
        Self {
            link_distance: 150.0,
            charge: -500.0,
            charge_distance_min2: 1.0,
            center_strength: 1.0,
            collide_factor: 1.25,
            collide_strength: 1.0,
            alpha_min,
            // Reach alpha_min from 1.0 in ~300 ticks.
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
            velocity_decay: 0.4,
            reheat_alpha: 0.3,
            drag_alpha_target: 0.3,
            spawn_jitter: 10.0,
            ticks_per_second: 60.0,
            max_ticks_per_step: 4,
        }
    }
}

/// Deterministic nudge for coincident nodes, so forces have a direction.
fn jiggle(i: usize, j: usize) -> Point {
    let angle = ((i as f64) * 0.618_034 + (j as f64) * 0.414_214) * std::f64::consts::TAU;
    Point::new(angle.cos() * 1e-6, angle.sin() * 1e-6)
}

pub(crate) fn apply_links(nodes: &mut [NodeState], edges: &[EdgeState], config: &PhysicsConfig, alpha: f64) {
    let mut degree = vec![0usize; nodes.len()];
    for edge in edges {
        degree[edge.source_index] += 1;
        degree[edge.target_index] += 1;
    }

    for edge in edges {
        let (s, t) = (edge.source_index, edge.target_index);
        let source = &nodes[s];
        let target = &nodes[t];
        let mut delta = (target.position + target.velocity) - (source.position + source.velocity);
        if delta.length() == 0.0 {
            delta = jiggle(s, t);
        }
        let distance = delta.length();
        let strength = edge.weight.clamp(0.0, 1.0) / degree[s].min(degree[t]).max(1) as f64;
        let pull = (distance - config.link_distance) / distance * alpha * strength;
        let shift = delta.scale(pull);
        let bias = degree[s] as f64 / (degree[s] + degree[t]) as f64;

        nodes[t].velocity = nodes[t].velocity - shift.scale(bias);
        nodes[s].velocity = nodes[s].velocity + shift.scale(1.0 - bias);
    }
}

pub(crate) fn apply_charge(nodes: &mut [NodeState], config: &PhysicsConfig, alpha: f64) {
    let count = nodes.len();
    for i in 0..count {
        for j in (i + 1)..count {
            let mut delta = nodes[j].position - nodes[i].position;
            let mut distance2 = delta.x * delta.x + delta.y * delta.y;
            if distance2 == 0.0 {
                delta = jiggle(i, j);
                distance2 = delta.x * delta.x + delta.y * delta.y;
            }
            if distance2 < config.charge_distance_min2 {
                distance2 = (config.charge_distance_min2 * distance2).sqrt();
            }
            let w = config.charge * alpha / distance2;
            let push = delta.scale(w);
            nodes[i].velocity = nodes[i].velocity + push;
            nodes[j].velocity = nodes[j].velocity - push;
        }
    }
}

pub(crate) fn apply_collisions(nodes: &mut [NodeState], config: &PhysicsConfig) {
    let count = nodes.len();
    for i in 0..count {
        for j in (i + 1)..count {
            let ri = nodes[i].radius * config.collide_factor;
            let rj = nodes[j].radius * config.collide_factor;
            let min_distance = ri + rj;
            let mut delta = (nodes[i].position + nodes[i].velocity) - (nodes[j].position + nodes[j].velocity);
            if delta.length() == 0.0 {
                delta = jiggle(i, j);
            }
            let distance = delta.length();
            if distance >= min_distance {
                continue;
            }
            let overlap = (min_distance - distance) / distance * config.collide_strength;
            let ri2 = ri * ri;
            let rj2 = rj * rj;
            let push = delta.scale(overlap);
            nodes[i].velocity = nodes[i].velocity + push.scale(rj2 / (ri2 + rj2));
            nodes[j].velocity = nodes[j].velocity - push.scale(ri2 / (ri2 + rj2));
        }
    }
}

/// Shift free nodes so the centroid of the whole system moves toward `center`.
pub(crate) fn apply_centering(nodes: &mut [NodeState], center: Point, config: &PhysicsConfig) {
    if nodes.is_empty() {
        return;
    }
    let sum = nodes.iter().fold(Point::default(), |acc, n| acc + n.position);
    let centroid = sum.scale(1.0 / nodes.len() as f64);
    let shift = (center - centroid).scale(config.center_strength);
    for node in nodes.iter_mut().filter(|n| n.pin.is_none()) {
        node.position = node.position + shift;
    }
}

pub(crate) fn integrate(nodes: &mut [NodeState], config: &PhysicsConfig) {
    for node in nodes.iter_mut() {
        match node.pin {
            Some(pin) => {
                node.position = pin;
                node.velocity = Point::default();
            }
            None => {
                node.velocity = node.velocity.scale(1.0 - config.velocity_decay);
                node.position = node.position + node.velocity;
            }
        }
    }
}
