use std::collections::{HashMap, HashSet};
use std::time::Duration;

use sha2::{Digest, Sha256};

use super::interaction::DragState;
use super::physics::{self, PhysicsConfig};
use super::visual;
use super::{Point, Viewport};
use crate::model::network::{GraphSnapshot, SnapshotNode};

/// Physical and display state of one agent node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeState {
    pub id: String,
    pub position: Point,
    pub velocity: Point,
    /// Explicit user-controlled position; pinned nodes ignore forces.
    pub pin: Option<Point>,
    pub radius: f64,
    pub sales: f64,
    pub purchases: f64,
    pub net_value: f64,
    pub trade_count: u32,
}

impl NodeState {
    pub(crate) fn spawn(id: &str, position: Point, radius: f64) -> Self {
        Self {
            id: id.to_string(),
            position,
            velocity: Point::default(),
            pin: None,
            radius,
            sales: 0.0,
            purchases: 0.0,
            net_value: 0.0,
            trade_count: 0,
        }
    }

    fn apply_metrics(&mut self, node: &SnapshotNode) {
        self.sales = node.sales;
        self.purchases = node.purchases;
        self.net_value = node.net_value;
        self.trade_count = node.trade_count;
        self.radius = visual::node_radius(node.sales);
    }

    pub fn is_pinned(&self) -> bool {
        self.pin.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeState {
    pub source: String,
    pub target: String,
    pub weight: f64,
    pub(crate) source_index: usize,
    pub(crate) target_index: usize,
}

/// Summary of what a snapshot ingest changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub kept: usize,
    pub edges: usize,
    pub dropped_edges: usize,
}

pub struct GraphEngine {
    config: PhysicsConfig,
    viewport: Viewport,
    nodes: Vec<NodeState>,
    index: HashMap<String, usize>,
    edges: Vec<EdgeState>,
    alpha: f64,
    alpha_target: f64,
    accumulator: Duration,
    pub(crate) drag: DragState,
}

impl GraphEngine {
    pub fn new(viewport: Viewport, config: PhysicsConfig) -> Self {
        Self {
            config,
            viewport,
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            alpha: 0.0,
            alpha_target: 0.0,
            accumulator: Duration::ZERO,
            drag: DragState::Idle,
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.reheat(self.config.reheat_alpha);
    }

    pub fn nodes(&self) -> &[NodeState] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EdgeState] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&NodeState> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut NodeState> {
        self.index.get(id).map(|&i| &mut self.nodes[i])
    }

    pub fn position(&self, id: &str) -> Option<Point> {
        self.node(id).map(|n| n.position)
    }

    pub fn edge_weight(&self, source: &str, target: &str) -> Option<f64> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
            .map(|e| e.weight)
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn alpha_target(&self) -> f64 {
        self.alpha_target
    }

    pub(crate) fn set_alpha_target(&mut self, target: f64) {
        self.alpha_target = target;
    }

    /// Settled layouts need no ticking until something re-energizes them.
    pub fn is_settled(&self) -> bool {
        self.alpha < self.config.alpha_min && self.alpha_target < self.config.alpha_min
    }

    /// Raise the energy to at least `alpha`; never lowers it.
    pub fn reheat(&mut self, alpha: f64) {
        self.alpha = self.alpha.max(alpha);
    }

    /// Merge a full topology snapshot.
    ///
    /// Nodes already tracked keep position, velocity and pin; only their
    /// metrics are refreshed. New nodes spawn near the viewport center. Nodes
    /// and edges absent from the snapshot are dropped. An empty snapshot is
    /// ignored, since the backend reports one before a run has loaded agents.
    pub fn ingest_snapshot(&mut self, snapshot: &GraphSnapshot) -> IngestReport {
        let mut report = IngestReport::default();
        if snapshot.is_empty() {
            return report;
        }
        let was_empty = self.nodes.is_empty();

        let incoming: HashSet<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
        let (kept, removed): (Vec<NodeState>, Vec<NodeState>) = std::mem::take(&mut self.nodes)
            .into_iter()
            .partition(|n| incoming.contains(n.id.as_str()));
        self.nodes = kept;
        report.removed = removed.into_iter().map(|n| n.id).collect();
        if let DragState::Dragging { node } = &self.drag
            && report.removed.contains(node)
        {
            self.drag = DragState::Idle;
            self.alpha_target = 0.0;
        }
        self.rebuild_index();

        for snapshot_node in &snapshot.nodes {
            match self.index.get(&snapshot_node.id) {
                Some(&i) => {
                    self.nodes[i].apply_metrics(snapshot_node);
                    report.kept += 1;
                }
                None => {
                    let position = self.spawn_position(&snapshot_node.id);
                    let mut node = NodeState::spawn(&snapshot_node.id, position, visual::node_radius(0.0));
                    node.apply_metrics(snapshot_node);
                    self.index.insert(node.id.clone(), self.nodes.len());
                    self.nodes.push(node);
                    report.added.push(snapshot_node.id.clone());
                }
            }
        }

        let mut seen = HashMap::new();
        for edge in &snapshot.edges {
            let (Some(&s), Some(&t)) = (self.index.get(&edge.source), self.index.get(&edge.target)) else {
                tracing::warn!(source = %edge.source, target = %edge.target, "edge references unknown node, dropping");
                report.dropped_edges += 1;
                continue;
            };
            if s == t {
                report.dropped_edges += 1;
                continue;
            }
            let state = EdgeState {
                source: edge.source.clone(),
                target: edge.target.clone(),
                weight: edge.weight,
                source_index: s,
                target_index: t,
            };
            match seen.get(&(s, t)) {
                Some(&existing) => self.edges[existing] = state,
                None => {
                    seen.insert((s, t), self.edges.len());
                    self.edges.push(state);
                }
            }
        }
        report.edges = self.edges.len();

        let energy = if was_empty { 1.0 } else { self.config.reheat_alpha };
        self.reheat(energy);
        tracing::debug!(
            added = report.added.len(),
            removed = report.removed.len(),
            edges = report.edges,
            alpha = self.alpha,
            "graph snapshot ingested"
        );
        report
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        // Edge indices refer to the old node order.
        self.edges.clear();
    }

    /// Viewport center plus a per-id offset in `[-spawn_jitter, spawn_jitter]`.
    fn spawn_position(&self, id: &str) -> Point {
        let digest = Sha256::digest(id.as_bytes());
        let unit = |bytes: &[u8]| {
            let raw = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            f64::from(raw) / f64::from(u32::MAX) * 2.0 - 1.0
        };
        let jitter = self.config.spawn_jitter;
        self.viewport.center() + Point::new(unit(&digest[0..4]) * jitter, unit(&digest[4..8]) * jitter)
    }

    /// Advance by wall-clock `dt` using fixed-size ticks. Returns the number
    /// of ticks run; zero while settled.
    pub fn step(&mut self, dt: Duration) -> u32 {
        if self.is_settled() {
            self.accumulator = Duration::ZERO;
            return 0;
        }
        let tick_len = Duration::from_secs_f64(1.0 / self.config.ticks_per_second);
        self.accumulator += dt;
        let mut ticks = 0;
        while self.accumulator + Duration::from_micros(50) >= tick_len {
            self.accumulator = self.accumulator.saturating_sub(tick_len);
            if ticks == self.config.max_ticks_per_step {
                self.accumulator = Duration::ZERO;
                break;
            }
            self.tick();
            ticks += 1;
            if self.is_settled() {
                self.accumulator = Duration::ZERO;
                break;
            }
        }
        ticks
    }

    /// One solver iteration: decay energy, accumulate forces, integrate.
    pub fn tick(&mut self) {
        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;
        let alpha = self.alpha;
        let config = self.config;

        physics::apply_links(&mut self.nodes, &self.edges, &config, alpha);
        physics::apply_charge(&mut self.nodes, &config, alpha);
        physics::apply_collisions(&mut self.nodes, &config);
        physics::integrate(&mut self.nodes, &config);
        physics::apply_centering(&mut self.nodes, self.viewport.center(), &config);
    }

    /// Tick until settled or `max_ticks` have run.
    pub fn settle(&mut self, max_ticks: usize) -> usize {
        let mut ticks = 0;
        while !self.is_settled() && ticks < max_ticks {
            self.tick();
            ticks += 1;
        }
        ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::network::SnapshotEdge;

    fn edge(source: &str, target: &str, weight: f64) -> SnapshotEdge {
        SnapshotEdge {
            source: source.to_string(),
            target: target.to_string(),
            weight,
        }
    }

    fn snapshot(ids: &[&str], edges: Vec<SnapshotEdge>) -> GraphSnapshot {
        GraphSnapshot {
            nodes: ids.iter().map(|id| SnapshotNode::new(*id)).collect(),
            edges,
        }
    }

    fn engine() -> GraphEngine {
        GraphEngine::new(Viewport::new(800.0, 600.0), PhysicsConfig::default())
    }

    #[test]
    fn test_new_nodes_spawn_near_center_but_not_co_located() {
        let mut graph = engine();
        let report = graph.ingest_snapshot(&snapshot(&["A", "B", "C"], vec![]));
        assert_eq!(report.added.len(), 3);

        let center = Point::new(400.0, 300.0);
        let jitter = graph.config().spawn_jitter;
        let positions: Vec<Point> = ["A", "B", "C"].iter().map(|id| graph.position(id).unwrap()).collect();
        for p in &positions {
            assert!((p.x - center.x).abs() <= jitter);
            assert!((p.y - center.y).abs() <= jitter);
        }
        assert_ne!(positions[0], positions[1]);
        assert_ne!(positions[1], positions[2]);
    }

    #[test]
    fn test_refresh_keeps_positions_of_existing_nodes() {
        let mut graph = engine();
        graph.ingest_snapshot(&snapshot(&["A", "B"], vec![edge("A", "B", 0.5)]));
        graph.settle(1000);
        let a_before = graph.position("A").unwrap();
        let b_before = graph.position("B").unwrap();

        let mut next = snapshot(&["A", "B", "C"], vec![edge("B", "C", 0.3)]);
        next.nodes[0].sales = 400.0;
        let report = graph.ingest_snapshot(&next);

        assert_eq!(report.kept, 2);
        assert_eq!(report.added, vec!["C".to_string()]);
        assert_eq!(graph.position("A").unwrap(), a_before);
        assert_eq!(graph.position("B").unwrap(), b_before);
        assert_eq!(graph.node("A").unwrap().sales, 400.0);
        assert!(graph.node("A").unwrap().radius > graph.node("B").unwrap().radius);
    }

    #[test]
    fn test_edges_are_replaced_wholesale() {
        let mut graph = engine();
        graph.ingest_snapshot(&snapshot(
            &["A", "B", "C"],
            vec![edge("A", "B", 0.5), edge("B", "C", 0.2)],
        ));
        graph.ingest_snapshot(&snapshot(
            &["A", "B", "C"],
            vec![edge("B", "C", 0.9), edge("C", "A", 0.1)],
        ));

        assert_eq!(graph.edges().len(), 2);
        assert_eq!(graph.edge_weight("A", "B"), None);
        assert_eq!(graph.edge_weight("B", "C"), Some(0.9));
        assert_eq!(graph.edge_weight("C", "A"), Some(0.1));
    }

    #[test]
    fn test_direction_matters_and_duplicates_collapse() {
        let mut graph = engine();
        let report = graph.ingest_snapshot(&snapshot(
            &["A", "B"],
            vec![edge("A", "B", 0.5), edge("B", "A", 0.4), edge("A", "B", 0.7), edge("A", "A", 1.0), edge("A", "Z", 1.0)],
        ));
        assert_eq!(report.edges, 2);
        assert_eq!(report.dropped_edges, 2);
        assert_eq!(graph.edge_weight("A", "B"), Some(0.7));
        assert_eq!(graph.edge_weight("B", "A"), Some(0.4));
    }

    #[test]
    fn test_missing_nodes_are_removed() {
        let mut graph = engine();
        graph.ingest_snapshot(&snapshot(&["A", "B", "C"], vec![edge("A", "C", 1.0)]));
        let report = graph.ingest_snapshot(&snapshot(&["A", "B"], vec![edge("A", "B", 1.0)]));
        assert_eq!(report.removed, vec!["C".to_string()]);
        assert!(graph.node("C").is_none());
        assert_eq!(graph.nodes().len(), 2);
        assert_eq!(graph.edge_weight("A", "B"), Some(1.0));
    }

    #[test]
    fn test_empty_snapshot_is_ignored() {
        let mut graph = engine();
        graph.ingest_snapshot(&snapshot(&["A", "B"], vec![edge("A", "B", 1.0)]));
        let report = graph.ingest_snapshot(&GraphSnapshot::default());
        assert_eq!(report, IngestReport::default());
        assert_eq!(graph.nodes().len(), 2);
        assert_eq!(graph.edges().len(), 1);
    }

    #[test]
    fn test_energy_decays_to_rest_and_refresh_partially_reheats() {
        let mut graph = engine();
        graph.ingest_snapshot(&snapshot(&["A", "B"], vec![edge("A", "B", 1.0)]));
        assert_eq!(graph.alpha(), 1.0);
        assert!(!graph.is_settled());

        let ticks = graph.settle(10_000);
        assert!(ticks > 0 && ticks < 10_000);
        assert!(graph.is_settled());
        assert_eq!(graph.step(Duration::from_secs(1)), 0);

        graph.ingest_snapshot(&snapshot(&["A", "B"], vec![edge("A", "B", 0.5)]));
        assert_eq!(graph.alpha(), graph.config().reheat_alpha);
        assert!(!graph.is_settled());
    }

    #[test]
    fn test_step_runs_fixed_ticks() {
        let mut graph = engine();
        graph.ingest_snapshot(&snapshot(&["A", "B"], vec![]));
        assert_eq!(graph.step(Duration::from_millis(17)), 1);
        assert_eq!(graph.step(Duration::from_millis(34)), 2);
        // Long frames are capped rather than replayed.
        assert_eq!(graph.step(Duration::from_secs(2)), graph.config().max_ticks_per_step);
    }

    #[test]
    fn test_layout_separates_nodes() {
        let mut graph = engine();
        graph.ingest_snapshot(&snapshot(
            &["A", "B", "C", "D"],
            vec![edge("A", "B", 1.0), edge("B", "C", 1.0), edge("C", "D", 1.0)],
        ));
        graph.settle(10_000);

        let nodes = graph.nodes();
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                let min = (nodes[i].radius + nodes[j].radius) * graph.config().collide_factor;
                assert!(
                    nodes[i].position.distance(nodes[j].position) > min * 0.9,
                    "{} and {} overlap",
                    nodes[i].id,
                    nodes[j].id
                );
            }
        }
        let centroid = nodes.iter().fold(Point::default(), |acc, n| acc + n.position).scale(0.25);
        assert!(centroid.distance(graph.viewport().center()) < 1.0);
    }
}
