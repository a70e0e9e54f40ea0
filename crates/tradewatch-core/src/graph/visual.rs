//! Mapping from trade metrics to what is drawn, and a renderer-independent
//! frame that can be serialized or written out as SVG.

use std::fmt::Write as _;

use serde::Serialize;

use super::Point;
use super::engine::GraphEngine;

pub const BASE_RADIUS: f64 = 20.0;
const ARROW_LENGTH: f64 = 10.0;
const ARROW_HALF_WIDTH: f64 = 5.0;
const NET_SPAN: f64 = 500.0;

/// Diverging red-yellow-green ramp, low to high.
const RD_YL_GN: [(u8, u8, u8); 11] = [
    (0xa5, 0x00, 0x26),
    (0xd7, 0x30, 0x27),
    (0xf4, 0x6d, 0x43),
    (0xfd, 0xae, 0x61),
    (0xfe, 0xe0, 0x8b),
    (0xff, 0xff, 0xbf),
    (0xd9, 0xef, 0x8b),
    (0xa6, 0xd9, 0x6a),
    (0x66, 0xbd, 0x63),
    (0x1a, 0x98, 0x50),
    (0x00, 0x68, 0x37),
];

pub fn node_radius(sales: f64) -> f64 {
    BASE_RADIUS + sales.max(0.0).sqrt() / 2.0
}

/// Fill color for a node's net value. Zero maps to the neutral midpoint;
/// values beyond ±500 saturate.
pub fn net_color(net_value: f64) -> String {
    let t = if net_value.is_finite() {
        ((net_value + NET_SPAN) / (2.0 * NET_SPAN)).clamp(0.0, 1.0)
    } else if net_value > 0.0 {
        1.0
    } else {
        0.0
    };
    let scaled = t * (RD_YL_GN.len() - 1) as f64;
    let lower = (scaled.floor() as usize).min(RD_YL_GN.len() - 2);
    let frac = scaled - lower as f64;
    let (r0, g0, b0) = RD_YL_GN[lower];
    let (r1, g1, b1) = RD_YL_GN[lower + 1];
    let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * frac).round() as u8;
    format!("#{:02x}{:02x}{:02x}", mix(r0, r1), mix(g0, g1), mix(b0, b1))
}

pub fn edge_opacity(weight: f64) -> f64 {
    (weight * 2.0).clamp(0.0, 1.0)
}

pub fn edge_width(weight: f64) -> f64 {
    (weight * 5.0).max(1.0)
}

/// First word of the agent id, used as the on-node label.
pub fn short_label(id: &str) -> &str {
    id.split_whitespace().next().unwrap_or(id)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSprite {
    pub id: String,
    pub label: String,
    pub center: Point,
    pub radius: f64,
    pub fill: String,
    pub pinned: bool,
    pub sales: f64,
    pub net_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeSprite {
    pub source: String,
    pub target: String,
    pub from: Point,
    /// Where the shaft meets the arrowhead base.
    pub to: Point,
    /// Tip and the two base corners of the arrowhead, touching the target's rim.
    pub arrow: [Point; 3],
    pub width: f64,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphFrame {
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<NodeSprite>,
    pub edges: Vec<EdgeSprite>,
}

fn edge_sprite(source: (&str, Point), target: (&str, Point, f64), weight: f64) -> Option<EdgeSprite> {
    let delta = target.1 - source.1;
    let length = delta.length();
    if length <= target.2 {
        return None;
    }
    let dir = delta.scale(1.0 / length);
    let normal = Point::new(-dir.y, dir.x);
    let tip = target.1 - dir.scale(target.2);
    let base = tip - dir.scale(ARROW_LENGTH);
    Some(EdgeSprite {
        source: source.0.to_string(),
        target: target.0.to_string(),
        from: source.1,
        to: base,
        arrow: [
            tip,
            base + normal.scale(ARROW_HALF_WIDTH),
            base - normal.scale(ARROW_HALF_WIDTH),
        ],
        width: edge_width(weight),
        opacity: edge_opacity(weight),
    })
}

impl GraphEngine {
    /// Snapshot of what should be drawn for the current layout. Edges whose
    /// endpoints overlap are left out.
    pub fn frame(&self) -> GraphFrame {
        let nodes = self.nodes();
        let edges = self
            .edges()
            .iter()
            .filter_map(|e| {
                let s = &nodes[e.source_index];
                let t = &nodes[e.target_index];
                edge_sprite((s.id.as_str(), s.position), (t.id.as_str(), t.position, t.radius), e.weight)
            })
            .collect();
        let viewport = self.viewport();
        GraphFrame {
            width: viewport.width,
            height: viewport.height,
            nodes: nodes
                .iter()
                .map(|n| NodeSprite {
                    id: n.id.clone(),
                    label: short_label(&n.id).to_string(),
                    center: n.position,
                    radius: n.radius,
                    fill: net_color(n.net_value),
                    pinned: n.is_pinned(),
                    sales: n.sales,
                    net_value: n.net_value,
                })
                .collect(),
            edges,
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl GraphFrame {
    pub fn to_svg(&self) -> String {
        let mut svg = String::new();
        // Writing to a String is infallible.
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        );
        let _ = writeln!(svg, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##);
        for edge in &self.edges {
            let _ = writeln!(
                svg,
                r##"<g opacity="{:.3}"><line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="#999999" stroke-width="{:.2}"/><polygon points="{:.2},{:.2} {:.2},{:.2} {:.2},{:.2}" fill="#999999"/></g>"##,
                edge.opacity,
                edge.from.x,
                edge.from.y,
                edge.to.x,
                edge.to.y,
                edge.width,
                edge.arrow[0].x,
                edge.arrow[0].y,
                edge.arrow[1].x,
                edge.arrow[1].y,
                edge.arrow[2].x,
                edge.arrow[2].y,
            );
        }
        for node in &self.nodes {
            let stroke = if node.pinned { "#333333" } else { "#ffffff" };
            let _ = writeln!(
                svg,
                r##"<g><title>{}</title><circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}" stroke="{stroke}" stroke-width="2"/><text x="{:.2}" y="{:.2}" text-anchor="middle" dominant-baseline="central" font-size="12">{}</text></g>"##,
                escape(&node.id),
                node.center.x,
                node.center.y,
                node.radius,
                node.fill,
                node.center.x,
                node.center.y,
                escape(&node.label),
            );
        }
        svg.push_str("</svg>\n");
        svg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{PhysicsConfig, Viewport};
    use crate::model::network::{GraphSnapshot, SnapshotEdge, SnapshotNode};

    #[test]
    fn test_radius_grows_with_sales() {
        assert_eq!(node_radius(0.0), 20.0);
        assert_eq!(node_radius(-100.0), 20.0);
        assert_eq!(node_radius(400.0), 30.0);
        assert!(node_radius(900.0) > node_radius(400.0));
    }

    #[test]
    fn test_color_scale_is_centered_on_zero() {
        assert_eq!(net_color(0.0), "#ffffbf");
        assert_eq!(net_color(-500.0), "#a50026");
        assert_eq!(net_color(-10_000.0), "#a50026");
        assert_eq!(net_color(500.0), "#006837");
        assert_eq!(net_color(f64::INFINITY), "#006837");
    }

    #[test]
    fn test_edge_styling_scales_with_weight() {
        assert_eq!(edge_opacity(0.25), 0.5);
        assert_eq!(edge_opacity(0.9), 1.0);
        assert_eq!(edge_width(0.1), 1.0);
        assert_eq!(edge_width(1.0), 5.0);
    }

    #[test]
    fn test_label_is_first_word() {
        assert_eq!(short_label("Mei Chen"), "Mei");
        assert_eq!(short_label("Solo"), "Solo");
    }

    #[test]
    fn test_arrowhead_touches_target_rim() {
        let sprite = edge_sprite(("A", Point::new(0.0, 0.0)), ("B", Point::new(100.0, 0.0), 20.0), 0.5).unwrap();
        assert_eq!(sprite.arrow[0], Point::new(80.0, 0.0));
        assert_eq!(sprite.to, Point::new(70.0, 0.0));
        assert_eq!(sprite.arrow[1], Point::new(70.0, 5.0));
        assert_eq!(sprite.arrow[2], Point::new(70.0, -5.0));
        assert!(edge_sprite(("A", Point::new(0.0, 0.0)), ("B", Point::new(5.0, 0.0), 20.0), 0.5).is_none());
    }

    #[test]
    fn test_frame_and_svg() {
        let mut graph = GraphEngine::new(Viewport::new(400.0, 300.0), PhysicsConfig::default());
        let mut seller = SnapshotNode::new("Mei Chen");
        seller.sales = 100.0;
        seller.net_value = 100.0;
        graph.ingest_snapshot(&GraphSnapshot {
            nodes: vec![seller, SnapshotNode::new("Carlos <Mendez>")],
            edges: vec![SnapshotEdge {
                source: "Mei Chen".to_string(),
                target: "Carlos <Mendez>".to_string(),
                weight: 0.4,
            }],
        });
        graph.settle(10_000);

        let frame = graph.frame();
        assert_eq!(frame.nodes.len(), 2);
        assert_eq!(frame.edges.len(), 1);
        assert_eq!(frame.nodes[0].label, "Mei");
        assert_eq!(frame.nodes[0].radius, 25.0);
        assert_eq!(frame.edges[0].source, "Mei Chen");

        let svg = frame.to_svg();
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("<circle").count(), 2);
        assert_eq!(svg.matches("<polygon").count(), 1);
        assert!(svg.contains("Carlos &lt;Mendez&gt;"));

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["nodes"][0]["id"], "Mei Chen");
        assert_eq!(json["edges"][0]["opacity"], 0.8);
    }
}
