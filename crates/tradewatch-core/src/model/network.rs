use serde::{Deserialize, Serialize};

/// Full-replacement view of the trading relationship graph. Carries no
/// positions; layout state lives in the graph engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<SnapshotNode>,
    #[serde(default)]
    pub edges: Vec<SnapshotEdge>,
}

impl GraphSnapshot {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotNode {
    pub id: String,
    #[serde(default)]
    pub sales: f64,
    #[serde(default)]
    pub net_value: f64,
    #[serde(default)]
    pub purchases: f64,
    #[serde(default)]
    pub trade_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl SnapshotNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sales: 0.0,
            net_value: 0.0,
            purchases: 0.0,
            trade_count: 0,
            index: None,
        }
    }
}

/// Directed relationship from `source` (seller side) to `target`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotEdge {
    pub source: String,
    pub target: String,
    pub weight: f64,
}
