use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardEntry {
    pub agent: String,
    #[serde(default)]
    pub sales: f64,
    #[serde(default)]
    pub purchases: f64,
    #[serde(default)]
    pub net_value: f64,
    #[serde(default)]
    pub trade_count: u32,
}
