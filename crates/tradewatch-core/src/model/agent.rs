use serde::{Deserialize, Serialize};

/// Roster entry as listed by the backend's agent catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub inventory_count: usize,
    #[serde(default)]
    pub self_description: String,
    #[serde(default)]
    pub personality: Personality,
}

impl AgentSummary {
    /// Card-sized excerpt of the self description.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let mut chars = self.self_description.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }
}

/// Big-five trait scores. Missing traits default to zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Personality {
    #[serde(default)]
    pub extraversion: f64,
    #[serde(default)]
    pub agreeableness: f64,
    #[serde(default)]
    pub conscientiousness: f64,
    #[serde(default)]
    pub neuroticism: f64,
    #[serde(default)]
    pub openness: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentDetail {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub education: String,
    #[serde(default)]
    pub personality: Personality,
    #[serde(default)]
    pub self_description: String,
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
    #[serde(default)]
    pub recent_memories: Vec<MemorySnippet>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    pub name: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub base_value: f64,
    #[serde(default)]
    pub cost_value: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemorySnippet {
    pub text: String,
    #[serde(default)]
    pub created: f64,
    #[serde(default)]
    pub importance: f64,
}
