use serde::{Deserialize, Serialize};

/// Parameters submitted once to start a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    pub agents: Vec<String>,
    pub num_steps: u32,
    pub max_turns: u32,
    pub self_reflection_prob: f64,
    pub interaction_prob: f64,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StartResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub agents: Vec<String>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}
