use crate::client::SimulationBackend;
use crate::error::Result;
use crate::model::agent::AgentSummary;

/// Roster of selectable agents, fetched once per session.
#[derive(Debug, Clone, Default)]
pub struct AgentCatalog {
    agents: Vec<AgentSummary>,
}

impl AgentCatalog {
    pub fn new(agents: Vec<AgentSummary>) -> Self {
        Self { agents }
    }

    pub async fn load(backend: &dyn SimulationBackend, population: &str) -> Result<Self> {
        let agents = backend.list_agents(population).await?;
        tracing::info!(population, count = agents.len(), "agent catalog loaded");
        Ok(Self { agents })
    }

    pub fn agents(&self) -> &[AgentSummary] {
        &self.agents
    }

    pub fn get(&self, id: &str) -> Option<&AgentSummary> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
