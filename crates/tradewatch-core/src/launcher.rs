use crate::client::SimulationBackend;
use crate::error::{Error, Result};
use crate::model::run::RunConfig;
use crate::selection::{MIN_PARTICIPANTS, Selection};

/// User-entered run parameters, paired with the selection at launch time.
#[derive(Debug, Clone, PartialEq)]
pub struct RunParameters {
    pub num_steps: u32,
    pub max_turns: u32,
    pub self_reflection_prob: f64,
    pub interaction_prob: f64,
    pub context: String,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            num_steps: 20,
            max_turns: 6,
            self_reflection_prob: 0.3,
            interaction_prob: 0.7,
            context: "Marketplace".to_string(),
        }
    }
}

pub struct RunLauncher;

impl RunLauncher {
    pub fn build(selection: &Selection, params: &RunParameters) -> Result<RunConfig> {
        if !selection.can_launch() {
            return Err(Error::Validation(format!(
                "select at least {MIN_PARTICIPANTS} agents (have {})",
                selection.len()
            )));
        }
        if params.num_steps == 0 {
            return Err(Error::Validation("num_steps must be at least 1".to_string()));
        }
        if params.max_turns == 0 {
            return Err(Error::Validation("max_turns must be at least 1".to_string()));
        }
        for (name, value) in [
            ("self_reflection_prob", params.self_reflection_prob),
            ("interaction_prob", params.interaction_prob),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Validation(format!(
                    "{name} must be between 0.0 and 1.0"
                )));
            }
        }
        Ok(RunConfig {
            agents: selection.ids(),
            num_steps: params.num_steps,
            max_turns: params.max_turns,
            self_reflection_prob: params.self_reflection_prob,
            interaction_prob: params.interaction_prob,
            context: params.context.clone(),
        })
    }

    /// Validate and submit once. Failures are returned to the caller for
    /// display and are never retried here.
    pub async fn launch(
        backend: &dyn SimulationBackend,
        selection: &Selection,
        params: &RunParameters,
    ) -> Result<RunConfig> {
        let config = Self::build(selection, params)?;
        match backend.start_run(&config).await {
            Ok(response) => {
                tracing::info!(agents = ?response.agents, steps = config.num_steps, "run started");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(error = %e, "run launch failed");
                Err(e)
            }
        }
    }
}
