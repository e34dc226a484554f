use std::sync::Arc;

use anyhow::{Context, Result};

use dayplan_core::pipeline::{Planner, PlannerConfig};
use dayplan_openai::OpenAiModel;
use dayplan_provider_google::GoogleCalendarGateway;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    planner: Arc<Planner<GoogleCalendarGateway, OpenAiModel>>,
}

impl AppState {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY must be set")?;
        let gateway = GoogleCalendarGateway::new().context("building calendar client")?;
        let model = OpenAiModel::new(api_key).context("building model client")?;
        let planner = Planner::new(gateway, model, PlannerConfig::default());
        Ok(AppState {
            planner: Arc::new(planner),
        })
    }

    pub fn planner(&self) -> &Planner<GoogleCalendarGateway, OpenAiModel> {
        &self.planner
    }
}
