use async_trait::async_trait;
use serde_json::json;

use crate::collaborator::DecisionEngine;
use crate::config::DecisionConfig;
use crate::error::CollaboratorError;
use crate::types::{Action, HistoricalRecord};

pub const ADJUST_ACTION: &str = "ADJUST_ENTANGLEMENT_MATRIX";
pub const HOLD_ACTION: &str = "HOLD_STATE";

/// Deterministic stand-in for a generative decision service.
///
/// Renders the same prompt a model would receive and answers it with a fixed
/// rule set: real history means adjust (carrying the history as payload),
/// synthetic history means hold.
pub struct RuleAdvisor {
    model_name: String,
    temperature: f64,
}

impl RuleAdvisor {
    pub fn from_config(config: &DecisionConfig) -> Self {
        tracing::info!(model = %config.model_name, "decision engine initialized");
        Self {
            model_name: config.model_name.clone(),
            temperature: config.temperature,
        }
    }

    pub fn render_prompt(&self, context: &HistoricalRecord) -> String {
        let history = serde_json::to_string(&context.data).unwrap_or_default();
        format!(
            "Given the following temporal data:\n---\n{history}\n---\n\
             Source: {}\n\
             What is the next logical action for the orchestrator to keep the \
             committed state stable?\n\
             Respond in a structured JSON format: {{\"action\": \"...\", \"priority\": \"...\"}}",
            if context.synthetic { "synthetic" } else { "ledger" }
        )
    }

    fn respond(&self, context: &HistoricalRecord) -> String {
        let response = if context.synthetic {
            json!({ "action": HOLD_ACTION, "priority": "LOW" })
        } else {
            let payload = match &context.data {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            json!({ "action": ADJUST_ACTION, "priority": "HIGH", "data": payload })
        };
        response.to_string()
    }
}

#[async_trait]
impl DecisionEngine for RuleAdvisor {
    async fn decide(&self, context: &HistoricalRecord) -> Result<Action, CollaboratorError> {
        let prompt = self.render_prompt(context);
        tracing::debug!(
            model = %self.model_name,
            temperature = self.temperature,
            prompt_len = prompt.len(),
            "calling decision model"
        );
        let raw = self.respond(context);
        let action = Action::from_response(&raw)?;
        tracing::debug!(action = %action.action, priority = %action.priority, "decision received");
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, StateVector};

    fn advisor() -> RuleAdvisor {
        RuleAdvisor::from_config(&DecisionConfig::default())
    }

    #[tokio::test]
    async fn synthetic_history_holds() {
        let action = advisor()
            .decide(&HistoricalRecord::synthetic("default_state_data"))
            .await
            .unwrap();
        assert_eq!(action.action, HOLD_ACTION);
        assert_eq!(action.priority, Priority::Low);
        assert_eq!(action.payload_len(), 0);
    }

    #[tokio::test]
    async fn real_history_adjusts_with_payload() {
        let record = HistoricalRecord::retrieved(StateVector::new(vec![0, 1]), "chunk");
        let action = advisor().decide(&record).await.unwrap();
        assert_eq!(action.action, ADJUST_ACTION);
        assert_eq!(action.priority, Priority::High);
        assert_eq!(action.payload.as_deref(), Some("chunk"));
    }

    #[test]
    fn prompt_embeds_history_and_format() {
        let record = HistoricalRecord::retrieved(StateVector::new(vec![1, 1]), "chunk");
        let prompt = advisor().render_prompt(&record);
        assert!(prompt.contains("\"chunk\""));
        assert!(prompt.contains("Source: ledger"));
        assert!(prompt.contains("\"priority\""));
    }
}
