//! Plan compilation: intents + variables -> plan steps

use std::collections::BTreeMap;

use tracing::debug;
use webpilot_core_types::{PlanStep, RunRequest};

use crate::{render, TemplateError, VarContext};

/// Compile a run request into plan steps, rendering every templated value.
///
/// Precedence, highest first: request dataset row, CLI overrides,
/// plan-level defaults. Unresolved variables fail compilation here; the
/// run never starts.
pub fn compile_plan(
    request: &RunRequest,
    overrides: &BTreeMap<String, String>,
    defaults: &BTreeMap<String, String>,
) -> Result<Vec<PlanStep>, TemplateError> {
    let ctx = VarContext::new()
        .with_layer(request.dataset_row.clone())
        .with_layer(overrides.clone())
        .with_layer(defaults.clone());

    let mut steps = Vec::with_capacity(request.intents.len());
    for (index, intent) in request.intents.iter().enumerate() {
        if intent.action.requires_value() && intent.value.is_none() {
            return Err(TemplateError::MissingValue {
                index,
                action: intent.action.name().to_string(),
            });
        }

        let mut intent = intent.clone();
        if let Some(value) = intent.value.take() {
            let rendered = render(&value, &ctx)?;
            debug!(step = index, value = %rendered, "compiled step value");
            intent.value = Some(rendered);
        }
        steps.push(PlanStep::new(intent));
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_core_types::{ActionKind, Intent};

    fn request(intents: Vec<Intent>) -> RunRequest {
        RunRequest::new("https://example.org", intents)
    }

    #[test]
    fn renders_values_against_dataset_row() {
        let mut req = request(vec![
            Intent::new("Amount", ActionKind::Fill).with_value("${amount}")
        ]);
        req.dataset_row.insert("amount".to_string(), "100000".to_string());

        let steps = compile_plan(&req, &BTreeMap::new(), &BTreeMap::new()).unwrap();
        assert_eq!(steps[0].intent.value.as_deref(), Some("100000"));
    }

    #[test]
    fn unresolved_variable_fails_compilation() {
        let req = request(vec![
            Intent::new("Amount", ActionKind::Fill).with_value("${nope}")
        ]);
        let err = compile_plan(&req, &BTreeMap::new(), &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, TemplateError::Unresolved(_)));
    }

    #[test]
    fn value_required_actions_are_validated() {
        let req = request(vec![Intent::new("Amount", ActionKind::Fill)]);
        let err = compile_plan(&req, &BTreeMap::new(), &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, TemplateError::MissingValue { index: 0, .. }));
    }

    #[test]
    fn dataset_row_beats_overrides_and_defaults() {
        let mut req = request(vec![
            Intent::new("Stage", ActionKind::Select).with_value("${stage}")
        ]);
        req.dataset_row.insert("stage".to_string(), "Prospecting".to_string());
        let overrides = [("stage".to_string(), "Negotiation".to_string())].into();
        let defaults = [("stage".to_string(), "Closed".to_string())].into();

        let steps = compile_plan(&req, &overrides, &defaults).unwrap();
        assert_eq!(steps[0].intent.value.as_deref(), Some("Prospecting"));
    }
}
