//! Generated script artifact
//!
//! Once discovery has enriched the plan, the generator renders it as a
//! standalone automation script so a failing run can be replayed outside
//! the engine. Plain text artifact; the run store files it.

use webpilot_core_types::{ActionKind, RunState};

pub fn render_script(state: &RunState) -> String {
    let mut out = String::new();
    out.push_str("// Generated browser automation script\n");
    out.push_str(&format!("// target: {}\n\n", state.context.url));
    out.push_str(&format!("navigate(\"{}\");\n", state.context.url));

    for (idx, step) in state.plan.iter().enumerate() {
        let selector = step.selector.as_deref().unwrap_or("<undiscovered>");
        let line = match step.intent.action {
            ActionKind::Fill | ActionKind::Type => format!(
                "{}(\"{}\", \"{}\")",
                step.intent.action.name(),
                selector,
                step.intent.value.as_deref().unwrap_or_default()
            ),
            ActionKind::Press => format!(
                "press(\"{}\", \"{}\")",
                selector,
                step.intent.value.as_deref().unwrap_or("Enter")
            ),
            ActionKind::Select => format!(
                "select(\"{}\", \"{}\")",
                selector,
                step.intent.value.as_deref().unwrap_or_default()
            ),
            ActionKind::AssertText => format!(
                "assert_text(\"{}\", \"{}\")",
                selector,
                step.intent.value.as_deref().unwrap_or_default()
            ),
            ActionKind::Go => format!(
                "navigate(\"{}\")",
                step.intent.value.as_deref().unwrap_or(&state.context.url)
            ),
            other => format!("{}(\"{}\")", other.name(), selector),
        };
        out.push_str(&format!("{line}; // step {idx}: {}\n", step.intent.element));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_core_types::{Candidate, Intent, PlanStep, ReqId, StrategyKind};

    #[test]
    fn renders_discovered_steps() {
        let mut step =
            PlanStep::new(Intent::new("Search Wikipedia", ActionKind::Fill).with_value("AI"));
        step.apply_candidate(
            &Candidate::new("[aria-label=\"Search Wikipedia\"]", StrategyKind::AriaLabel),
            10,
        );
        let state = RunState::new(ReqId::from("g"), "https://en.wikipedia.org", vec![step]);

        let script = render_script(&state);
        assert!(script.contains("navigate(\"https://en.wikipedia.org\")"));
        assert!(script.contains("fill(\"[aria-label=\"Search Wikipedia\"]\", \"AI\")"));
        assert!(script.contains("step 0"));
    }
}
