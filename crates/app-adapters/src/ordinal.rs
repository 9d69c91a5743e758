//! Ordinal-scoped clicker
//!
//! "First video", "third result": when the planner didn't attach an
//! explicit ordinal, this adapter parses the position word and resolves
//! the Nth member of the inferred role family.

use async_trait::async_trait;
use browser_adapter::{AdapterError, PageDriver};
use discovery_ladder::{AppAdapter, ExecResult};
use tracing::debug;
use webpilot_core_types::{ActionKind, Candidate, Intent, StrategyKind};

pub struct OrdinalClicker;

/// Parse a leading ordinal word or numeral: "first" -> 0, "3rd" -> 2.
pub fn parse_ordinal(element: &str) -> Option<usize> {
    let word = element.split_whitespace().next()?.to_lowercase();
    match word.as_str() {
        "first" => Some(0),
        "second" => Some(1),
        "third" => Some(2),
        "fourth" => Some(3),
        "fifth" => Some(4),
        "sixth" => Some(5),
        "seventh" => Some(6),
        "eighth" => Some(7),
        "ninth" => Some(8),
        "tenth" => Some(9),
        other => {
            let digits: String = other.chars().take_while(|c| c.is_ascii_digit()).collect();
            let suffix = &other[digits.len()..];
            if digits.is_empty() || !matches!(suffix, "st" | "nd" | "rd" | "th") {
                return None;
            }
            digits.parse::<usize>().ok().and_then(|n| n.checked_sub(1))
        }
    }
}

#[async_trait]
impl AppAdapter for OrdinalClicker {
    fn name(&self) -> &str {
        "ordinal_clicker"
    }

    fn supports(&self, intent: &Intent, _url: &str) -> bool {
        intent.action == ActionKind::Click
            && intent.ordinal.is_none()
            && parse_ordinal(&intent.element).is_some()
    }

    async fn resolve(
        &self,
        driver: &dyn PageDriver,
        intent: &Intent,
    ) -> Result<Vec<Candidate>, AdapterError> {
        let Some(ordinal) = parse_ordinal(&intent.element) else {
            return Ok(Vec::new());
        };
        let role = intent.role_family();
        let family_size = driver
            .survey(intent.within.as_deref())
            .await?
            .iter()
            .filter(|s| s.visible && s.role.as_deref() == Some(role))
            .count();
        if ordinal >= family_size {
            debug!(role, ordinal, family_size, "ordinal beyond family");
            return Ok(Vec::new());
        }
        Ok(vec![Candidate::new(
            format!("role={role} >> nth={ordinal}"),
            StrategyKind::Ordinal,
        )
        .with_meta(serde_json::json!({ "role": role, "ordinal": ordinal }))])
    }

    async fn act(
        &self,
        driver: &dyn PageDriver,
        candidate: &Candidate,
        _action: ActionKind,
        _value: Option<&str>,
    ) -> Result<ExecResult, AdapterError> {
        driver.click(&candidate.selector).await?;
        Ok(ExecResult::completed("clicked"))
    }
}
