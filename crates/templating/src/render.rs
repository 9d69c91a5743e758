//! Single-pass `${var}` renderer

use std::collections::BTreeMap;

use crate::TemplateError;

/// Layered variable context. Lookup walks layers in order; the first layer
/// holding the name wins (dataset row, then CLI overrides, then plan-level
/// defaults).
#[derive(Clone, Debug, Default)]
pub struct VarContext {
    layers: Vec<BTreeMap<String, String>>,
}

impl VarContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a layer with lower precedence than all existing layers.
    pub fn with_layer(mut self, layer: BTreeMap<String, String>) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn resolve(&self, name: &str) -> Option<String> {
        if let Some(env_name) = name.strip_prefix("@env:") {
            return std::env::var(env_name).ok();
        }
        for layer in &self.layers {
            if let Some(value) = layer.get(name) {
                // A value may itself indirect to the environment.
                if let Some(env_name) = value.strip_prefix("@env:") {
                    return std::env::var(env_name).ok();
                }
                return Some(value.clone());
            }
        }
        None
    }
}

/// Substitute every `${name}` / `${name|default}` token in `input`.
///
/// Single pass: substituted values are emitted literally, never re-scanned,
/// which makes rendering idempotent on its own output.
pub fn render(input: &str, ctx: &VarContext) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated token: emit literally.
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let token = &after[..end];
        let (name, default) = match token.split_once('|') {
            Some((name, default)) => (name.trim(), Some(default)),
            None => (token.trim(), None),
        };

        match ctx.resolve(name) {
            Some(value) => out.push_str(&value),
            None => match default {
                Some(default) => out.push_str(default),
                None if name.starts_with("@env:") => {
                    return Err(TemplateError::MissingEnv(
                        name.trim_start_matches("@env:").to_string(),
                    ))
                }
                None => return Err(TemplateError::Unresolved(name.to_string())),
            },
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
