//! Built-in app-specific adapters
//!
//! Framework widgets that defeat the generic ladder get their own
//! choreography. Each adapter declares its own fallback order and success
//! indicators; the five-point gate still runs on whatever they resolve.

pub mod autocomplete;
pub mod ordinal;

pub use autocomplete::AutocompleteCombobox;
pub use ordinal::OrdinalClicker;

use std::sync::Arc;

use discovery_ladder::AdapterRegistry;

/// Registry with the built-in adapters installed.
pub fn default_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(AutocompleteCombobox::default()));
    registry.register(Arc::new(OrdinalClicker));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_ins_are_registered() {
        let registry = default_registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("autocomplete_first_option").is_some());
        assert!(registry.get("ordinal_clicker").is_some());
    }
}
