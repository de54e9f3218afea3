//! Handler lookup by intent-type name.

use super::IntentHandler;
use std::collections::HashMap;
use std::sync::Arc;

/// Handlers keyed by [`IntentHandler::intent_type`].
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn IntentHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the handlers shipped in [`crate::handlers`].
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::handlers::register_builtin(&mut registry);
        registry
    }

    /// Register a handler, replacing any handler of the same type.
    ///
    /// Returns the replaced handler.
    pub fn register(&mut self, handler: Arc<dyn IntentHandler>) -> Option<Arc<dyn IntentHandler>> {
        let intent_type = handler.intent_type().to_string();
        tracing::debug!(
            intent_type = %intent_type,
            version = handler.version(),
            "Registered intent handler"
        );
        let previous = self.handlers.insert(intent_type.clone(), handler);
        if previous.is_some() {
            tracing::warn!(intent_type = %intent_type, "Replaced existing intent handler");
        }
        previous
    }

    pub fn get(&self, intent_type: &str) -> Option<Arc<dyn IntentHandler>> {
        self.handlers.get(intent_type).cloned()
    }

    /// Registered intent types, sorted.
    pub fn intent_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
