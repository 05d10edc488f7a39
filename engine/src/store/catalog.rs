//! In-memory stack catalog

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::ports::{StackCatalog, StackDefinition};

/// Catalog seeded up front, e.g. from a product manifest
#[derive(Default)]
pub struct InMemoryCatalog {
    entries: RwLock<HashMap<String, StackDefinition>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, definition: StackDefinition) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(definition.stack_id.clone(), definition);
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StackCatalog for InMemoryCatalog {
    async fn get_stack(&self, composite_stack_id: &str) -> Option<StackDefinition> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(composite_stack_id).cloned()
    }
}
