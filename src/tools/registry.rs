//! Name-keyed tool registry.

use std::collections::HashMap;
use std::sync::Arc;

use super::tool::ToolDescriptor;
use crate::types::ToolDefinition;

/// Tools available to a session, keyed by name and kept in registration
/// order.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<ToolDescriptor>>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, returning any previous tool with the same name.
    pub fn add(&mut self, descriptor: ToolDescriptor) -> Option<Arc<ToolDescriptor>> {
        let name = descriptor.name().to_string();
        let previous = self.tools.insert(name.clone(), Arc::new(descriptor));
        if previous.is_some() {
            tracing::warn!(tool = %name, "replacing registered tool");
        } else {
            self.order.push(name);
        }
        previous
    }

    /// Remove a tool by name.
    pub fn remove(&mut self, name: &str) -> Option<Arc<ToolDescriptor>> {
        let removed = self.tools.remove(name)?;
        self.order.retain(|n| n != name);
        Some(removed)
    }

    /// Remove every tool.
    pub fn clear(&mut self) {
        self.tools.clear();
        self.order.clear();
    }

    /// Look up a tool by name.
    pub fn find(&self, name: &str) -> Option<Arc<ToolDescriptor>> {
        self.tools.get(name).cloned()
    }

    /// Whether a tool named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Tools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ToolDescriptor>> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    /// Definitions advertised to the model, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.iter().map(|tool| tool.definition()).collect()
    }
}
