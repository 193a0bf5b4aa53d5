use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::provider::ToolProvider;
use super::schema::ToolDescriptor;
use super::types::ToolSchema;

/// Resolved owner of a tool name.
#[derive(Clone)]
pub struct ToolRoute {
    pub provider: Arc<dyn ToolProvider>,
    pub descriptor: ToolDescriptor,
}

impl std::fmt::Debug for ToolRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRoute")
            .field("provider", &self.provider.id())
            .field("tool", &self.descriptor.name)
            .finish()
    }
}

/// Two providers exposing the same tool name. The earlier registration wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolConflict {
    pub tool_name: String,
    pub winner: String,
    pub shadowed: String,
}

/// Union catalog for one discovery cycle.
#[derive(Debug, Default, Clone)]
pub struct ToolIndex {
    routes: Vec<ToolRoute>,
    by_name: HashMap<String, usize>,
    conflicts: Vec<ToolConflict>,
}

impl ToolIndex {
    /// Builds the index from catalogs given in provider registration order.
    pub fn build<I>(catalogs: I) -> Self
    where
        I: IntoIterator<Item = (Arc<dyn ToolProvider>, Vec<ToolDescriptor>)>,
    {
        let mut index = Self::default();

        for (provider, descriptors) in catalogs {
            for descriptor in descriptors {
                if let Some(&existing) = index.by_name.get(&descriptor.name) {
                    let winner = index.routes[existing].provider.id().to_string();
                    // Repeats within one provider are not conflicts.
                    if winner != provider.id() {
                        index.conflicts.push(ToolConflict {
                            tool_name: descriptor.name.clone(),
                            winner,
                            shadowed: provider.id().to_string(),
                        });
                    }
                    continue;
                }

                index
                    .by_name
                    .insert(descriptor.name.clone(), index.routes.len());
                index.routes.push(ToolRoute {
                    provider: Arc::clone(&provider),
                    descriptor,
                });
            }
        }

        index
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolRoute> {
        self.by_name.get(name).map(|&position| &self.routes[position])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.routes.iter().map(|route| &route.descriptor)
    }

    pub fn routes(&self) -> &[ToolRoute] {
        &self.routes
    }

    /// Function schemas in registration order, ready for a chat request.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.descriptors().map(ToolDescriptor::to_schema).collect()
    }

    pub fn conflicts(&self) -> &[ToolConflict] {
        &self.conflicts
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
