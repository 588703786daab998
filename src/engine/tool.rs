use std::sync::Arc;

use serde::Serialize;

use super::query::QueryEngine;

/// Name and description the router uses to decide which tool answers what.
#[derive(Debug, Clone, Serialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
}

/// A query engine exposed to the router under a stable name.
#[derive(Clone)]
pub struct QueryEngineTool {
    pub metadata: ToolMetadata,
    pub engine: Arc<QueryEngine>,
}

impl QueryEngineTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        engine: QueryEngine,
    ) -> Self {
        Self {
            metadata: ToolMetadata {
                name: name.into(),
                description: description.into(),
            },
            engine: Arc::new(engine),
        }
    }
}
