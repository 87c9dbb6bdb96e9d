// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow Schema Generation
//!
//! Generates JSON Schema for the workflow format from the Rust type
//! definitions using schemars.

use schemars::schema_for;
use serde_json::{Value, json};

use crate::{DSL_VERSION, WorkflowGraph};

/// Generate the JSON Schema of a workflow document, tagged with the DSL version
pub fn workflow_schema() -> Result<Value, serde_json::Error> {
    let schema = schema_for!(WorkflowGraph);
    let mut schema_json = serde_json::to_value(&schema)?;

    if let Value::Object(ref mut map) = schema_json {
        map.insert("x-dsl-version".to_string(), json!(DSL_VERSION));
    }

    Ok(schema_json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_has_definitions_and_version() {
        let schema = workflow_schema().unwrap();
        assert_eq!(schema["x-dsl-version"], DSL_VERSION);
        assert_eq!(schema["title"], "WorkflowGraph");
        let definitions = schema["definitions"].as_object().unwrap();
        assert!(definitions.contains_key("Agent"));
        assert!(definitions.contains_key("Chat"));
    }
}
