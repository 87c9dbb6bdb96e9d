// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow DSL Type Definitions
//!
//! This crate defines the workflow graph consumed by `flowgen-export`:
//! - Deserialization of workflow JSON (camelCase keys)
//! - Type-safe access to agents, models, tools and chats
//! - JSON Schema generation via schemars
//!
//! Cross-references between entities are plain ids. This crate never checks
//! that they point anywhere; graphs are validated upstream.

mod schema_types;

/// JSON Schema generation for the workflow format.
pub mod schema;

pub use schema::workflow_schema;
pub use schema_types::*;

// ============================================================================
// Parsing Functions
// ============================================================================

/// Parse a workflow graph from JSON text
pub fn parse_workflow(json: &str) -> Result<WorkflowGraph, String> {
    serde_json::from_str(json).map_err(|e| format!("Failed to parse workflow: {}", e))
}

/// Parse a workflow graph from a JSON Value
pub fn parse_workflow_value(json: &serde_json::Value) -> Result<WorkflowGraph, String> {
    serde_json::from_value(json.clone()).map_err(|e| format!("Failed to parse workflow: {}", e))
}

// ============================================================================
// Entity Categories
// ============================================================================

/// Category of a named entity of the workflow.
///
/// The exporter resolves one identifier per entity; the category decides the
/// prefix used when a display name cannot be used as is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum EntityCategory {
    Agent,
    Model,
    Tool,
    Chat,
    Flow,
}

impl EntityCategory {
    /// Identifier prefix for this category
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityCategory::Agent => "wa",
            EntityCategory::Model => "wm",
            EntityCategory::Tool => "wt",
            EntityCategory::Chat => "wc",
            EntityCategory::Flow => "wf",
        }
    }
}

// ============================================================================
// Graph Lookups
// ============================================================================

impl WorkflowGraph {
    /// Find an agent by id
    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Find a model by id
    pub fn model(&self, id: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Find a tool by id
    pub fn tool(&self, id: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.id == id)
    }
}

impl Agent {
    /// Ids of the agents this agent's definition refers to directly.
    ///
    /// Only group membership counts: nested chats and tool links are
    /// registered after every agent exists.
    pub fn definition_dependencies(&self) -> Vec<&str> {
        match (&self.kind, &self.group) {
            (AgentKind::GroupManager, Some(group)) => {
                group.members.iter().map(String::as_str).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl Tool {
    /// Name of the function the tool content defines.
    ///
    /// An explicit `functionName` wins; otherwise the first top-level
    /// `def <name>(` of the content is used. The result is not validated.
    pub fn function_name(&self) -> Option<&str> {
        match self.function_name.as_deref() {
            Some(name) => Some(name.trim()),
            None => self.content.lines().find_map(defined_function),
        }
    }
}

fn defined_function(line: &str) -> Option<&str> {
    let rest = line
        .strip_prefix("async def ")
        .or_else(|| line.strip_prefix("def "))?;
    let (name, _) = rest.split_once('(')?;
    Some(name.trim())
}

// ============================================================================
// Runtime Spellings
// ============================================================================

impl AgentKind {
    /// Runtime class constructing this kind of agent
    pub fn class_name(&self) -> &'static str {
        match self {
            AgentKind::Assistant => "AssistantAgent",
            AgentKind::UserProxy => "UserProxyAgent",
            AgentKind::GroupManager => "GroupChatManager",
        }
    }
}

impl HumanInputMode {
    /// Get as runtime string
    pub fn as_str(&self) -> &'static str {
        match self {
            HumanInputMode::Always => "ALWAYS",
            HumanInputMode::Terminate => "TERMINATE",
            HumanInputMode::Never => "NEVER",
        }
    }
}

impl SpeakerSelection {
    /// Get as runtime string
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakerSelection::Auto => "auto",
            SpeakerSelection::RoundRobin => "round_robin",
            SpeakerSelection::Random => "random",
            SpeakerSelection::Manual => "manual",
        }
    }
}

impl SummaryMethod {
    /// Get as runtime string
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryMethod::LastMsg => "last_msg",
            SummaryMethod::ReflectionWithLlm => "reflection_with_llm",
        }
    }
}

impl ApiType {
    /// Get as runtime string
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiType::Openai => "openai",
            ApiType::Azure => "azure",
            ApiType::Anthropic => "anthropic",
            ApiType::Google => "google",
            ApiType::Groq => "groq",
            ApiType::Mistral => "mistral",
            ApiType::Ollama => "ollama",
        }
    }

    /// Environment variable conventionally holding the API key.
    /// Local providers need none.
    pub fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            ApiType::Openai => Some("OPENAI_API_KEY"),
            ApiType::Azure => Some("AZURE_OPENAI_API_KEY"),
            ApiType::Anthropic => Some("ANTHROPIC_API_KEY"),
            ApiType::Google => Some("GOOGLE_API_KEY"),
            ApiType::Groq => Some("GROQ_API_KEY"),
            ApiType::Mistral => Some("MISTRAL_API_KEY"),
            ApiType::Ollama => None,
        }
    }
}

impl std::fmt::Display for ApiType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    fn sample() -> serde_json::Value {
        json!({
            "id": "flow-1",
            "name": "Support desk",
            "agents": [
                {"id": "a1", "name": "Helper", "kind": "assistant", "modelIds": ["m1"]},
                {"id": "a2", "name": "User", "kind": "user_proxy", "codeExecution": {}},
                {
                    "id": "a3",
                    "name": "Manager",
                    "kind": "group_manager",
                    "group": {"members": ["a1", "a2"]}
                }
            ],
            "models": [{"id": "m1", "name": "gpt", "model": "gpt-4o"}],
            "tools": [{"id": "t1", "name": "lookup", "content": "def lookup():\n    pass"}],
            "chats": [{"id": "c1", "name": "start", "sourceId": "a2", "targetId": "a3"}]
        })
    }

    #[test]
    fn test_parse_workflow_defaults() {
        let graph = parse_workflow_value(&sample()).unwrap();
        assert_eq!(graph.agents.len(), 3);
        assert_eq!(graph.agents[0].human_input_mode, HumanInputMode::Never);
        assert_eq!(graph.models[0].api_type, ApiType::Openai);
        assert_eq!(graph.chats[0].summary_method, SummaryMethod::LastMsg);
        assert!(graph.settings.cache_seed.is_none());

        let exec = graph.agents[1].code_execution.as_ref().unwrap();
        assert_eq!(exec.work_dir, "coding");
        assert_eq!(exec.timeout, 60);

        let group = graph.agents[2].group.as_ref().unwrap();
        assert_eq!(group.max_round, 20);
        assert_eq!(group.speaker_selection, SpeakerSelection::Auto);
    }

    #[test]
    fn test_parse_workflow_rejects_invalid_json() {
        let err = parse_workflow("{not json").unwrap_err();
        assert!(err.starts_with("Failed to parse workflow"));
    }

    #[test]
    fn test_lookups() {
        let graph = parse_workflow_value(&sample()).unwrap();
        assert_eq!(graph.agent("a3").unwrap().name, "Manager");
        assert!(graph.agent("missing").is_none());
        assert_eq!(graph.model("m1").unwrap().model, "gpt-4o");
        assert_eq!(graph.tool("t1").unwrap().function_name(), Some("lookup"));
    }

    #[test]
    fn test_function_name_from_content() {
        let tool = |value: serde_json::Value| -> Tool { serde_json::from_value(value).unwrap() };

        let derived = tool(json!({
            "id": "t", "name": "Weather Lookup",
            "content": "import json\n\nclass Helper:\n    def inner(self):\n        pass\n\nasync def weather_lookup(city):\n    return city"
        }));
        assert_eq!(derived.function_name(), Some("weather_lookup"));

        let explicit = tool(json!({
            "id": "t", "name": "Weather Lookup", "functionName": " get_weather ",
            "content": "def weather_lookup(city): pass"
        }));
        assert_eq!(explicit.function_name(), Some("get_weather"));

        let nested_only = tool(json!({
            "id": "t", "name": "Weather Lookup",
            "content": "if True:\n    def hidden(): pass"
        }));
        assert_eq!(nested_only.function_name(), None);
    }

    #[test]
    fn test_definition_dependencies_only_for_group_managers() {
        let graph = parse_workflow_value(&sample()).unwrap();
        assert!(graph.agents[0].definition_dependencies().is_empty());
        assert_eq!(graph.agents[2].definition_dependencies(), vec!["a1", "a2"]);
    }

    #[test]
    fn test_category_prefixes_are_distinct() {
        let prefixes: std::collections::HashSet<_> =
            EntityCategory::iter().map(|c| c.prefix()).collect();
        assert_eq!(prefixes.len(), 5);
        assert_eq!(EntityCategory::Agent.to_string(), "agent");
        assert_eq!(EntityCategory::Flow.as_ref(), "flow");
    }

    #[test]
    fn test_runtime_spellings() {
        assert_eq!(AgentKind::GroupManager.class_name(), "GroupChatManager");
        assert_eq!(HumanInputMode::Terminate.as_str(), "TERMINATE");
        assert_eq!(SpeakerSelection::RoundRobin.as_str(), "round_robin");
        assert_eq!(SummaryMethod::ReflectionWithLlm.as_str(), "reflection_with_llm");
        assert_eq!(ApiType::Ollama.default_api_key_env(), None);
        assert_eq!(ApiType::Anthropic.default_api_key_env(), Some("ANTHROPIC_API_KEY"));
    }
}
