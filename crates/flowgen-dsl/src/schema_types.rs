// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow graph type definitions.
//!
//! These types describe the declarative input of an export: the agents,
//! models, tools and chats of one workflow plus their cross-references by id.
//! They are used by:
//! 1. The exporter - for type-safe access to the workflow structure
//! 2. The CLI - for deserializing workflow JSON
//! 3. `workflow_schema()` - for generating the JSON Schema via schemars

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// DSL version - bump when making breaking changes
pub const DSL_VERSION: &str = "1.0.0";

// ============================================================================
// Root Types
// ============================================================================

/// A complete workflow definition
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowGraph {
    /// Stable identifier of the workflow
    pub id: String,

    /// Human-readable name of the workflow
    pub name: String,

    /// Detailed description of what the workflow does
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Free-form tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Agents taking part in the workflow
    #[serde(default)]
    pub agents: Vec<Agent>,

    /// Model configurations referenced by agents
    #[serde(default)]
    pub models: Vec<Model>,

    /// Tools that agents can call
    #[serde(default)]
    pub tools: Vec<Tool>,

    /// Conversations started when the workflow runs, in order
    #[serde(default)]
    pub chats: Vec<Chat>,

    /// Flow-wide settings
    #[serde(default)]
    pub settings: FlowSettings,
}

/// Flow-wide settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlowSettings {
    /// Seed for the runtime's LLM response cache (None disables caching)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_seed: Option<u64>,
}

// ============================================================================
// Agents
// ============================================================================

/// One agent of the workflow
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Unique agent identifier
    pub id: String,

    /// Display name (free-form)
    pub name: String,

    /// Agent flavour
    pub kind: AgentKind,

    /// Description other agents see
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// System prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,

    /// When the agent asks a human for input
    #[serde(default)]
    pub human_input_mode: HumanInputMode,

    /// Maximum number of consecutive automatic replies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_consecutive_auto_reply: Option<u32>,

    /// Local code execution settings (absent = no code execution)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_execution: Option<CodeExecution>,

    /// Ids of the models this agent uses, in priority order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub model_ids: Vec<String>,

    /// Tools this agent can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolLink>,

    /// Conversations this agent hands off to when triggered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested_chats: Option<NestedChats>,

    /// Group chat settings (group managers only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupSettings>,
}

/// Agent flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// LLM-backed assistant
    Assistant,
    /// Proxy for a human user, usually the code executor
    UserProxy,
    /// Manager of a group chat
    GroupManager,
}

/// When an agent asks for human input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HumanInputMode {
    /// Every turn
    Always,
    /// Only when a termination message is received
    Terminate,
    /// Never
    #[default]
    Never,
}

/// Local code execution settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CodeExecution {
    /// Working directory for executed code
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    /// Timeout in seconds for one execution
    #[serde(default = "default_timeout")]
    pub timeout: u32,
}

fn default_work_dir() -> String {
    "coding".to_string()
}

fn default_timeout() -> u32 {
    60
}

/// A tool made available to an agent
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolLink {
    /// Id of the tool
    pub tool_id: String,

    /// Id of the agent that executes the tool calls
    pub executor_id: String,
}

/// Nested conversations an agent starts when triggered
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NestedChats {
    /// Ids of the agents whose messages trigger the nested chats
    #[serde(default)]
    pub triggers: Vec<String>,

    /// The chat queue
    #[serde(default)]
    pub chats: Vec<NestedChat>,
}

/// One entry of a nested chat queue
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NestedChat {
    /// Id of the agent receiving the nested chat
    pub recipient_id: String,

    /// Opening message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// How the chat is summarized
    #[serde(default)]
    pub summary_method: SummaryMethod,

    /// Turn limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
}

/// Group chat settings of a group manager
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupSettings {
    /// Ids of the member agents, in speaking order
    pub members: Vec<String>,

    /// Maximum number of rounds
    #[serde(default = "default_max_round")]
    pub max_round: u32,

    /// How the next speaker is chosen
    #[serde(default)]
    pub speaker_selection: SpeakerSelection,
}

fn default_max_round() -> u32 {
    20
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            max_round: default_max_round(),
            speaker_selection: SpeakerSelection::default(),
        }
    }
}

/// Speaker selection method of a group chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerSelection {
    /// The manager's LLM picks
    #[default]
    Auto,
    /// Members speak in turn
    RoundRobin,
    /// Random member
    Random,
    /// A human picks
    Manual,
}

// ============================================================================
// Models
// ============================================================================

/// A model configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique model identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Provider-side model name (e.g. "gpt-4o")
    pub model: String,

    /// Provider API flavour
    #[serde(default)]
    pub api_type: ApiType,

    /// Custom endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Environment variable holding the API key (defaults per api type)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Completion token limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Provider API flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApiType {
    #[default]
    Openai,
    Azure,
    Anthropic,
    Google,
    Groq,
    Mistral,
    Ollama,
}

// ============================================================================
// Tools
// ============================================================================

/// A tool implemented as a function in the target language
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Unique tool identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Description shown to the calling model
    #[serde(default)]
    pub description: String,

    /// Name of the function defined in `content` (defaults to its first top-level `def`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,

    /// Source text of the tool, including its own imports
    pub content: String,

    /// Secrets the tool reads from the environment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, String>,
}

// ============================================================================
// Chats
// ============================================================================

/// A conversation between two agents
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    /// Unique chat identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Id of the agent starting the chat
    pub source_id: String,

    /// Id of the agent receiving the first message
    pub target_id: String,

    /// Opening message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Turn limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,

    /// How the chat is summarized
    #[serde(default)]
    pub summary_method: SummaryMethod,
}

/// How a finished chat is summarized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMethod {
    /// Last message of the chat
    #[default]
    LastMsg,
    /// Ask the LLM to reflect on the conversation
    ReflectionWithLlm,
}
