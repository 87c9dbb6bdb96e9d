// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Content producers.
//!
//! Each producer renders the fragments for one category of entity and
//! returns them, with their imports and environment variables, as an
//! [`ExportResult`]. The text itself comes from minijinja templates; nothing
//! downstream inspects it.

pub mod agents;
pub mod chats;
pub mod models;
pub mod tools;

use flowgen_dsl::{Agent, WorkflowGraph};
use minijinja::Environment;
use serde::Serialize;

use crate::config::ExportConfig;
use crate::content::{ExportResult, FragmentBuilder, Section, SequenceCounter};
use crate::error::{ExportError, Result};
use crate::merger::Merger;
use crate::naming::NameRegistry;

/// Order of nested-chat registrations after all agents.
pub const NESTED_CHAT_ORDER: i32 = 10;

/// Order of tool registrations after all agents.
pub const TOOL_REGISTRATION_ORDER: i32 = 20;

/// Registry key of an agent's code executor variable.
pub fn executor_key(agent_id: &str) -> String {
    format!("{}#executor", agent_id)
}

/// Registry key of a group manager's group chat variable.
pub fn group_chat_key(agent_id: &str) -> String {
    format!("{}#group_chat", agent_id)
}

/// One content producer invocation.
#[derive(Debug, Clone, Copy)]
pub enum Producer<'a> {
    /// Tool functions and their registrations.
    Tools,
    /// Model configurations and per-agent LLM arguments.
    Models,
    /// The conversation entry point.
    Chats,
    /// Everything defined in one agent's block.
    Agent(&'a Agent),
}

impl Producer<'_> {
    /// Producer name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Producer::Tools => "tools",
            Producer::Models => "models",
            Producer::Chats => "chats",
            Producer::Agent(_) => "agent",
        }
    }

    /// Render this producer's contribution.
    pub fn produce(&self, ctx: &ProducerContext<'_>) -> Result<ExportResult> {
        match self {
            Producer::Tools => tools::produce(ctx),
            Producer::Models => models::produce(ctx),
            Producer::Chats => chats::produce(ctx),
            Producer::Agent(agent) => agents::produce(agent, ctx),
        }
    }
}

/// Read-only view of an export run handed to producers.
pub struct ProducerContext<'a> {
    graph: &'a WorkflowGraph,
    config: &'a ExportConfig,
    names: &'a NameRegistry,
    merger: &'a Merger,
    counter: &'a SequenceCounter,
    templates: &'a Environment<'static>,
}

impl<'a> ProducerContext<'a> {
    /// Create a context over the run's state.
    pub fn new(
        graph: &'a WorkflowGraph,
        config: &'a ExportConfig,
        names: &'a NameRegistry,
        merger: &'a Merger,
        counter: &'a SequenceCounter,
        templates: &'a Environment<'static>,
    ) -> Self {
        Self {
            graph,
            config,
            names,
            merger,
            counter,
            templates,
        }
    }

    /// The workflow being exported.
    pub fn graph(&self) -> &'a WorkflowGraph {
        self.graph
    }

    /// The export configuration.
    pub fn config(&self) -> &'a ExportConfig {
        self.config
    }

    /// Resolved identifier of an entity.
    pub fn name_of(&self, entity_id: &str) -> Result<&'a str> {
        self.names
            .get(entity_id)
            .ok_or_else(|| ExportError::unknown(entity_id))
    }

    /// Argument texts other producers placed for an agent's constructor.
    pub fn arguments_for(&self, agent_id: &str) -> Result<Vec<&'a str>> {
        self.merger.arguments_for(agent_id)
    }

    /// Start a fragment numbered by the run's sequence counter.
    pub fn fragment(&self, text: impl Into<String>, section: Section) -> FragmentBuilder<'a> {
        self.counter.fragment(text, section)
    }

    /// Import line for symbols of the runtime package (or one of its submodules).
    pub fn runtime_import(&self, submodule: Option<&str>, symbol: &str) -> String {
        match submodule {
            Some(sub) => format!(
                "from {}.{} import {}",
                self.config.runtime_package, sub, symbol
            ),
            None => format!("from {} import {}", self.config.runtime_package, symbol),
        }
    }

    /// Render a registered template, without trailing whitespace.
    pub fn render<S: Serialize>(&self, template: &str, context: S) -> Result<String> {
        self.templates
            .get_template(template)
            .and_then(|t| t.render(context))
            .map(|text| text.trim_end().to_string())
            .map_err(|source| ExportError::Template {
                template: template.to_string(),
                source,
            })
    }
}

/// Build the template environment with every producer template registered.
pub fn template_env() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_filter("pystr", pystr);

    let templates = tools::TEMPLATES
        .iter()
        .chain(models::TEMPLATES)
        .chain(chats::TEMPLATES)
        .chain(agents::TEMPLATES);
    for &(name, text) in templates {
        env.add_template(name, text)
            .map_err(|source| ExportError::Template {
                template: name.to_string(),
                source,
            })?;
    }
    Ok(env)
}

/// Double-quoted string literal of the target language.
pub fn pystr(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Literal for a float, always carrying a decimal point.
pub(crate) fn pyfloat(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Indent every non-blank line by `width` spaces.
pub(crate) fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Everything a producer test needs, owned in one place.
    pub struct Harness {
        pub graph: WorkflowGraph,
        pub config: ExportConfig,
        pub names: NameRegistry,
        pub merger: Merger,
        pub counter: SequenceCounter,
        pub templates: Environment<'static>,
    }

    impl Harness {
        pub fn new(graph: serde_json::Value) -> Self {
            let graph = flowgen_dsl::parse_workflow_value(&graph).unwrap();
            let config = ExportConfig::default();
            let names = crate::export::resolve_names(&graph, &config).unwrap();
            let mut merger = Merger::new();
            for agent in &graph.agents {
                merger.register_agent(&agent.id);
            }
            Self {
                graph,
                config,
                names,
                merger,
                counter: SequenceCounter::new(),
                templates: template_env().unwrap(),
            }
        }

        pub fn ctx(&self) -> ProducerContext<'_> {
            ProducerContext::new(
                &self.graph,
                &self.config,
                &self.names,
                &self.merger,
                &self.counter,
                &self.templates,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pystr_escapes() {
        assert_eq!(pystr("plain"), "\"plain\"");
        assert_eq!(pystr("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
        assert_eq!(pystr("C:\\tmp\t"), "\"C:\\\\tmp\\t\"");
        assert_eq!(pystr("\u{7}"), "\"\\x07\"");
        assert_eq!(pystr("żółw"), "\"żółw\"");
    }

    #[test]
    fn test_pyfloat() {
        assert_eq!(pyfloat(1.0), "1.0");
        assert_eq!(pyfloat(0.0), "0.0");
        assert_eq!(pyfloat(0.25), "0.25");
    }

    #[test]
    fn test_indent_skips_blank_lines() {
        assert_eq!(indent("a=1\n\nb={\n    c\n}", 4), "    a=1\n\n    b={\n        c\n    }");
    }

    #[test]
    fn test_template_env_registers_every_template() {
        let env = template_env().unwrap();
        for (name, _) in tools::TEMPLATES
            .iter()
            .chain(models::TEMPLATES)
            .chain(chats::TEMPLATES)
            .chain(agents::TEMPLATES)
        {
            assert!(env.get_template(name).is_ok(), "missing template {name}");
        }
    }

    #[test]
    fn test_unknown_template_is_a_template_error() {
        let harness = test_support::Harness::new(serde_json::json!({"id": "wf", "name": "Flow"}));
        let err = harness.ctx().render("no_such_template", ()).unwrap_err();
        assert_eq!(err.code(), "TEMPLATE_ERROR");
    }

    #[test]
    fn test_name_of_unknown_id() {
        let harness = test_support::Harness::new(serde_json::json!({"id": "wf", "name": "Flow"}));
        let err = harness.ctx().name_of("ghost").unwrap_err();
        assert!(matches!(err, ExportError::UnknownEntityReference { .. }));
    }
}
