// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Export orchestration.
//!
//! One call to [`export`] turns a workflow graph into a complete program:
//!
//! 1. Resolve identifiers for every entity (agents, models, tools, chats,
//!    the flow itself), then for helper variables.
//! 2. Register agents with the merger in definition order.
//! 3. Run the producers: tools, models, chats, then one per agent.
//! 4. Render the import block, add the envelope, render the program.
//!
//! All state lives in this call. Any error aborts the export.

use flowgen_dsl::{Agent, AgentKind, EntityCategory, WorkflowGraph};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span};

use crate::config::ExportConfig;
use crate::content::{EnvVar, ExportResult, Section, SequenceCounter, dedup_env_vars};
use crate::dependency_analysis::AgentDependencyGraph;
use crate::error::{ExportError, Result};
use crate::imports::{ImportOrigin, ImportRegistry};
use crate::merger::Merger;
use crate::naming::{DomainItem, NameRegistry, sanitize};
use crate::producers::{
    Producer, ProducerContext, executor_key, group_chat_key, template_env, tools,
};

/// Identifiers the program envelope defines or imports itself.
pub const ENVELOPE_NAMES: &[&str] = &[
    "main",
    "os",
    "logging",
    "register_function",
    "initiate_chats",
];

const LOGGING_BOOTSTRAP: &str = r#"logging.basicConfig(
    level=os.environ.get("LOG_LEVEL", "INFO"),
    format="%(asctime)s %(levelname)s %(name)s: %(message)s",
)"#;

const RUN_INVOCATION: &str = "if __name__ == \"__main__\":\n    main()";

/// Result of a successful export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutput {
    /// The complete program text.
    pub program: String,
    /// Resolved identifier of every entity and helper variable.
    pub names: NameRegistry,
    /// The rendered import block, as placed in the program.
    pub import_block: String,
    /// Environment variables the program reads, deduplicated by name.
    pub env_vars: Vec<EnvVar>,
    /// Free-standing text produced next to the program (the secrets loader).
    pub standalone_text: Option<String>,
    /// SHA-256 checksum of `program`, hex encoded.
    pub checksum: String,
}

/// Machine-readable summary of an export.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest<'a> {
    /// Entity id -> identifier.
    pub names: &'a NameRegistry,
    /// Environment variables the program reads.
    pub env_vars: &'a [EnvVar],
    /// The rendered import block.
    pub imports: &'a str,
    /// Program checksum.
    pub checksum: &'a str,
}

/// Files written by [`ExportOutput::write_to`].
#[derive(Debug, Clone)]
pub struct ExportArtifacts {
    /// The program file.
    pub program_path: PathBuf,
    /// The JSON manifest.
    pub manifest_path: PathBuf,
    /// The secrets loader, when the workflow has secrets.
    pub secrets_path: Option<PathBuf>,
}

impl ExportOutput {
    /// Manifest view of this output.
    pub fn manifest(&self) -> Manifest<'_> {
        Manifest {
            names: &self.names,
            env_vars: &self.env_vars,
            imports: &self.import_block,
            checksum: &self.checksum,
        }
    }

    /// Pretty-printed JSON manifest.
    pub fn manifest_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.manifest())
    }

    /// Write `<stem>.py`, `<stem>.manifest.json` and, if present,
    /// `<stem>_secrets.py` into `dir`.
    pub fn write_to(&self, dir: &Path, stem: &str) -> io::Result<ExportArtifacts> {
        fs::create_dir_all(dir)?;

        let program_path = dir.join(format!("{}.py", stem));
        fs::write(&program_path, &self.program)?;

        let manifest_path = dir.join(format!("{}.manifest.json", stem));
        let manifest = self.manifest_json().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to serialize manifest: {}", e),
            )
        })?;
        fs::write(&manifest_path, manifest)?;

        let secrets_path = match &self.standalone_text {
            Some(text) => {
                let path = dir.join(format!("{}_secrets.py", stem));
                fs::write(&path, with_newline(text))?;
                Some(path)
            }
            None => None,
        };

        Ok(ExportArtifacts {
            program_path,
            manifest_path,
            secrets_path,
        })
    }
}

/// Export a workflow graph to program text.
pub fn export(graph: &WorkflowGraph, config: &ExportConfig) -> Result<ExportOutput> {
    let span = info_span!("export", workflow = %graph.id);
    let _guard = span.enter();

    let names = resolve_names(graph, config)?;

    let order = AgentDependencyGraph::from_graph(graph).definition_order()?;
    let mut merger = Merger::new();
    for agent_id in &order {
        merger.register_agent(agent_id);
    }
    let agents: Vec<&Agent> = order.iter().filter_map(|id| graph.agent(id)).collect();

    let counter = SequenceCounter::new();
    let templates = template_env()?;
    let producers = [Producer::Tools, Producer::Models, Producer::Chats]
        .into_iter()
        .chain(agents.into_iter().map(Producer::Agent));

    let mut combined = ExportResult::new();
    for producer in producers {
        let result = {
            let ctx = ProducerContext::new(graph, config, &names, &merger, &counter, &templates);
            producer.produce(&ctx)?
        };
        validate_owners(&result, &names)?;
        merger.extend(result.fragments.iter().cloned())?;
        debug!(
            producer = producer.name(),
            fragments = result.fragments.len(),
            imports = result.imports.len(),
            env_vars = result.env_vars.len(),
            "producer finished"
        );
        combined = combined.combine(result);
    }

    let mut imports = ImportRegistry::new(config.runtime_package.as_str());
    imports.extend(combined.imports.iter().cloned());
    imports.add("import logging", ImportOrigin::Builtin);
    imports.add("import os", ImportOrigin::Builtin);
    let import_block = imports.render();

    let envelope = [
        counter.fragment(header(graph, config), Section::Top),
        counter.fragment(import_block.as_str(), Section::Imports),
        counter.fragment(LOGGING_BOOTSTRAP, Section::Imports).order(1),
        counter.fragment(RUN_INVOCATION, Section::Bottom),
    ];
    for fragment in envelope {
        merger.add(fragment.build()?)?;
    }
    combined.env_var(EnvVar::new(
        "LOG_LEVEL",
        "INFO",
        "Log level of the generated program",
        false,
    ));

    let program = merger.render();
    let checksum = format!("{:x}", Sha256::digest(program.as_bytes()));
    let env_vars = dedup_env_vars(combined.env_vars);

    info!(
        workflow = %graph.id,
        agents = order.len(),
        names = names.len(),
        program_bytes = program.len(),
        checksum = %checksum,
        "Workflow exported"
    );

    Ok(ExportOutput {
        program,
        names,
        import_block,
        env_vars,
        standalone_text: combined.standalone_text,
        checksum,
    })
}

/// Resolve every identifier of the run in the fixed traversal order.
///
/// Tool function names are reserved first: the tool content defines them
/// verbatim, so no entity may be resolved to one of them.
pub(crate) fn resolve_names(graph: &WorkflowGraph, config: &ExportConfig) -> Result<NameRegistry> {
    let reserved = ENVELOPE_NAMES
        .iter()
        .copied()
        .chain(std::iter::once(config.runtime_package.as_str()));
    let mut names = NameRegistry::with_reserved(reserved);
    let max_length = config.max_name_length;

    let mut functions = Vec::with_capacity(graph.tools.len());
    for tool in &graph.tools {
        let function = tools::function_name(tool)?;
        if names.is_taken(function) {
            return Err(ExportError::InvalidTool {
                tool_id: tool.id.clone(),
                reason: format!("function '{}' clashes with a name already in use", function),
            });
        }
        names.reserve(function);
        functions.push(function);
    }

    let agents_and_models = graph
        .agents
        .iter()
        .map(|a| DomainItem::new(&a.id, &a.name, EntityCategory::Agent))
        .chain(
            graph
                .models
                .iter()
                .map(|m| DomainItem::new(&m.id, &m.name, EntityCategory::Model)),
        );
    for item in agents_and_models {
        names.resolve_item(&item, max_length)?;
    }

    let tool_prefix = EntityCategory::Tool.prefix();
    for (tool, function) in graph.tools.iter().zip(functions) {
        // A tool named after its own function needs no alias
        if sanitize(&tool.name, tool_prefix, max_length) == function {
            names.bind(&tool.id, function, EntityCategory::Tool)?;
        } else {
            names.resolve_item(
                &DomainItem::new(&tool.id, &tool.name, EntityCategory::Tool),
                max_length,
            )?;
        }
    }

    let chats_and_flow = graph
        .chats
        .iter()
        .map(|c| DomainItem::new(&c.id, &c.name, EntityCategory::Chat))
        .chain(std::iter::once(DomainItem::new(
            &graph.id,
            &graph.name,
            EntityCategory::Flow,
        )));
    for item in chats_and_flow {
        names.resolve_item(&item, max_length)?;
    }

    let prefix = EntityCategory::Agent.prefix();
    for agent in &graph.agents {
        let base = names
            .get(&agent.id)
            .ok_or_else(|| ExportError::unknown(&agent.id))?
            .to_string();
        if agent.code_execution.is_some() {
            let proposed = format!("{}_executor", base);
            names.resolve(&executor_key(&agent.id), &proposed, prefix, max_length)?;
        }
        if agent.kind == AgentKind::GroupManager {
            let proposed = format!("{}_group_chat", base);
            names.resolve(&group_chat_key(&agent.id), &proposed, prefix, max_length)?;
        }
    }

    debug!(names = names.len(), "identifiers resolved");
    Ok(names)
}

/// Every owner named by a producer must have a resolved identifier.
fn validate_owners(result: &ExportResult, names: &NameRegistry) -> Result<()> {
    match result
        .fragments
        .iter()
        .filter_map(|f| f.owner())
        .find(|owner| names.get(owner).is_none())
    {
        Some(owner) => Err(ExportError::unknown(owner)),
        None => Ok(()),
    }
}

fn header(graph: &WorkflowGraph, config: &ExportConfig) -> String {
    let mut lines = vec![format!("# {}", graph.name.trim())];
    if let Some(description) = graph.description.as_deref().filter(|d| !d.trim().is_empty()) {
        lines.push("#".to_string());
        lines.extend(description.trim().lines().map(|line| {
            let line = line.trim_end();
            if line.is_empty() {
                "#".to_string()
            } else {
                format!("# {}", line)
            }
        }));
    }
    lines.push("#".to_string());
    lines.push(format!("# Requires the `{}` package.", config.runtime_package));
    lines.join("\n")
}

fn with_newline(text: &str) -> String {
    format!("{}\n", text.trim_end())
}
