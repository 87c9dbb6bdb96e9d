// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Flowgen Export - Workflow Graphs to Runnable Programs
//!
//! This crate turns a declarative multi-agent workflow (agents, models, tools,
//! chats) into a single program for an agent orchestration runtime
//! (by default the `autogen` package).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Export Pipeline                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//!
//!     ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//!     │  Workflow   │      │  Producers  │      │   Merger    │
//!     │   Graph     │─────▶│ (fragments) │─────▶│  (render)   │
//!     │  (JSON)     │      │             │      │             │
//!     └─────────────┘      └─────────────┘      └─────────────┘
//!           │                    ▲                    │
//!           ▼                    │                    ▼
//!     ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//!     │ Identifier  │      │   Import    │      │   Program   │
//!     │  Resolver   │      │  Registry   │      │    Text     │
//!     └─────────────┘      └─────────────┘      └─────────────┘
//! ```
//!
//! # Export Pipeline
//!
//! 1. **Resolve**: Give every entity a unique, valid identifier
//! 2. **Order**: Put agent definitions in dependency order (group members first)
//! 3. **Produce**: Render fragments for tools, models, chats and each agent
//! 4. **Merge**: Sort fragments into sections and relative to their agents
//! 5. **Render**: Emit the import block, envelope and final program
//!
//! # Usage
//!
//! ```
//! use flowgen_export::{ExportConfig, export};
//!
//! let graph = flowgen_dsl::parse_workflow(
//!     r#"{"id": "wf", "name": "Hello", "agents": [
//!         {"id": "a", "name": "Assistant", "kind": "assistant"}
//!     ]}"#,
//! )
//! .unwrap();
//!
//! let output = export(&graph, &ExportConfig::default()).unwrap();
//! assert!(output.program.contains("assistant = AssistantAgent("));
//! assert_eq!(output.checksum.len(), 64);
//! ```
//!
//! # Important Notes
//!
//! - Fragments are opaque text. Nothing here parses or executes the output.
//! - The graph is assumed valid; a dangling id aborts the export with
//!   [`ExportError::UnknownEntityReference`].
//! - Every export owns its state, so exports on separate threads need no
//!   coordination.

#![deny(missing_docs)]

/// Export configuration from the environment.
pub mod config;

/// Positioned fragments and producer results.
pub mod content;

/// Definition order of agents.
pub mod dependency_analysis;

/// Error types.
pub mod error;

/// Export orchestration.
pub mod export;

/// Import statement aggregation.
pub mod imports;

/// Fragment ordering and rendering.
pub mod merger;

/// Identifier resolution.
pub mod naming;

/// Reference content producers.
pub mod producers;

// Re-export main types
pub use config::{ConfigError, ExportConfig};
pub use content::{
    EnvVar, ExportResult, FragmentBuilder, PositionedContent, Section, SequenceCounter,
    SubPosition, dedup_env_vars,
};
pub use dependency_analysis::AgentDependencyGraph;
pub use error::{ExportError, Result};
pub use export::{ExportArtifacts, ExportOutput, Manifest, export};
pub use imports::{ImportForm, ImportOrigin, ImportRegistry, ImportStatement};
pub use merger::Merger;
pub use naming::{DomainItem, NameRegistry};
pub use producers::{Producer, ProducerContext};

// Re-export DSL types for convenience
pub use flowgen_dsl::{WorkflowGraph, parse_workflow};
