// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for flowgen-export.
//!
//! Every variant is an integration error raised by a misbehaving producer or
//! an inconsistent graph. None is transient: the export that raised it is
//! aborted and no partial output is returned.

use crate::content::{Section, SubPosition};

/// Result type using ExportError
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors that can occur while composing an export.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExportError {
    /// No unused integer suffix could be found for an identifier.
    #[error("could not find a free identifier for '{entity_id}' (proposed '{proposed}')")]
    Naming {
        /// The entity being named.
        entity_id: String,
        /// The display name it proposed.
        proposed: String,
    },

    /// A fragment was constructed with inconsistent placement metadata.
    #[error("invalid placement {sub_position:?} in section {section:?}: {reason}")]
    Placement {
        /// Section the fragment targeted.
        section: Section,
        /// Sub-position the fragment requested.
        sub_position: Option<SubPosition>,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A fragment or producer referenced an id that has no resolved name.
    #[error("unknown entity reference '{entity_id}'")]
    UnknownEntityReference {
        /// The id that was referenced.
        entity_id: String,
    },

    /// An agent-relative operation targeted an id that is not a registered agent.
    #[error("'{entity_id}' is not a registered agent: {operation}")]
    MergeInvariant {
        /// The id that was used.
        entity_id: String,
        /// The operation that required an agent.
        operation: &'static str,
    },

    /// A tool's function cannot be bound to an identifier in the program.
    #[error("tool '{tool_id}' is unusable: {reason}")]
    InvalidTool {
        /// The tool being exported.
        tool_id: String,
        /// What is wrong with its function.
        reason: String,
    },

    /// Group membership forms a cycle, so no definition order exists.
    #[error("cyclic agent definitions: {}", agents.join(" -> "))]
    CyclicDefinition {
        /// Agents taking part in the cycle.
        agents: Vec<String>,
    },

    /// A producer template failed to load or render.
    #[error("template '{template}' failed: {source}")]
    Template {
        /// The template name.
        template: String,
        /// The underlying template error.
        #[source]
        source: minijinja::Error,
    },
}

impl ExportError {
    /// Short machine-readable code for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            ExportError::Naming { .. } => "NAMING_ERROR",
            ExportError::Placement { .. } => "PLACEMENT_ERROR",
            ExportError::UnknownEntityReference { .. } => "UNKNOWN_ENTITY_REFERENCE",
            ExportError::MergeInvariant { .. } => "MERGE_INVARIANT",
            ExportError::InvalidTool { .. } => "INVALID_TOOL",
            ExportError::CyclicDefinition { .. } => "CYCLIC_DEFINITION",
            ExportError::Template { .. } => "TEMPLATE_ERROR",
        }
    }

    pub(crate) fn unknown(entity_id: &str) -> Self {
        ExportError::UnknownEntityReference {
            entity_id: entity_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = ExportError::unknown("agent-9");
        assert_eq!(err.to_string(), "unknown entity reference 'agent-9'");
        assert_eq!(err.code(), "UNKNOWN_ENTITY_REFERENCE");

        let err = ExportError::CyclicDefinition {
            agents: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic agent definitions: a -> b -> a");

        let err = ExportError::Placement {
            section: Section::Agents,
            sub_position: Some(SubPosition::Before),
            reason: "an owning entity is required",
        };
        assert!(err.to_string().contains("Before"));
        assert_eq!(err.code(), "PLACEMENT_ERROR");

        let err = ExportError::InvalidTool {
            tool_id: "t1".into(),
            reason: "no function name".into(),
        };
        assert_eq!(err.to_string(), "tool 't1' is unusable: no function name");
        assert_eq!(err.code(), "INVALID_TOOL");
    }
}
