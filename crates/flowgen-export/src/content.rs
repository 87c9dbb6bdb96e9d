// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Positioned content and producer results.
//!
//! A fragment is an opaque piece of program text plus the coordinates the
//! merger sorts by. Producers return their fragments, imports and
//! environment variable requirements bundled in an [`ExportResult`].

use serde::{Deserialize, Serialize};
use std::cell::Cell;

use crate::error::{ExportError, Result};
use crate::imports::{ImportOrigin, ImportStatement};

// ============================================================================
// Placement
// ============================================================================

/// Top-level region of the generated program, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    /// Header comments.
    Top,
    /// Import block and runtime setup.
    Imports,
    /// Tool functions.
    Tools,
    /// Model configurations.
    Models,
    /// Agent definitions and everything relative to them.
    Agents,
    /// Conversation entry point.
    Chats,
    /// Run invocation.
    Bottom,
}

impl Section {
    /// All sections in output order.
    pub const ALL: [Section; 7] = [
        Section::Top,
        Section::Imports,
        Section::Tools,
        Section::Models,
        Section::Agents,
        Section::Chats,
        Section::Bottom,
    ];
}

/// Placement inside [`Section::Agents`] relative to an agent definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubPosition {
    /// Before every agent definition.
    BeforeAll,
    /// Right before the owner's definition.
    Before,
    /// Spliced into the owner's constructor call.
    AsArgument,
    /// Right after the owner's definition.
    After,
    /// After every agent definition.
    AfterAll,
}

impl SubPosition {
    /// Whether this placement is relative to one owning entity.
    pub fn requires_owner(&self) -> bool {
        matches!(
            self,
            SubPosition::Before | SubPosition::AsArgument | SubPosition::After
        )
    }
}

/// A rendered fragment with its placement coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedContent {
    text: String,
    section: Section,
    sub_position: Option<SubPosition>,
    owner: Option<String>,
    order: i32,
    sequence: u64,
}

impl PositionedContent {
    /// Create a fragment, validating its placement.
    ///
    /// Fails when an owner-relative sub-position has no owner, or when a
    /// sub-position is used outside [`Section::Agents`].
    pub fn new(
        text: impl Into<String>,
        section: Section,
        sub_position: Option<SubPosition>,
        owner: Option<String>,
        order: i32,
        sequence: u64,
    ) -> Result<Self> {
        if let Some(position) = sub_position {
            if section != Section::Agents {
                return Err(ExportError::Placement {
                    section,
                    sub_position,
                    reason: "sub-positions are only valid in the agents section",
                });
            }
            if position.requires_owner() && owner.is_none() {
                return Err(ExportError::Placement {
                    section,
                    sub_position,
                    reason: "an owning entity is required",
                });
            }
        }
        Ok(Self {
            text: text.into(),
            section,
            sub_position,
            owner,
            order,
            sequence,
        })
    }

    /// The fragment text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Target section.
    pub fn section(&self) -> Section {
        self.section
    }

    /// Sub-position inside the agents section.
    pub fn sub_position(&self) -> Option<SubPosition> {
        self.sub_position
    }

    /// Owning entity id.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Explicit tie-break order.
    pub fn order(&self) -> i32 {
        self.order
    }

    /// Creation sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether this is an owner's definition (agents section, owner, no sub-position).
    pub fn is_definition(&self) -> bool {
        self.section == Section::Agents && self.sub_position.is_none() && self.owner.is_some()
    }
}

/// Monotonic per-run source of fragment sequence numbers.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    next: Cell<u64>,
}

impl SequenceCounter {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next sequence number.
    pub fn next(&self) -> u64 {
        let value = self.next.get();
        self.next.set(value + 1);
        value
    }

    /// Start building a fragment numbered by this counter.
    pub fn fragment(&self, text: impl Into<String>, section: Section) -> FragmentBuilder<'_> {
        FragmentBuilder {
            counter: self,
            text: text.into(),
            section,
            sub_position: None,
            owner: None,
            order: 0,
        }
    }
}

/// Builder for [`PositionedContent`]; the sequence number is taken on `build`.
#[derive(Debug)]
pub struct FragmentBuilder<'a> {
    counter: &'a SequenceCounter,
    text: String,
    section: Section,
    sub_position: Option<SubPosition>,
    owner: Option<String>,
    order: i32,
}

impl FragmentBuilder<'_> {
    /// Set the sub-position.
    pub fn sub_position(mut self, sub_position: SubPosition) -> Self {
        self.sub_position = Some(sub_position);
        self
    }

    /// Set the owning entity.
    pub fn owned_by(mut self, entity_id: impl Into<String>) -> Self {
        self.owner = Some(entity_id.into());
        self
    }

    /// Set the explicit order.
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Validate and number the fragment.
    pub fn build(self) -> Result<PositionedContent> {
        // Validate before numbering so a rejected fragment consumes nothing.
        PositionedContent::new(
            self.text,
            self.section,
            self.sub_position,
            self.owner,
            self.order,
            0,
        )
        .map(|mut fragment| {
            fragment.sequence = self.counter.next();
            fragment
        })
    }
}

// ============================================================================
// Environment variables
// ============================================================================

/// An environment variable the generated program reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    /// Variable name.
    pub name: String,
    /// Default or example value.
    pub value: String,
    /// What the variable is for.
    pub description: String,
    /// Whether the program fails without it.
    pub required: bool,
}

impl EnvVar {
    /// Create an environment variable requirement.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: description.into(),
            required,
        }
    }
}

/// Deduplicate by name, keeping first-seen order.
///
/// The first occurrence supplies value and description; `required` is set if
/// any occurrence requires the variable.
pub fn dedup_env_vars(vars: impl IntoIterator<Item = EnvVar>) -> Vec<EnvVar> {
    let mut result: Vec<EnvVar> = Vec::new();
    for var in vars {
        match result.iter_mut().find(|existing| existing.name == var.name) {
            Some(existing) => existing.required |= var.required,
            None => result.push(var),
        }
    }
    result
}

// ============================================================================
// Export results
// ============================================================================

/// Everything one producer contributes to an export.
#[derive(Debug, Clone, Default)]
pub struct ExportResult {
    /// Positioned fragments, in creation order.
    pub fragments: Vec<PositionedContent>,
    /// Import statements (duplicates allowed).
    pub imports: Vec<ImportStatement>,
    /// Environment variable requirements (duplicates allowed).
    pub env_vars: Vec<EnvVar>,
    /// A free-standing text block outside the program, such as a secrets loader.
    pub standalone_text: Option<String>,
}

impl ExportResult {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment.
    pub fn push(&mut self, fragment: PositionedContent) {
        self.fragments.push(fragment);
    }

    /// Append an import statement.
    pub fn import(&mut self, raw: impl Into<String>, origin: ImportOrigin) {
        self.imports.push(ImportStatement::new(raw, origin));
    }

    /// Append an environment variable requirement.
    pub fn env_var(&mut self, var: EnvVar) {
        self.env_vars.push(var);
    }

    /// Set the standalone text.
    pub fn set_standalone_text(&mut self, text: impl Into<String>) {
        self.standalone_text = Some(text.into());
    }

    /// Whether the result carries nothing.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
            && self.imports.is_empty()
            && self.env_vars.is_empty()
            && self.standalone_text.is_none()
    }

    /// Concatenate `other` after `self`.
    ///
    /// Lists are appended without reordering; two standalone texts are joined
    /// with one blank line.
    pub fn combine(mut self, other: ExportResult) -> ExportResult {
        self.fragments.extend(other.fragments);
        self.imports.extend(other.imports);
        self.env_vars.extend(other.env_vars);
        self.standalone_text = match (self.standalone_text, other.standalone_text) {
            (Some(left), Some(right)) => Some(format!("{}\n\n{}", left, right)),
            (left, right) => left.or(right),
        };
        self
    }

    /// Left fold of many results.
    pub fn fold(results: impl IntoIterator<Item = ExportResult>) -> ExportResult {
        results
            .into_iter()
            .fold(ExportResult::new(), ExportResult::combine)
    }
}
