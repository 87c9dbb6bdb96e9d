// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fragment merging and final rendering.
//!
//! The merger puts every fragment of an export into one total order and
//! renders the sectioned program text. Inside the agents section the order
//! follows the registered agent definition order:
//!
//! ```text
//! BEFORE_ALL ...
//! BEFORE(a1)  definition(a1)  AFTER(a1)
//! BEFORE(a2)  definition(a2)  AFTER(a2)
//! unowned agent fragments
//! AFTER_ALL ...
//! ```
//!
//! `AS_ARGUMENT` fragments never appear in the running text; they are
//! returned by [`Merger::arguments_for`] to the producer rendering the
//! owner's constructor call.

use std::collections::HashMap;

use crate::content::{PositionedContent, Section, SubPosition};
use crate::error::{ExportError, Result};

/// Sort key: `(section, band, definition_index, slot, order, sequence)`.
type SortKey = (Section, u8, usize, u8, i32, u64);

/// Collects fragments and renders them in their final order.
#[derive(Debug, Default)]
pub struct Merger {
    /// Agent id -> definition index
    agents: HashMap<String, usize>,
    /// Fragments of the running text
    fragments: Vec<PositionedContent>,
    /// AS_ARGUMENT fragments per owning agent
    arguments: HashMap<String, Vec<PositionedContent>>,
}

impl Merger {
    /// Create an empty merger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the next agent in definition order. Re-registering is a no-op.
    pub fn register_agent(&mut self, entity_id: &str) {
        let next = self.agents.len();
        self.agents.entry(entity_id.to_string()).or_insert(next);
    }

    /// Definition index of a registered agent.
    pub fn definition_index(&self, entity_id: &str) -> Option<usize> {
        self.agents.get(entity_id).copied()
    }

    /// Add one fragment.
    ///
    /// An agents-section fragment with an owner requires that owner to be a
    /// registered agent.
    pub fn add(&mut self, fragment: PositionedContent) -> Result<()> {
        if fragment.section() == Section::Agents
            && let Some(owner) = fragment.owner()
            && !self.agents.contains_key(owner)
        {
            return Err(ExportError::MergeInvariant {
                entity_id: owner.to_string(),
                operation: "add agent fragment",
            });
        }

        match (fragment.sub_position(), fragment.owner()) {
            (Some(SubPosition::AsArgument), Some(owner)) => {
                self.arguments
                    .entry(owner.to_string())
                    .or_default()
                    .push(fragment);
            }
            _ => self.fragments.push(fragment),
        }
        Ok(())
    }

    /// Add many fragments, stopping at the first error.
    pub fn extend(&mut self, fragments: impl IntoIterator<Item = PositionedContent>) -> Result<()> {
        for fragment in fragments {
            self.add(fragment)?;
        }
        Ok(())
    }

    /// Argument texts for an agent's constructor call, in `(order, sequence)` order.
    pub fn arguments_for(&self, entity_id: &str) -> Result<Vec<&str>> {
        if !self.agents.contains_key(entity_id) {
            return Err(ExportError::MergeInvariant {
                entity_id: entity_id.to_string(),
                operation: "arguments_for",
            });
        }
        let Some(arguments) = self.arguments.get(entity_id) else {
            return Ok(Vec::new());
        };
        let mut sorted: Vec<&PositionedContent> = arguments.iter().collect();
        sorted.sort_by_key(|f| (f.order(), f.sequence()));
        Ok(sorted
            .into_iter()
            .map(|f| clean(f.text()))
            .filter(|text| !text.is_empty())
            .collect())
    }

    /// Number of fragments in the running text.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Whether no running-text fragment has been added.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Running-text fragments in final order.
    pub fn sorted(&self) -> Vec<&PositionedContent> {
        let mut sorted: Vec<&PositionedContent> = self.fragments.iter().collect();
        sorted.sort_by_key(|f| self.sort_key(f));
        sorted
    }

    /// Render the final program text.
    pub fn render(&self) -> String {
        let sorted = self.sorted();
        let sections: Vec<String> = Section::ALL
            .iter()
            .filter_map(|section| {
                let texts: Vec<&str> = sorted
                    .iter()
                    .filter(|f| f.section() == *section)
                    .map(|f| clean(f.text()))
                    .filter(|text| !text.is_empty())
                    .collect();
                (!texts.is_empty()).then(|| texts.join("\n\n"))
            })
            .collect();

        let mut program = sections.join("\n\n");
        program.push('\n');
        program
    }

    fn sort_key(&self, fragment: &PositionedContent) -> SortKey {
        let section = fragment.section();
        let order = fragment.order();
        let sequence = fragment.sequence();
        if section != Section::Agents {
            return (section, 0, 0, 0, order, sequence);
        }

        let index = fragment
            .owner()
            .and_then(|owner| self.definition_index(owner))
            .unwrap_or(usize::MAX);
        let (band, index, slot) = match fragment.sub_position() {
            Some(SubPosition::BeforeAll) => (0, 0, 0),
            Some(SubPosition::Before) => (1, index, 0),
            None | Some(SubPosition::AsArgument) => (1, index, 1),
            Some(SubPosition::After) => (1, index, 2),
            Some(SubPosition::AfterAll) => (2, 0, 0),
        };
        (section, band, index, slot, order, sequence)
    }
}

/// Strip leading blank lines and trailing whitespace.
fn clean(text: &str) -> &str {
    let text = text.trim_end();
    let mut start = 0;
    for line in text.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        start += line.len();
    }
    &text[start..]
}
