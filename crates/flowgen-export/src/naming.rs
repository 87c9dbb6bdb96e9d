// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Identifier resolution for workflow entities.
//!
//! Every agent, model, tool, chat and the flow itself gets one short,
//! lowercase identifier derived from its display name. Identifiers share a
//! single namespace across categories and are assigned once per export run.

use flowgen_dsl::EntityCategory;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use crate::error::{ExportError, Result};

/// Multi-character operators replaced by words before sanitizing.
const OPERATOR_WORDS: [(&str, &str); 4] = [("->", "to"), ("=>", "to"), ("<-", "from"), ("<=", "from")];

/// Hard keywords of the target language. None of them can be an identifier.
pub const RESERVED_KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

/// An entity to be named.
#[derive(Debug, Clone, Copy)]
pub struct DomainItem<'a> {
    /// Id the entity is referenced by.
    pub stable_id: &'a str,
    /// Free-form display name.
    pub proposed_name: &'a str,
    /// Entity category, which decides the fallback prefix.
    pub category: EntityCategory,
}

impl<'a> DomainItem<'a> {
    /// Create a new domain item.
    pub fn new(stable_id: &'a str, proposed_name: &'a str, category: EntityCategory) -> Self {
        Self {
            stable_id,
            proposed_name,
            category,
        }
    }
}

/// Mapping from entity id to resolved identifier.
///
/// The mapping is injective: a name is never handed out twice, and names in
/// the reserved set are never handed out at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameRegistry {
    names: BTreeMap<String, String>,
    categories: HashMap<String, EntityCategory>,
    taken: HashSet<String>,
}

impl NameRegistry {
    /// Create an empty registry with nothing reserved.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with the language keywords and the given
    /// names reserved.
    pub fn with_reserved<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for keyword in RESERVED_KEYWORDS {
            registry.reserve(*keyword);
        }
        for name in reserved {
            registry.reserve(name);
        }
        registry
    }

    /// Mark a name as unavailable without assigning it to any id.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.taken.insert(name.into());
    }

    /// Whether a name is assigned or reserved.
    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    /// Resolve a name for `id` from `proposed_name`.
    ///
    /// Returns the stored name unchanged if `id` was resolved before.
    pub fn resolve(
        &mut self,
        id: &str,
        proposed_name: &str,
        category_prefix: &str,
        max_length: usize,
    ) -> Result<String> {
        self.resolve_with(id, proposed_name, category_prefix, None, max_length)
    }

    /// Assign `name` verbatim to `id`, even when it is reserved.
    ///
    /// Used for names the program already defines for the entity itself.
    /// Fails when the name is not an identifier or another id holds it.
    pub fn bind(&mut self, id: &str, name: &str, category: EntityCategory) -> Result<String> {
        if let Some(existing) = self.names.get(id) {
            return Ok(existing.clone());
        }
        if !is_valid_identifier(name) || self.names.values().any(|held| held == name) {
            return Err(ExportError::Naming {
                entity_id: id.to_string(),
                proposed: name.to_string(),
            });
        }
        debug!(entity_id = id, name = name, "bound identifier");
        self.taken.insert(name.to_string());
        self.names.insert(id.to_string(), name.to_string());
        self.categories.insert(id.to_string(), category);
        Ok(name.to_string())
    }

    /// Resolve a name for a domain item using its category prefix.
    pub fn resolve_item(&mut self, item: &DomainItem<'_>, max_length: usize) -> Result<String> {
        self.resolve_with(
            item.stable_id,
            item.proposed_name,
            item.category.prefix(),
            Some(item.category),
            max_length,
        )
    }

    fn resolve_with(
        &mut self,
        id: &str,
        proposed_name: &str,
        prefix: &str,
        category: Option<EntityCategory>,
        max_length: usize,
    ) -> Result<String> {
        if let Some(existing) = self.names.get(id) {
            return Ok(existing.clone());
        }

        let sanitized = sanitize(proposed_name, prefix, max_length);
        if sanitized.is_empty() {
            return Err(ExportError::Naming {
                entity_id: id.to_string(),
                proposed: proposed_name.to_string(),
            });
        }
        let name = if !self.is_taken(&sanitized) {
            sanitized
        } else {
            let prefixed = truncate(&format!("{}_{}", prefix, sanitized), max_length).to_string();
            if !self.is_taken(&prefixed) {
                prefixed
            } else {
                self.first_free_suffix(&prefixed, max_length)
                    .ok_or_else(|| ExportError::Naming {
                        entity_id: id.to_string(),
                        proposed: proposed_name.to_string(),
                    })?
            }
        };

        debug!(entity_id = id, proposed = proposed_name, name = %name, "resolved identifier");
        self.taken.insert(name.clone());
        self.names.insert(id.to_string(), name.clone());
        if let Some(category) = category {
            self.categories.insert(id.to_string(), category);
        }
        Ok(name)
    }

    /// Smallest `base_<n>` that is free, truncating `base` so the result fits.
    fn first_free_suffix(&self, base: &str, max_length: usize) -> Option<String> {
        // Each n yields a distinct candidate, so this many tries always
        // include a free one unless the suffix no longer fits.
        let bound = self.taken.len() + 2;
        for n in 1..=bound {
            let suffix = format!("_{}", n);
            let room = max_length.saturating_sub(suffix.len());
            if room == 0 {
                return None;
            }
            let candidate = format!("{}{}", truncate(base, room), suffix);
            if !self.is_taken(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Resolved name of `id`, if any.
    pub fn get(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Category `id` was resolved under, if it was resolved as a domain item.
    pub fn category(&self, id: &str) -> Option<EntityCategory> {
        self.categories.get(id).copied()
    }

    /// Number of resolved ids.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no id has been resolved.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate `(id, name)` pairs ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(id, name)| (id.as_str(), name.as_str()))
    }

    /// The mapping as an id-ordered map.
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.names
    }
}

impl Serialize for NameRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.names.serialize(serializer)
    }
}

/// Turn a display name into a bare identifier of at most `max_length` chars.
///
/// Does not check for collisions.
pub fn sanitize(proposed_name: &str, prefix: &str, max_length: usize) -> String {
    let mut text = proposed_name.to_string();
    for (operator, word) in OPERATOR_WORDS {
        text = text.replace(operator, word);
    }

    let mapped: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = truncate(&mapped, max_length).trim_end_matches('_');

    let name = match trimmed.chars().next() {
        None => format!("{}_", prefix),
        Some(c) if c.is_ascii_digit() => format!("{}_{}", prefix, trimmed),
        Some('_') => format!("{}{}", prefix, trimmed),
        Some(_) => trimmed.to_string(),
    };
    truncate(&name, max_length).to_string()
}

/// Whether `name` is a bare identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
