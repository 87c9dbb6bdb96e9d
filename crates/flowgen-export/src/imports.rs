// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Import statement aggregation.
//!
//! Producers contribute raw import lines tagged with an origin. The registry
//! reduces them to one deduplicated block: `from M import ...` lines sharing
//! a module are merged, and lines are grouped as builtin, orchestration
//! runtime, other third-party, and local.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Standard-library top-level modules of the target language.
const BUILTIN_MODULES: &[&str] = &[
    "__future__", "abc", "argparse", "asyncio", "base64", "collections", "contextlib", "copy",
    "csv", "dataclasses", "datetime", "decimal", "enum", "functools", "glob", "hashlib", "html",
    "http", "importlib", "inspect", "io", "itertools", "json", "logging", "math", "operator",
    "os", "pathlib", "pickle", "platform", "pprint", "random", "re", "secrets", "shutil",
    "signal", "socket", "sqlite3", "statistics", "string", "subprocess", "sys", "tempfile",
    "textwrap", "threading", "time", "traceback", "types", "typing", "unittest", "urllib",
    "uuid", "warnings", "xml", "zipfile",
];

/// Where an imported module comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportOrigin {
    /// Standard library.
    Builtin,
    /// Installed package, including the orchestration runtime.
    ThirdParty,
    /// Module of the exported project itself.
    Local,
}

impl ImportOrigin {
    /// Classify a dotted module path.
    pub fn classify(module_path: &str) -> Self {
        if module_path.starts_with('.') {
            return ImportOrigin::Local;
        }
        let root = module_path.split('.').next().unwrap_or_default();
        if BUILTIN_MODULES.contains(&root) {
            ImportOrigin::Builtin
        } else {
            ImportOrigin::ThirdParty
        }
    }
}

/// One raw import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    raw: String,
    origin: ImportOrigin,
}

/// Parsed shape of an import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportForm {
    /// `import x`, kept verbatim with whitespace normalized.
    Module(String),
    /// `from module import a, b`.
    From {
        /// Dotted module path.
        module: String,
        /// Imported symbols, aliases included (`a as b`).
        symbols: Vec<String>,
    },
}

impl ImportStatement {
    /// Create a statement with an explicit origin.
    pub fn new(raw: impl Into<String>, origin: ImportOrigin) -> Self {
        Self {
            raw: raw.into(),
            origin,
        }
    }

    /// Create a statement, classifying its origin from the module path.
    pub fn classified(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let origin = ImportOrigin::classify(parse_form(&raw).module_path());
        Self { raw, origin }
    }

    /// The statement as given.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The origin tag.
    pub fn origin(&self) -> ImportOrigin {
        self.origin
    }

    /// Parse the statement.
    pub fn form(&self) -> ImportForm {
        parse_form(&self.raw)
    }
}

impl ImportForm {
    /// Dotted path of the (first) imported module.
    pub fn module_path(&self) -> &str {
        match self {
            ImportForm::From { module, .. } => module,
            ImportForm::Module(line) => line
                .strip_prefix("import ")
                .unwrap_or(line)
                .split([',', ' '])
                .next()
                .unwrap_or_default(),
        }
    }

    fn root_package(&self) -> &str {
        self.module_path().split('.').next().unwrap_or_default()
    }
}

fn parse_form(raw: &str) -> ImportForm {
    let code: Vec<&str> = raw
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .collect();
    let normalized = code.join(" ").split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some(rest) = normalized.strip_prefix("from ")
        && let Some((module, symbols)) = rest.split_once(" import ")
    {
        let symbols: Vec<String> = symbols
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !symbols.is_empty() {
            return ImportForm::From {
                module: module.trim().to_string(),
                symbols,
            };
        }
    }

    ImportForm::Module(normalized)
}

/// Deduplicated imports of one origin group.
#[derive(Debug, Default)]
struct ImportGroup {
    modules: BTreeSet<String>,
    froms: BTreeMap<String, BTreeSet<String>>,
}

impl ImportGroup {
    fn insert(&mut self, form: ImportForm) {
        match form {
            ImportForm::Module(line) if !line.is_empty() => {
                self.modules.insert(line);
            }
            ImportForm::Module(_) => {}
            ImportForm::From { module, symbols } => {
                self.froms.entry(module).or_default().extend(symbols);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.froms.is_empty()
    }

    /// `import` lines, then `from` lines, each sorted.
    ///
    /// `first_module` is an `import` line moved to the very top;
    /// `first_from` is a module whose `from` line precedes everything.
    fn lines(&self, first_module: Option<&str>, first_from: Option<&str>) -> Vec<String> {
        let from_line = |module: &str, symbols: &BTreeSet<String>| {
            if symbols.contains("*") {
                format!("from {} import *", module)
            } else {
                let joined: Vec<&str> = symbols.iter().map(String::as_str).collect();
                format!("from {} import {}", module, joined.join(", "))
            }
        };

        let mut lines = Vec::new();
        if let Some(module) = first_from
            && let Some(symbols) = self.froms.get(module)
        {
            lines.push(from_line(module, symbols));
        }
        if let Some(line) = first_module
            && self.modules.contains(line)
        {
            lines.push(line.to_string());
        }
        lines.extend(
            self.modules
                .iter()
                .filter(|line| Some(line.as_str()) != first_module)
                .cloned(),
        );
        lines.extend(
            self.froms
                .iter()
                .filter(|(module, _)| Some(module.as_str()) != first_from)
                .map(|(module, symbols)| from_line(module, symbols)),
        );
        lines
    }
}

/// Collects import statements and renders them as one block.
#[derive(Debug, Clone)]
pub struct ImportRegistry {
    runtime_package: String,
    statements: Vec<ImportStatement>,
}

impl ImportRegistry {
    /// Create an empty registry. Third-party imports of `runtime_package`
    /// are rendered as their own group.
    pub fn new(runtime_package: impl Into<String>) -> Self {
        Self {
            runtime_package: runtime_package.into(),
            statements: Vec::new(),
        }
    }

    /// Add one raw statement.
    pub fn add(&mut self, raw: impl Into<String>, origin: ImportOrigin) {
        self.statements.push(ImportStatement::new(raw, origin));
    }

    /// Add one statement.
    pub fn add_statement(&mut self, statement: ImportStatement) {
        self.statements.push(statement);
    }

    /// Add many statements.
    pub fn extend(&mut self, statements: impl IntoIterator<Item = ImportStatement>) {
        self.statements.extend(statements);
    }

    /// Number of raw statements collected (duplicates included).
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Render the grouped block: builtin, runtime, third-party, local.
    ///
    /// Groups are separated by one blank line; there is no trailing newline.
    /// The result depends only on the collected multiset.
    pub fn render(&self) -> String {
        let mut builtin = ImportGroup::default();
        let mut runtime = ImportGroup::default();
        let mut third_party = ImportGroup::default();
        let mut local = ImportGroup::default();

        for statement in &self.statements {
            let form = statement.form();
            match statement.origin {
                ImportOrigin::Builtin => builtin.insert(form),
                ImportOrigin::ThirdParty if form.root_package() == self.runtime_package => {
                    runtime.insert(form)
                }
                ImportOrigin::ThirdParty => third_party.insert(form),
                ImportOrigin::Local => local.insert(form),
            }
        }

        let runtime_import = format!("import {}", self.runtime_package);
        let sections = [
            builtin.lines(None, Some("__future__")),
            runtime.lines(Some(&runtime_import), None),
            third_party.lines(None, None),
            local.lines(None, None),
        ];

        sections
            .iter()
            .filter(|lines| !lines.is_empty())
            .map(|lines| lines.join("\n"))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
