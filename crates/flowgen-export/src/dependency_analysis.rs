// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Dependency analysis between agent definitions.
//!
//! A group manager's constructor refers to its members' variables, so the
//! members must be defined first. Everything else an agent refers to (tools,
//! nested chats) is registered after all agents exist and adds no edge.

use flowgen_dsl::WorkflowGraph;
use std::collections::{HashMap, HashSet};

use crate::error::{ExportError, Result};

/// Definition dependencies between the agents of one workflow.
#[derive(Debug, Clone, Default)]
pub struct AgentDependencyGraph {
    /// Agent ids in input order
    agents: Vec<String>,
    /// Agent id -> agents its definition must follow
    edges: HashMap<String, Vec<String>>,
}

impl AgentDependencyGraph {
    /// Create a new empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for every agent of a workflow.
    ///
    /// Dependencies on ids that are not agents of the graph are ignored here;
    /// producers report them when resolving the reference.
    pub fn from_graph(graph: &WorkflowGraph) -> Self {
        let known: HashSet<&str> = graph.agents.iter().map(|a| a.id.as_str()).collect();
        let mut result = Self::new();
        for agent in &graph.agents {
            result.add_agent(&agent.id);
            for dependency in agent.definition_dependencies() {
                if known.contains(dependency) {
                    result.add_edge(&agent.id, dependency);
                }
            }
        }
        result
    }

    /// Add an agent (no-op if already present)
    pub fn add_agent(&mut self, agent_id: &str) {
        if !self.edges.contains_key(agent_id) {
            self.agents.push(agent_id.to_string());
            self.edges.insert(agent_id.to_string(), Vec::new());
        }
    }

    /// Record that `agent_id` must be defined after `dependency`
    pub fn add_edge(&mut self, agent_id: &str, dependency: &str) {
        self.add_agent(agent_id);
        self.add_agent(dependency);
        let deps = self.edges.entry(agent_id.to_string()).or_default();
        if !deps.iter().any(|d| d == dependency) {
            deps.push(dependency.to_string());
        }
    }

    /// Agents whose definition `agent_id` must follow
    pub fn dependencies(&self, agent_id: &str) -> &[String] {
        self.edges.get(agent_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Stable topological order of the agents.
    ///
    /// At every step the first agent in input order whose dependencies are
    /// all placed comes next, so a graph without groups keeps input order.
    pub fn definition_order(&self) -> Result<Vec<String>> {
        let mut placed: HashSet<&str> = HashSet::new();
        let mut order = Vec::with_capacity(self.agents.len());

        while order.len() < self.agents.len() {
            let next = self.agents.iter().find(|agent| {
                !placed.contains(agent.as_str())
                    && self
                        .dependencies(agent)
                        .iter()
                        .all(|dep| placed.contains(dep.as_str()))
            });

            match next {
                Some(agent) => {
                    placed.insert(agent.as_str());
                    order.push(agent.clone());
                }
                None => {
                    let agents = self
                        .agents
                        .iter()
                        .filter(|agent| !placed.contains(agent.as_str()))
                        .find_map(|agent| self.detect_cycle(agent))
                        .unwrap_or_default();
                    return Err(ExportError::CyclicDefinition { agents });
                }
            }
        }

        Ok(order)
    }

    /// Find a dependency cycle reachable from `start`.
    ///
    /// The returned path repeats its first agent at the end.
    pub fn detect_cycle(&self, start: &str) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        self.dfs(start, &mut visited, &mut path)
    }

    fn dfs<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        if let Some(position) = path.iter().position(|n| *n == node) {
            let mut cycle: Vec<String> = path[position..].iter().map(|n| n.to_string()).collect();
            cycle.push(node.to_string());
            return Some(cycle);
        }

        // Already fully explored
        if visited.contains(node) {
            return None;
        }

        path.push(node);
        for dependency in self.dependencies(node) {
            if let Some(cycle) = self.dfs(dependency, visited, path) {
                return Some(cycle);
            }
        }
        path.pop();
        visited.insert(node);

        None
    }
}
