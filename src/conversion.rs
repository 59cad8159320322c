//! Conversion graph: units as nodes, conversion factors as edges.
//!
//! An edge `(from, to, f)` means `quantity_in(to) = quantity_in(from) * f`.
//! After [`ConversionGraph::make_bidirectional`] every edge has a reverse
//! `(to, from, 1/f)`, so reachability is symmetric. The registry records one
//! edge per declared unit (new unit → the unit it was scaled from); callers
//! may add further edges between existing units.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};

use crate::error::ConversionError;
use crate::id::UnitId;

/// Result type for conversion graph operations.
pub type ConversionResult<T> = std::result::Result<T, ConversionError>;

/// Node payload: the unit and its display name.
#[derive(Debug, Clone)]
pub struct UnitNode {
    pub id: UnitId,
    pub name: Arc<str>,
}

/// A chain of conversions between two units.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionPath {
    /// Units visited, starting unit first.
    pub units: Vec<UnitId>,
    /// Composed multiplier: `quantity_in(end) = quantity_in(start) * factor`.
    pub factor: f64,
}

impl ConversionPath {
    /// Number of conversion steps.
    pub fn hops(&self) -> usize {
        self.units.len().saturating_sub(1)
    }
}

/// Directed conversion graph backed by petgraph.
#[derive(Debug, Clone, Default)]
pub struct ConversionGraph {
    graph: DiGraph<UnitNode, f64>,
    node_index: HashMap<UnitId, NodeIndex>,
}

impl ConversionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a node exists for `unit`, returning its index.
    pub fn add_unit(&mut self, unit: UnitId, name: impl Into<Arc<str>>) -> NodeIndex {
        if let Some(idx) = self.node_index.get(&unit) {
            return *idx;
        }
        let idx = self.graph.add_node(UnitNode {
            id: unit,
            name: name.into(),
        });
        self.node_index.insert(unit, idx);
        idx
    }

    /// Add a conversion edge between two registered units, replacing the
    /// factor of an existing `from → to` edge.
    ///
    /// Unknown units are added as nodes named after their ID.
    pub fn add_edge(&mut self, from: UnitId, to: UnitId, factor: f64) {
        let from_idx = self.ensure(from);
        let to_idx = self.ensure(to);
        self.graph.update_edge(from_idx, to_idx, factor);
    }

    fn ensure(&mut self, unit: UnitId) -> NodeIndex {
        match self.node_index.get(&unit) {
            Some(idx) => *idx,
            None => self.add_unit(unit, unit.to_string()),
        }
    }

    pub fn has_unit(&self, unit: UnitId) -> bool {
        self.node_index.contains_key(&unit)
    }

    pub fn unit_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether an edge `from → to` exists.
    pub fn directly_reachable(&self, from: UnitId, to: UnitId) -> bool {
        match (self.node_index.get(&from), self.node_index.get(&to)) {
            (Some(&a), Some(&b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    /// All edges as `(from, to, factor)`.
    pub fn edges(&self) -> Vec<(UnitId, UnitId, f64)> {
        self.graph
            .edge_references()
            .map(|e| (self.graph[e.source()].id, self.graph[e.target()].id, *e.weight()))
            .collect()
    }

    /// Add the reverse `(v, u, 1/f)` of every edge `(u, v, f)` that lacks one.
    ///
    /// Returns the number of edges added.
    pub fn make_bidirectional(&mut self) -> usize {
        let mut pending: Vec<(NodeIndex, NodeIndex, f64)> = Vec::new();
        let mut seen: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
        for edge in self.graph.edge_references() {
            let (u, v) = (edge.source(), edge.target());
            if self.graph.contains_edge(v, u) || !seen.insert((v, u)) {
                continue;
            }
            pending.push((v, u, 1.0 / *edge.weight()));
        }
        let added = pending.len();
        for (v, u, factor) in pending {
            self.graph.add_edge(v, u, factor);
        }
        added
    }

    /// Every unit reachable from `start`, including `start`.
    pub fn reachable_from(&self, start: UnitId) -> HashSet<UnitId> {
        let Some(&start_idx) = self.node_index.get(&start) else {
            return HashSet::new();
        };
        let mut found = HashSet::new();
        let mut dfs = Dfs::new(&self.graph, start_idx);
        while let Some(idx) = dfs.next(&self.graph) {
            found.insert(self.graph[idx].id);
        }
        found
    }

    /// Check that all `units` lie in one connected component.
    ///
    /// Traversal starts at the first unit with an outgoing edge. Zero or one
    /// unit is trivially reachable.
    pub fn verify_reachability(&self, units: &[UnitId]) -> ConversionResult<()> {
        if units.len() < 2 {
            return Ok(());
        }
        let start = units.iter().copied().find(|u| {
            self.node_index.get(u).is_some_and(|&idx| {
                self.graph
                    .edges_directed(idx, Direction::Outgoing)
                    .next()
                    .is_some()
            })
        });
        let Some(start) = start else {
            return Err(ConversionError::UnreachableUnit {
                units: units.iter().map(|u| self.label(*u)).collect(),
                start: "(no unit has a conversion)".into(),
            });
        };
        let members = self.reachable_from(start);
        let unreachable: Vec<String> = units
            .iter()
            .filter(|u| !members.contains(u))
            .map(|u| self.label(*u))
            .collect();
        if unreachable.is_empty() {
            Ok(())
        } else {
            Err(ConversionError::UnreachableUnit {
                units: unreachable,
                start: self.label(start),
            })
        }
    }

    /// Depth-first search for a path from `start` to `end`.
    ///
    /// Returns the first path discovered, which is not necessarily the shortest.
    pub fn find_path(&self, start: UnitId, end: UnitId) -> Option<ConversionPath> {
        let start_idx = *self.node_index.get(&start)?;
        let end_idx = *self.node_index.get(&end)?;

        let mut visited = HashSet::from([start_idx]);
        let mut steps: Vec<(NodeIndex, f64)> = Vec::new();
        if !self.dfs_path(start_idx, end_idx, &mut visited, &mut steps) {
            return None;
        }

        let mut units = Vec::with_capacity(steps.len() + 1);
        units.push(start);
        let mut factor = 1.0;
        for (idx, f) in steps {
            units.push(self.graph[idx].id);
            factor *= f;
        }
        Some(ConversionPath { units, factor })
    }

    fn dfs_path(
        &self,
        current: NodeIndex,
        end: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        steps: &mut Vec<(NodeIndex, f64)>,
    ) -> bool {
        if current == end {
            return true;
        }
        for edge in self.graph.edges_directed(current, Direction::Outgoing) {
            let next = edge.target();
            if !visited.insert(next) {
                continue;
            }
            steps.push((next, *edge.weight()));
            if self.dfs_path(next, end, visited, steps) {
                return true;
            }
            steps.pop();
        }
        false
    }

    /// Reachability check followed by path search.
    pub fn path_between(&self, start: UnitId, end: UnitId) -> ConversionResult<ConversionPath> {
        self.verify_reachability(&[start, end])?;
        self.find_path(start, end)
            .ok_or_else(|| ConversionError::NoPath {
                from: self.label(start),
                to: self.label(end),
            })
    }

    fn label(&self, unit: UnitId) -> String {
        self.node_index
            .get(&unit)
            .map(|&idx| self.graph[idx].name.to_string())
            .unwrap_or_else(|| unit.to_string())
    }
}
