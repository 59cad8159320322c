//! Relation table: which dimension a product or quotient of two dimensions yields.
//!
//! Keys are typed `(lhs, op, rhs)` triples rather than `"A*B"` strings. A seed
//! table holding only declared relations is closed by repeatedly applying
//! [`RelationTable::derive_once`] until nothing changes:
//!
//! - `L*R = C` implies `R*L = C`, `C/L = R` and `C/R = L`
//! - `L/R = C` implies `C*R = L`
//!
//! Declared entries are never overwritten by derivation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::DimensionId;

/// Passes allowed before [`RelationTable::close`] gives up on reaching a fixed point.
pub const DEFAULT_MAX_CLOSURE_PASSES: usize = 64;

/// Binary operator joining two dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operator {
    Mul,
    Div,
}

impl Operator {
    /// The operator's symbol.
    pub fn symbol(self) -> char {
        match self {
            Operator::Mul => '*',
            Operator::Div => '/',
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Key of a relation: `lhs op rhs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationKey {
    pub lhs: DimensionId,
    pub op: Operator,
    pub rhs: DimensionId,
}

impl RelationKey {
    pub fn new(lhs: DimensionId, op: Operator, rhs: DimensionId) -> Self {
        Self { lhs, op, rhs }
    }

    pub fn mul(lhs: DimensionId, rhs: DimensionId) -> Self {
        Self::new(lhs, Operator::Mul, rhs)
    }

    pub fn div(lhs: DimensionId, rhs: DimensionId) -> Self {
        Self::new(lhs, Operator::Div, rhs)
    }

    /// Relations algebraically implied by `self = result`.
    pub fn implied(self, result: DimensionId) -> Vec<(RelationKey, DimensionId)> {
        let RelationKey { lhs, op, rhs } = self;
        match op {
            Operator::Mul => vec![
                (RelationKey::mul(rhs, lhs), result),
                (RelationKey::div(result, lhs), rhs),
                (RelationKey::div(result, rhs), lhs),
            ],
            Operator::Div => vec![(RelationKey::mul(result, rhs), lhs)],
        }
    }
}

impl std::fmt::Display for RelationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.lhs, self.op, self.rhs)
    }
}

/// How an entry got into the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Inserted by the registry from an explicit declaration.
    Declared,
    /// Emitted by closure.
    Derived,
}

/// A resolved relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub result: DimensionId,
    pub origin: Origin,
}

/// Mapping from [`RelationKey`] to the resulting dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationTable {
    entries: BTreeMap<RelationKey, Relation>,
}

impl RelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a declared relation. Returns the previous result, if any.
    pub fn insert_declared(&mut self, key: RelationKey, result: DimensionId) -> Option<DimensionId> {
        self.entries
            .insert(
                key,
                Relation {
                    result,
                    origin: Origin::Declared,
                },
            )
            .map(|r| r.result)
    }

    /// Merge a derived relation. Declared entries win; other derived entries
    /// are overwritten.
    fn merge_derived(&mut self, key: RelationKey, result: DimensionId) {
        match self.entries.get(&key) {
            Some(existing) if existing.origin == Origin::Declared => {}
            Some(existing) if existing.result != result => {
                tracing::warn!(
                    key = %key,
                    previous = %existing.result,
                    replacement = %result,
                    "conflicting derived relation, keeping the later one"
                );
                self.entries.insert(
                    key,
                    Relation {
                        result,
                        origin: Origin::Derived,
                    },
                );
            }
            Some(_) => {}
            None => {
                self.entries.insert(
                    key,
                    Relation {
                        result,
                        origin: Origin::Derived,
                    },
                );
            }
        }
    }

    pub fn get(&self, key: &RelationKey) -> Option<DimensionId> {
        self.entries.get(key).map(|r| r.result)
    }

    pub fn relation(&self, key: &RelationKey) -> Option<Relation> {
        self.entries.get(key).copied()
    }

    /// Look up `lhs op rhs`.
    pub fn resolve(&self, lhs: DimensionId, op: Operator, rhs: DimensionId) -> Option<DimensionId> {
        self.get(&RelationKey::new(lhs, op, rhs))
    }

    pub fn contains(&self, key: &RelationKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&RelationKey, &Relation)> {
        self.entries.iter()
    }

    /// A single derivation pass.
    ///
    /// Emissions are computed from `self` only; the returned table is `self`
    /// plus everything those emissions add.
    pub fn derive_once(&self) -> RelationTable {
        let mut out = self.clone();
        for (key, relation) in &self.entries {
            for (derived, result) in key.implied(relation.result) {
                out.merge_derived(derived, result);
            }
        }
        out
    }

    /// Close the table under derivation.
    pub fn close(&self) -> RelationTable {
        self.close_bounded(DEFAULT_MAX_CLOSURE_PASSES)
    }

    /// Close the table, running at most `max_passes` derivation passes.
    pub fn close_bounded(&self, max_passes: usize) -> RelationTable {
        let mut current = self.clone();
        for pass in 1..=max_passes {
            let next = current.derive_once();
            if next == current {
                tracing::debug!(pass, relations = current.len(), "relation table closed");
                return current;
            }
            current = next;
        }
        tracing::warn!(
            max_passes,
            relations = current.len(),
            "relation closure stopped before reaching a fixed point"
        );
        current
    }

    /// Whether every entry's implied relations are present.
    pub fn is_closed(&self) -> bool {
        self.entries.iter().all(|(key, relation)| {
            key.implied(relation.result)
                .into_iter()
                .all(|(k, r)| self.get(&k) == Some(r))
        })
    }
}

impl FromIterator<(RelationKey, DimensionId)> for RelationTable {
    fn from_iter<I: IntoIterator<Item = (RelationKey, DimensionId)>>(iter: I) -> Self {
        let mut table = RelationTable::new();
        for (key, result) in iter {
            table.insert_declared(key, result);
        }
        table
    }
}
