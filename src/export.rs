//! Export types for serializing unit-system state.
//!
//! These types provide human-readable, name-resolved representations of
//! dimensions, units, relations and conversion edges suitable for JSON export.

use serde::{Deserialize, Serialize};

use crate::relation::Origin;
use crate::system::UnitSystem;

/// Exported dimension with its base unit resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionExport {
    /// Numeric dimension ID.
    pub id: u64,
    /// Dimension name.
    pub name: String,
    /// Name of the base unit.
    pub base_unit: String,
    /// Names of every unit in the dimension, base unit first.
    pub units: Vec<String>,
}

/// Exported unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitExport {
    /// Numeric unit ID.
    pub id: u64,
    /// Unit name.
    pub name: String,
    /// Name of the unit's dimension.
    pub dimension: String,
    /// Multiplier to the dimension's base unit.
    pub conversion_factor: f64,
}

/// Exported relation with dimension names resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationExport {
    /// Left operand dimension.
    pub lhs: String,
    /// Operator symbol, `*` or `/`.
    pub op: String,
    /// Right operand dimension.
    pub rhs: String,
    /// Resulting dimension.
    pub result: String,
    /// Whether the relation was declared or derived by closure.
    pub origin: Origin,
}

/// Exported conversion edge: `quantity_in(to) = quantity_in(from) * factor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionEdgeExport {
    pub from: String,
    pub to: String,
    pub factor: f64,
}

/// Full snapshot of a unit system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemExport {
    /// Seed packs applied, in order.
    pub seeds: Vec<String>,
    pub dimensions: Vec<DimensionExport>,
    pub units: Vec<UnitExport>,
    pub relations: Vec<RelationExport>,
    pub conversions: Vec<ConversionEdgeExport>,
}

impl SystemExport {
    /// Build a snapshot of `system`.
    pub fn from_system(system: &UnitSystem) -> Self {
        let dimensions = system
            .dimensions()
            .iter()
            .map(|d| DimensionExport {
                id: d.id.get(),
                name: d.name.to_string(),
                base_unit: unit_name(system, d.base_unit),
                units: system
                    .units_of(d.id)
                    .iter()
                    .map(|u| u.name.to_string())
                    .collect(),
            })
            .collect();

        let units = system
            .units()
            .iter()
            .map(|u| UnitExport {
                id: u.id.get(),
                name: u.name.to_string(),
                dimension: system.dimension_name(u.dimension),
                conversion_factor: u.conversion_factor,
            })
            .collect();

        let relations = system
            .relation_table()
            .iter()
            .map(|(key, relation)| RelationExport {
                lhs: system.dimension_name(key.lhs),
                op: key.op.symbol().to_string(),
                rhs: system.dimension_name(key.rhs),
                result: system.dimension_name(relation.result),
                origin: relation.origin,
            })
            .collect();

        let conversions = system
            .conversion_graph()
            .edges()
            .into_iter()
            .map(|(from, to, factor)| ConversionEdgeExport {
                from: unit_name(system, from),
                to: unit_name(system, to),
                factor,
            })
            .collect();

        Self {
            seeds: system.seeds().to_vec(),
            dimensions,
            units,
            relations,
            conversions,
        }
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn unit_name(system: &UnitSystem, id: crate::id::UnitId) -> String {
    system
        .unit_by_id(id)
        .map(|u| u.name.to_string())
        .unwrap_or_else(|_| id.to_string())
}
