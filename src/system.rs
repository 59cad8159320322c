//! Unit system: the dimension registry.
//!
//! A [`UnitSystem`] owns every dimension, every unit, the relation table and
//! the conversion graph. It is an explicit value; independent systems coexist
//! and reject each other's handles.
//!
//! Declarations take `&mut self`, lookups and arithmetic take `&self`, so a
//! reader can never observe a half-closed relation table. Closure builds a new
//! table and publishes it as a fresh `Arc` snapshot in a single assignment.
//!
//! ```
//! use simple_units::system::UnitSystem;
//!
//! let mut us = UnitSystem::new();
//! let meter = us.new_dimension("Length", "Meter").unwrap();
//! let length = us.dimension("Length").unwrap().clone();
//! let square_meter = us
//!     .add_derived_dimension(&length * &length, "Area", "Meter^2")
//!     .unwrap();
//!
//! let ten = us.quantity(&meter, 10.0).unwrap();
//! let area = (ten * ten).unwrap();
//! assert!(area.try_eq(&us.quantity(&square_meter, 100.0).unwrap()).unwrap());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::conversion::{ConversionGraph, ConversionPath};
use crate::dimension::{self, Dimension, DimensionExpr};
use crate::error::{ConversionError, ExpressionError, RegistryError, UnitsResult};
use crate::id::{DimensionId, SystemId, UnitId};
use crate::quantity::Quantity;
use crate::relation::{DEFAULT_MAX_CLOSURE_PASSES, Operator, RelationKey, RelationTable};
use crate::unit::{self, Unit, UnitExpression};

/// Tunables for a unit system.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Upper bound on derivation passes per closure.
    pub max_closure_passes: usize,
    /// Decimal places used by [`Quantity::approx_eq_default`].
    pub float_places: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            max_closure_passes: DEFAULT_MAX_CLOSURE_PASSES,
            float_places: 7,
        }
    }
}

/// Registry of dimensions, units and relations.
#[derive(Debug)]
pub struct UnitSystem {
    id: SystemId,
    config: SystemConfig,
    dimensions: Vec<Dimension>,
    dimension_index: HashMap<Arc<str>, DimensionId>,
    units: Vec<Unit>,
    unit_index: HashMap<Arc<str>, UnitId>,
    /// Units of each dimension, in declaration order, indexed by dimension slot.
    members: Vec<Vec<UnitId>>,
    relations: Arc<RelationTable>,
    conversions: ConversionGraph,
    /// Seed packs applied to this system, in application order.
    seeds: Vec<String>,
}

impl Default for UnitSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitSystem {
    /// Create an empty system with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SystemConfig::default())
    }

    pub fn with_config(config: SystemConfig) -> Self {
        Self {
            id: SystemId::fresh(),
            config,
            dimensions: Vec::new(),
            dimension_index: HashMap::new(),
            units: Vec::new(),
            unit_index: HashMap::new(),
            members: Vec::new(),
            relations: Arc::new(RelationTable::new()),
            conversions: ConversionGraph::new(),
            seeds: Vec::new(),
        }
    }

    pub fn id(&self) -> SystemId {
        self.id
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    /// Register a dimension together with its base unit.
    pub fn new_dimension(&mut self, name: &str, base_unit_name: &str) -> UnitsResult<Unit> {
        self.ensure_unique_dimension(name)?;
        self.ensure_unique_unit(base_unit_name)?;

        let dim_id = DimensionId::from_index(self.dimensions.len());
        let unit_id = UnitId::from_index(self.units.len());
        let dim_name: Arc<str> = name.into();
        let unit_name: Arc<str> = base_unit_name.into();

        self.dimensions.push(Dimension {
            id: dim_id,
            name: dim_name.clone(),
            base_unit: unit_id,
            system: self.id,
        });
        self.dimension_index.insert(dim_name, dim_id);
        self.members.push(Vec::new());

        let unit = self.push_unit(unit_id, unit_name, dim_id, 1.0);
        tracing::info!(dimension = name, base_unit = base_unit_name, "new dimension");
        Ok(unit)
    }

    /// Register a dimension defined by a relation between two existing ones,
    /// e.g. `Area = Length * Length`, and re-close the relation table.
    pub fn add_derived_dimension(
        &mut self,
        expr: DimensionExpr,
        name: &str,
        unit_name: &str,
    ) -> UnitsResult<Unit> {
        self.check_expr(&expr)?;
        if self.relations.contains(&expr.key) {
            return Err(RegistryError::AlreadyDefined {
                name: self.describe_key(&expr.key),
            }
            .into());
        }

        let base = self.new_dimension(name, unit_name)?;

        let mut table = (*self.relations).clone();
        table.insert_declared(expr.key, base.dimension);
        let closed = table.close_bounded(self.config.max_closure_passes);
        tracing::debug!(
            expr = %self.describe_key(&expr.key),
            dimension = name,
            relations = closed.len(),
            "derived dimension closed"
        );
        self.relations = Arc::new(closed);
        Ok(base)
    }

    /// Register a unit scaled from an existing one, e.g. `Feet = Meter / 3.208`.
    pub fn add_unit(&mut self, name: &str, expr: UnitExpression) -> UnitsResult<Unit> {
        if expr.system != self.id {
            return Err(RegistryError::ForeignHandle {
                what: format!("unit expression for {name}"),
            }
            .into());
        }
        self.ensure_unique_unit(name)?;
        let origin = self.unit_by_id(expr.origin)?.clone();
        check_factor(expr.conversion_factor, || {
            format!("{name} = {} * {}", origin.name, expr.conversion_factor)
        })?;

        let unit_id = UnitId::from_index(self.units.len());
        let unit = self.push_unit(unit_id, name.into(), origin.dimension, expr.conversion_factor);

        // 1 new = (new.cf / origin.cf) origin
        self.conversions
            .add_edge(unit_id, origin.id, expr.conversion_factor / origin.conversion_factor);
        self.conversions.make_bidirectional();

        tracing::debug!(
            unit = name,
            origin = %origin.name,
            conversion_factor = expr.conversion_factor,
            "new unit"
        );
        Ok(unit)
    }

    /// Declare an explicit conversion between two existing units of one dimension.
    ///
    /// `factor` satisfies `quantity_in(to) = quantity_in(from) * factor`. Only the
    /// conversion graph is affected; unit conversion factors stay as declared.
    pub fn add_conversion(&mut self, from: &Unit, to: &Unit, factor: f64) -> UnitsResult<()> {
        self.check_unit(from)?;
        self.check_unit(to)?;
        if from.dimension != to.dimension {
            return Err(ConversionError::NoConversionPossible {
                from: from.name.to_string(),
                to: to.name.to_string(),
            }
            .into());
        }
        check_factor(factor, || format!("{} -> {} * {factor}", from.name, to.name))?;
        // Both directions, so a redeclaration replaces the reverse factor too.
        self.conversions.add_edge(from.id, to.id, factor);
        self.conversions.add_edge(to.id, from.id, 1.0 / factor);
        Ok(())
    }

    /// A copy sharing this system's identity, for staging a batch of
    /// declarations that is committed only if every one succeeds.
    pub(crate) fn staged(&self) -> Self {
        Self {
            id: self.id,
            config: self.config.clone(),
            dimensions: self.dimensions.clone(),
            dimension_index: self.dimension_index.clone(),
            units: self.units.clone(),
            unit_index: self.unit_index.clone(),
            members: self.members.clone(),
            relations: Arc::clone(&self.relations),
            conversions: self.conversions.clone(),
            seeds: self.seeds.clone(),
        }
    }

    fn push_unit(&mut self, id: UnitId, name: Arc<str>, dimension: DimensionId, factor: f64) -> Unit {
        let unit = Unit {
            id,
            name: name.clone(),
            dimension,
            conversion_factor: factor,
            system: self.id,
        };
        self.units.push(unit.clone());
        self.unit_index.insert(name.clone(), id);
        self.members[dimension.index()].push(id);
        self.conversions.add_unit(id, name);
        unit
    }

    fn ensure_unique_dimension(&self, name: &str) -> UnitsResult<()> {
        if self.dimension_index.contains_key(name) {
            return Err(RegistryError::AlreadyDefined { name: name.into() }.into());
        }
        Ok(())
    }

    fn ensure_unique_unit(&self, name: &str) -> UnitsResult<()> {
        if self.unit_index.contains_key(name) {
            return Err(RegistryError::AlreadyDefined { name: name.into() }.into());
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    /// Build `lhs op rhs` from dimension names.
    pub fn expr(&self, lhs: &str, op: Operator, rhs: &str) -> UnitsResult<DimensionExpr> {
        let lhs = self.dimension(lhs)?;
        let rhs = self.dimension(rhs)?;
        Ok(match op {
            Operator::Mul => lhs * rhs,
            Operator::Div => lhs / rhs,
        })
    }

    /// Parse a textual dimension expression such as `"Length*Length"`.
    pub fn parse_dimension_expr(&self, text: &str) -> UnitsResult<DimensionExpr> {
        let (lhs, op, rhs) =
            dimension::split_expr(text).map_err(|message| ExpressionError::InvalidExpression {
                expr: text.into(),
                message,
            })?;
        self.expr(lhs, op, rhs)
    }

    /// Parse a textual unit expression such as `"Meter / 3.208"`.
    pub fn parse_unit_expr(&self, text: &str) -> UnitsResult<UnitExpression> {
        let (name, op, k) =
            unit::split_expr(text).map_err(|message| ExpressionError::InvalidExpression {
                expr: text.into(),
                message,
            })?;
        let unit = self.unit(name)?;
        Ok(match op {
            Operator::Mul => unit * k,
            Operator::Div => unit / k,
        })
    }

    // -----------------------------------------------------------------------
    // Quantities and conversions
    // -----------------------------------------------------------------------

    /// Instantiate `unit` at `nominal`.
    pub fn quantity(&self, unit: &Unit, nominal: f64) -> UnitsResult<Quantity<'_>> {
        self.check_unit(unit)?;
        let unit = self.unit_by_id(unit.id)?;
        Ok(Quantity::new(self, unit, nominal))
    }

    /// Instantiate the unit named `unit_name` at `nominal`.
    pub fn quantity_of(&self, unit_name: &str, nominal: f64) -> UnitsResult<Quantity<'_>> {
        let unit = self.unit(unit_name)?;
        Ok(Quantity::new(self, unit, nominal))
    }

    /// Explain a conversion as a chain of declared conversion edges.
    pub fn conversion_path(&self, from: &Unit, to: &Unit) -> UnitsResult<ConversionPath> {
        self.check_unit(from)?;
        self.check_unit(to)?;
        if from.dimension != to.dimension {
            return Err(ConversionError::NoConversionPossible {
                from: from.name.to_string(),
                to: to.name.to_string(),
            }
            .into());
        }
        Ok(self.conversions.path_between(from.id, to.id)?)
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// Look up a dimension by name.
    pub fn dimension(&self, name: &str) -> UnitsResult<&Dimension> {
        self.dimension_index
            .get(name)
            .map(|id| &self.dimensions[id.index()])
            .ok_or_else(|| RegistryError::UnknownDimension { name: name.into() }.into())
    }

    /// Look up a unit by name.
    pub fn unit(&self, name: &str) -> UnitsResult<&Unit> {
        self.unit_index
            .get(name)
            .map(|id| &self.units[id.index()])
            .ok_or_else(|| RegistryError::UnknownUnit { name: name.into() }.into())
    }

    pub fn dimension_by_id(&self, id: DimensionId) -> UnitsResult<&Dimension> {
        self.dimensions.get(id.index()).ok_or_else(|| {
            RegistryError::UnknownDimension {
                name: id.to_string(),
            }
            .into()
        })
    }

    pub fn unit_by_id(&self, id: UnitId) -> UnitsResult<&Unit> {
        self.units.get(id.index()).ok_or_else(|| {
            RegistryError::UnknownUnit {
                name: id.to_string(),
            }
            .into()
        })
    }

    /// The dimension a unit belongs to.
    pub fn dimension_of(&self, unit: &Unit) -> UnitsResult<&Dimension> {
        self.check_unit(unit)?;
        self.dimension_by_id(unit.dimension)
    }

    /// Base unit of a dimension.
    pub fn base_unit(&self, dimension: DimensionId) -> UnitsResult<&Unit> {
        let dim = self.dimension_by_id(dimension)?;
        self.unit_by_id(dim.base_unit)
    }

    /// Units of a dimension, in declaration order (base unit first).
    pub fn units_of(&self, dimension: DimensionId) -> Vec<&Unit> {
        self.members
            .get(dimension.index())
            .map(|ids| ids.iter().map(|id| &self.units[id.index()]).collect())
            .unwrap_or_default()
    }

    /// Whether `unit` is a member of `dimension`.
    pub fn is_member(&self, unit: UnitId, dimension: DimensionId) -> bool {
        self.members
            .get(dimension.index())
            .is_some_and(|ids| ids.contains(&unit))
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Snapshot of the closed relation table.
    pub fn relations(&self) -> Arc<RelationTable> {
        Arc::clone(&self.relations)
    }

    pub(crate) fn relation_table(&self) -> &RelationTable {
        &self.relations
    }

    pub fn conversion_graph(&self) -> &ConversionGraph {
        &self.conversions
    }

    /// IDs of the seed packs applied so far.
    pub fn seeds(&self) -> &[String] {
        &self.seeds
    }

    pub(crate) fn has_seed(&self, id: &str) -> bool {
        self.seeds.iter().any(|s| s == id)
    }

    pub(crate) fn mark_seed(&mut self, id: &str) {
        if !self.has_seed(id) {
            self.seeds.push(id.to_string());
        }
    }

    /// Render a relation key with dimension names, e.g. `Length*Length`.
    pub fn describe_key(&self, key: &RelationKey) -> String {
        format!(
            "{}{}{}",
            self.dimension_name(key.lhs),
            key.op,
            self.dimension_name(key.rhs)
        )
    }

    pub(crate) fn dimension_name(&self, id: DimensionId) -> String {
        self.dimensions
            .get(id.index())
            .map(|d| d.name.to_string())
            .unwrap_or_else(|| id.to_string())
    }

    // -----------------------------------------------------------------------
    // Handle checks
    // -----------------------------------------------------------------------

    fn check_expr(&self, expr: &DimensionExpr) -> UnitsResult<()> {
        if expr.system != self.id {
            return Err(RegistryError::ForeignHandle {
                what: "dimension expression".into(),
            }
            .into());
        }
        self.dimension_by_id(expr.key.lhs)?;
        self.dimension_by_id(expr.key.rhs)?;
        Ok(())
    }

    fn check_unit(&self, unit: &Unit) -> UnitsResult<()> {
        if unit.system != self.id {
            return Err(RegistryError::ForeignHandle {
                what: format!("unit {}", unit.name),
            }
            .into());
        }
        Ok(())
    }
}

/// Conversion factors must be finite and non-zero.
fn check_factor(factor: f64, expr: impl FnOnce() -> String) -> UnitsResult<()> {
    if factor.is_finite() && factor != 0.0 {
        return Ok(());
    }
    Err(ExpressionError::InvalidExpression {
        expr: expr(),
        message: format!("conversion factor must be finite and non-zero, got {factor}"),
    }
    .into())
}
