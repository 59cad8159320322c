//! Unit handles and declaration-time unit expressions.
//!
//! A [`Unit`] is a named scale within a dimension. Scaling a unit by a number
//! (`&meter / 3.208`, `3.0 * &feet`) yields a [`UnitExpression`], which is only
//! good for declaring a new unit with
//! [`UnitSystem::add_unit`](crate::system::UnitSystem::add_unit). Quantities are
//! built by the system, never by expressions.

use std::ops::{Div, Mul};
use std::sync::Arc;

use crate::id::{DimensionId, SystemId, UnitId};
use crate::relation::Operator;

/// A unit registered in a unit system.
///
/// `real_quantity = nominal_quantity * conversion_factor`, where the real
/// quantity is expressed in the dimension's base unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub id: UnitId,
    pub name: Arc<str>,
    pub dimension: DimensionId,
    pub conversion_factor: f64,
    pub(crate) system: SystemId,
}

impl Unit {
    pub fn system(&self) -> SystemId {
        self.system
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A scaled unit awaiting registration: `(conversion_factor, dimension)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitExpression {
    pub conversion_factor: f64,
    pub dimension: DimensionId,
    /// The unit the expression was scaled from.
    pub origin: UnitId,
    pub(crate) system: SystemId,
}

impl UnitExpression {
    fn scaled(self, conversion_factor: f64) -> Self {
        Self {
            conversion_factor,
            ..self
        }
    }
}

impl From<&Unit> for UnitExpression {
    fn from(unit: &Unit) -> Self {
        Self {
            conversion_factor: unit.conversion_factor,
            dimension: unit.dimension,
            origin: unit.id,
            system: unit.system,
        }
    }
}

impl Mul<f64> for &Unit {
    type Output = UnitExpression;

    fn mul(self, k: f64) -> UnitExpression {
        UnitExpression::from(self) * k
    }
}

impl Mul<&Unit> for f64 {
    type Output = UnitExpression;

    fn mul(self, unit: &Unit) -> UnitExpression {
        unit * self
    }
}

impl Div<f64> for &Unit {
    type Output = UnitExpression;

    fn div(self, k: f64) -> UnitExpression {
        UnitExpression::from(self) / k
    }
}

impl Mul<f64> for UnitExpression {
    type Output = UnitExpression;

    fn mul(self, k: f64) -> UnitExpression {
        self.scaled(self.conversion_factor * k)
    }
}

impl Mul<UnitExpression> for f64 {
    type Output = UnitExpression;

    fn mul(self, expr: UnitExpression) -> UnitExpression {
        expr * self
    }
}

impl Div<f64> for UnitExpression {
    type Output = UnitExpression;

    fn div(self, k: f64) -> UnitExpression {
        self.scaled(self.conversion_factor / k)
    }
}

/// Split a textual unit expression (`"Meter / 3.208"`, `"Feet * 3"`,
/// `"1000 * Meter"`) into the unit name, operator and scalar.
pub(crate) fn split_expr(expr: &str) -> Result<(&str, Operator, f64), String> {
    let ops: Vec<(usize, char)> = expr
        .char_indices()
        .filter(|(_, c)| *c == '*' || *c == '/')
        .collect();
    let (at, symbol) = match ops.as_slice() {
        [single] => *single,
        [] => return Err("expected a unit scaled by `*` or `/` and a number".into()),
        _ => return Err("a unit expression scales exactly one unit by one number".into()),
    };
    let op = if symbol == '*' { Operator::Mul } else { Operator::Div };
    let lhs = expr[..at].trim();
    let rhs = expr[at + 1..].trim();
    if lhs.is_empty() || rhs.is_empty() {
        return Err("missing operand".into());
    }
    let k_value = |k: f64| -> Result<f64, String> {
        if k.is_finite() && k != 0.0 {
            Ok(k)
        } else {
            Err(format!("scale factor must be finite and non-zero, got {k}"))
        }
    };
    match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        (Err(_), Ok(k)) => Ok((lhs, op, k_value(k)?)),
        (Ok(k), Err(_)) if op == Operator::Mul => Ok((rhs, op, k_value(k)?)),
        (Ok(_), Err(_)) => Err("cannot divide a number by a unit".into()),
        (Ok(_), Ok(_)) => Err("no unit to scale".into()),
        (Err(_), Err(_)) => Err("currently only scaling by numbers is supported".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn meter() -> Unit {
        Unit {
            id: UnitId::new(1).unwrap(),
            name: "Meter".into(),
            dimension: DimensionId::new(1).unwrap(),
            conversion_factor: 1.0,
            system: SystemId::fresh(),
        }
    }

    #[test]
    fn dividing_unit_scales_factor_down() {
        let m = meter();
        let feet = &m / 3.208;
        assert_relative_eq!(feet.conversion_factor, 1.0 / 3.208);
        assert_eq!(feet.dimension, m.dimension);
        assert_eq!(feet.origin, m.id);
    }

    #[test]
    fn scalar_multiplication_commutes() {
        let m = meter();
        assert_eq!(&m * 3.0, 3.0 * &m);
        let chained = (&m / 2.0) * 4.0;
        assert_relative_eq!(chained.conversion_factor, 2.0);
        assert_eq!(4.0 * (&m / 2.0), chained);
    }

    #[test]
    fn splits_textual_forms() {
        assert_eq!(split_expr("Meter / 3.208").unwrap(), ("Meter", Operator::Div, 3.208));
        assert_eq!(split_expr("Feet*3").unwrap(), ("Feet", Operator::Mul, 3.0));
        assert_eq!(split_expr("1000 * Meter").unwrap(), ("Meter", Operator::Mul, 1000.0));
    }

    #[test]
    fn rejects_non_scalar_operands() {
        assert!(split_expr("Meter * Second").is_err());
        assert!(split_expr("3 / Meter").is_err());
        assert!(split_expr("3 * 4").is_err());
        assert!(split_expr("Meter / 0").is_err());
        assert!(split_expr("Meter").is_err());
    }
}
