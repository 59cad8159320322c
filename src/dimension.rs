//! Dimension handles and relation-key expressions.
//!
//! Multiplying or dividing two [`Dimension`]s builds a [`DimensionExpr`], the
//! key a relation is declared under. It performs no lookup. Dimensions cannot
//! be scaled by numbers; only units can (see [`crate::unit::UnitExpression`]).

use std::ops::{Div, Mul};
use std::sync::Arc;

use crate::id::{DimensionId, SystemId, UnitId};
use crate::relation::{Operator, RelationKey};

/// A dimension (Length, Time, Area, ...) registered in a unit system.
///
/// Cheap to clone; the registry keeps the authoritative copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dimension {
    pub id: DimensionId,
    pub name: Arc<str>,
    /// The dimension's base unit (conversion factor 1).
    pub base_unit: UnitId,
    pub(crate) system: SystemId,
}

impl Dimension {
    pub fn system(&self) -> SystemId {
        self.system
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// `lhs op rhs` over two dimensions of one system, used to declare a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DimensionExpr {
    pub key: RelationKey,
    pub(crate) system: SystemId,
}

impl DimensionExpr {
    pub fn system(&self) -> SystemId {
        self.system
    }
}

fn combine(lhs: &Dimension, op: Operator, rhs: &Dimension) -> DimensionExpr {
    DimensionExpr {
        key: RelationKey::new(lhs.id, op, rhs.id),
        // Mixed-system operands get a sentinel no registry accepts.
        system: if lhs.system == rhs.system {
            lhs.system
        } else {
            SystemId::foreign()
        },
    }
}

impl Mul for &Dimension {
    type Output = DimensionExpr;

    fn mul(self, rhs: &Dimension) -> DimensionExpr {
        combine(self, Operator::Mul, rhs)
    }
}

impl Div for &Dimension {
    type Output = DimensionExpr;

    fn div(self, rhs: &Dimension) -> DimensionExpr {
        combine(self, Operator::Div, rhs)
    }
}

/// Split a textual dimension expression like `"Length*Length"` into
/// `(lhs, op, rhs)` operand names.
///
/// Returns a human-readable reason on failure; the registry turns it into
/// [`ExpressionError::InvalidExpression`](crate::error::ExpressionError).
pub(crate) fn split_expr(expr: &str) -> Result<(&str, Operator, &str), String> {
    let ops: Vec<(usize, char)> = expr
        .char_indices()
        .filter(|(_, c)| *c == '*' || *c == '/')
        .collect();
    let (at, symbol) = match ops.as_slice() {
        [single] => *single,
        [] => return Err("expected `*` or `/` between two dimensions".into()),
        _ => return Err("only products or quotients of exactly two dimensions are supported".into()),
    };
    let op = if symbol == '*' { Operator::Mul } else { Operator::Div };
    let lhs = expr[..at].trim();
    let rhs = expr[at + 1..].trim();
    for operand in [lhs, rhs] {
        if operand.is_empty() {
            return Err("missing operand".into());
        }
        if operand.parse::<f64>().is_ok() {
            return Err(format!(
                "cannot scale a dimension by the number {operand}; scale a unit instead"
            ));
        }
    }
    Ok((lhs, op, rhs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_product() {
        let (lhs, op, rhs) = split_expr("Length*Length").unwrap();
        assert_eq!((lhs, op, rhs), ("Length", Operator::Mul, "Length"));
    }

    #[test]
    fn splits_quotient_with_spaces() {
        let (lhs, op, rhs) = split_expr(" Length / Time ").unwrap();
        assert_eq!((lhs, op, rhs), ("Length", Operator::Div, "Time"));
    }

    #[test]
    fn rejects_scalar_operand() {
        let err = split_expr("Length*3").unwrap_err();
        assert!(err.contains("scale a unit"));
        assert!(split_expr("2.5/Time").is_err());
    }

    #[test]
    fn rejects_three_operands() {
        assert!(split_expr("Length*Length*Length").is_err());
        assert!(split_expr("Length").is_err());
        assert!(split_expr("*Time").is_err());
    }
}
