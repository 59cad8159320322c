//! Rich diagnostic error types for the simple-units engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Every failure is raised synchronously at
//! the call site; the engine never recovers or guesses a compatible dimension.

use miette::Diagnostic;
use thiserror::Error;

use crate::seeds::SeedError;

/// Top-level error type for the simple-units engine.
#[derive(Debug, Error, Diagnostic)]
pub enum UnitsError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Arithmetic(#[from] ArithmeticError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Seed(#[from] SeedError),
}

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("{name} already defined")]
    #[diagnostic(
        code(units::registry::already_defined),
        help(
            "Dimension names, unit names and relation expressions are unique \
             within a unit system. Pick a different name, or reuse the existing \
             definition via `UnitSystem::dimension()` / `UnitSystem::unit()`."
        )
    )]
    AlreadyDefined { name: String },

    #[error("unknown dimension: {name}")]
    #[diagnostic(
        code(units::registry::unknown_dimension),
        help("Declare the dimension with `new_dimension` or `add_derived_dimension` first.")
    )]
    UnknownDimension { name: String },

    #[error("unknown unit: {name}")]
    #[diagnostic(
        code(units::registry::unknown_unit),
        help("Declare the unit with `new_dimension`, `add_derived_dimension` or `add_unit` first.")
    )]
    UnknownUnit { name: String },

    #[error("{what} belongs to a different unit system")]
    #[diagnostic(
        code(units::registry::foreign_handle),
        help(
            "Handles are only valid in the unit system that created them. \
             Look the item up by name in this system instead."
        )
    )]
    ForeignHandle { what: String },
}

// ---------------------------------------------------------------------------
// Arithmetic errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ArithmeticError {
    #[error("no way to {operation} {left} and {right}")]
    #[diagnostic(
        code(units::arithmetic::invalid_type),
        help(
            "Addition, subtraction and comparison need both operands in the same \
             dimension. Multiplication and division need a relation between the two \
             dimensions; declare one with `add_derived_dimension`."
        )
    )]
    InvalidType {
        operation: &'static str,
        left: String,
        right: String,
    },
}

// ---------------------------------------------------------------------------
// Expression errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ExpressionError {
    #[error("invalid expression \"{expr}\": {message}")]
    #[diagnostic(
        code(units::expression::invalid),
        help(
            "Dimension expressions take exactly two dimension names joined by `*` or `/` \
             (e.g. `Length*Length`). Unit expressions scale one unit by a number \
             (e.g. `Meter / 3.208`, `3 * Feet`)."
        )
    )]
    InvalidExpression { expr: String, message: String },
}

// ---------------------------------------------------------------------------
// Conversion errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConversionError {
    #[error("no conversion from {from} to {to}")]
    #[diagnostic(
        code(units::conversion::impossible),
        help("Conversions only exist between units of the same dimension.")
    )]
    NoConversionPossible { from: String, to: String },

    #[error("units {units:?} are unreachable starting from {start}")]
    #[diagnostic(
        code(units::conversion::unreachable),
        help(
            "The requested units lie in disconnected parts of the conversion graph. \
             Declare a conversion edge linking them."
        )
    )]
    UnreachableUnit { units: Vec<String>, start: String },

    #[error("no conversion path from {from} to {to}")]
    #[diagnostic(
        code(units::conversion::no_path),
        help("Both units are known but no chain of declared conversions links them.")
    )]
    NoPath { from: String, to: String },
}

/// Convenience alias for functions returning simple-units results.
pub type UnitsResult<T> = std::result::Result<T, UnitsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_converts_to_units_error() {
        let err = RegistryError::AlreadyDefined {
            name: "Length".into(),
        };
        let top: UnitsError = err.into();
        assert!(matches!(
            top,
            UnitsError::Registry(RegistryError::AlreadyDefined { .. })
        ));
    }

    #[test]
    fn invalid_type_message_names_both_operands() {
        let err = ArithmeticError::InvalidType {
            operation: "add",
            left: "Length".into(),
            right: "Time".into(),
        };
        let msg = err.to_string();
        assert_eq!(msg, "no way to add Length and Time");
    }

    #[test]
    fn unreachable_lists_units() {
        let err = ConversionError::UnreachableUnit {
            units: vec!["Buzz".into()],
            start: "Quark".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("Buzz"));
        assert!(msg.contains("Quark"));
    }
}
