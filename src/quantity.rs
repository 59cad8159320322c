//! Quantities: a nominal value tagged with a unit.
//!
//! `real_quantity = nominal * unit.conversion_factor` is the value in the
//! dimension's base unit; every comparison and cross-unit operation works on
//! real quantities. Quantities are immutable and `Copy`; each operator
//! returns a new one.
//!
//! Operators between two quantities return [`UnitsResult`] because the
//! dimensions may not combine:
//!
//! - `+`, `-`, [`Quantity::try_eq`]: same dimension or `InvalidType`; sums and
//!   differences come back in the left operand's base unit.
//! - `*`, `/`: looked up in the system's closed relation table; the result is
//!   in the resulting dimension's base unit.
//!
//! Scaling by a plain `f64` always succeeds and keeps the unit.

use std::ops::{Add, Div, Mul, Sub};

use crate::dimension::Dimension;
use crate::error::{ArithmeticError, ConversionError, UnitsResult};
use crate::relation::RelationKey;
use crate::system::UnitSystem;
use crate::unit::Unit;

/// Precision cap for [`Quantity::approx_eq`].
const MAX_PLACES: u32 = 308;

/// A value in a unit of a [`UnitSystem`].
#[derive(Clone, Copy)]
pub struct Quantity<'s> {
    system: &'s UnitSystem,
    unit: &'s Unit,
    nominal: f64,
}

impl<'s> Quantity<'s> {
    /// `unit` must be the system's own copy.
    pub(crate) fn new(system: &'s UnitSystem, unit: &'s Unit, nominal: f64) -> Self {
        Self {
            system,
            unit,
            nominal,
        }
    }

    /// A quantity in `unit` whose real quantity is `real`.
    pub(crate) fn from_real(system: &'s UnitSystem, unit: &'s Unit, real: f64) -> Self {
        Self::new(system, unit, real / unit.conversion_factor)
    }

    /// The value as written, in this quantity's unit.
    pub fn nominal(&self) -> f64 {
        self.nominal
    }

    /// The value in the dimension's base unit.
    pub fn real_quantity(&self) -> f64 {
        self.nominal * self.unit.conversion_factor
    }

    pub fn unit(&self) -> &'s Unit {
        self.unit
    }

    pub fn system(&self) -> &'s UnitSystem {
        self.system
    }

    pub fn dimension(&self) -> UnitsResult<&'s Dimension> {
        self.system.dimension_by_id(self.unit.dimension)
    }

    fn dimension_name(&self) -> String {
        self.system.dimension_name(self.unit.dimension)
    }

    fn with_nominal(self, nominal: f64) -> Self {
        Self { nominal, ..self }
    }

    fn invalid(&self, operation: &'static str, other: &Quantity<'_>) -> ArithmeticError {
        ArithmeticError::InvalidType {
            operation,
            left: self.dimension_name(),
            right: other.dimension_name(),
        }
    }

    /// Both operands must live in the same system and dimension.
    fn check_like(&self, operation: &'static str, other: &Quantity<'_>) -> Result<(), ArithmeticError> {
        if self.system.id() != other.system.id() {
            return Err(ArithmeticError::InvalidType {
                operation,
                left: format!("{} (system {})", self.dimension_name(), self.system.id().get()),
                right: format!("{} (system {})", other.dimension_name(), other.system.id().get()),
            });
        }
        if self.unit.dimension != other.unit.dimension {
            return Err(self.invalid(operation, other));
        }
        Ok(())
    }

    fn additive(self, other: Quantity<'_>, operation: &'static str, sign: f64) -> UnitsResult<Self> {
        self.check_like(operation, &other)?;
        let base = self.system.base_unit(self.unit.dimension)?;
        let real = self.real_quantity() + sign * other.real_quantity();
        Ok(Quantity::from_real(self.system, base, real))
    }

    fn relational(
        self,
        other: Quantity<'_>,
        operation: &'static str,
        key: RelationKey,
        real: f64,
    ) -> UnitsResult<Self> {
        if self.system.id() != other.system.id() {
            return Err(self.invalid(operation, &other).into());
        }
        let Some(result) = self.system.relation_table().get(&key) else {
            return Err(self.invalid(operation, &other).into());
        };
        let base = self.system.base_unit(result)?;
        Ok(Quantity::from_real(self.system, base, real))
    }

    /// Equality of real quantities. Comparing different dimensions is an error,
    /// not `false`.
    pub fn try_eq(&self, other: &Quantity<'_>) -> UnitsResult<bool> {
        self.check_like("compare", other)?;
        Ok(self.real_quantity() == other.real_quantity())
    }

    /// Equality after rounding the difference of real quantities to `places`
    /// decimal places.
    pub fn approx_eq(&self, other: &Quantity<'_>, places: u32) -> UnitsResult<bool> {
        self.check_like("compare", other)?;
        // 10^308 is the largest finite power of ten.
        let scale = 10f64.powi(places.min(MAX_PLACES) as i32);
        let diff = (self.real_quantity() - other.real_quantity()).abs();
        Ok((diff * scale).round() == 0.0)
    }

    /// [`approx_eq`](Self::approx_eq) with the system's configured precision.
    pub fn approx_eq_default(&self, other: &Quantity<'_>) -> UnitsResult<bool> {
        self.approx_eq(other, self.system.config().float_places)
    }

    /// The same real quantity expressed in `target`.
    pub fn convert_to(&self, target: &Unit) -> UnitsResult<Quantity<'s>> {
        let member = target.system() == self.system.id()
            && self.system.is_member(target.id, self.unit.dimension);
        if !member {
            return Err(ConversionError::NoConversionPossible {
                from: self.unit.name.to_string(),
                to: target.name.to_string(),
            }
            .into());
        }
        let target = self.system.unit_by_id(target.id)?;
        Ok(Quantity::from_real(self.system, target, self.real_quantity()))
    }

    /// [`convert_to`](Self::convert_to) by unit name.
    pub fn convert_to_named(&self, unit_name: &str) -> UnitsResult<Quantity<'s>> {
        let target = self.system.unit(unit_name)?;
        self.convert_to(target)
    }

    pub fn abs(self) -> Self {
        self.with_nominal(self.nominal.abs())
    }

    /// Round the nominal value to the nearest integer.
    pub fn round(self) -> Self {
        self.with_nominal(self.nominal.round())
    }
}

impl std::fmt::Display for Quantity<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.nominal, self.unit.name)
    }
}

impl std::fmt::Debug for Quantity<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Quantity")
            .field("nominal", &self.nominal)
            .field("unit", &self.unit.name)
            .field("real_quantity", &self.real_quantity())
            .finish()
    }
}

impl<'s> Add<Quantity<'_>> for Quantity<'s> {
    type Output = UnitsResult<Quantity<'s>>;

    fn add(self, rhs: Quantity<'_>) -> Self::Output {
        self.additive(rhs, "add", 1.0)
    }
}

impl<'s> Sub<Quantity<'_>> for Quantity<'s> {
    type Output = UnitsResult<Quantity<'s>>;

    fn sub(self, rhs: Quantity<'_>) -> Self::Output {
        self.additive(rhs, "subtract", -1.0)
    }
}

impl<'s> Mul<Quantity<'_>> for Quantity<'s> {
    type Output = UnitsResult<Quantity<'s>>;

    fn mul(self, rhs: Quantity<'_>) -> Self::Output {
        // `other*self` resolves asymmetric tables through the commuted entries
        // closure installs.
        let key = RelationKey::mul(rhs.unit.dimension, self.unit.dimension);
        let real = self.real_quantity() * rhs.real_quantity();
        self.relational(rhs, "multiply", key, real)
    }
}

impl<'s> Div<Quantity<'_>> for Quantity<'s> {
    type Output = UnitsResult<Quantity<'s>>;

    fn div(self, rhs: Quantity<'_>) -> Self::Output {
        let key = RelationKey::div(self.unit.dimension, rhs.unit.dimension);
        let real = self.real_quantity() / rhs.real_quantity();
        self.relational(rhs, "divide", key, real)
    }
}

impl<'s> Mul<f64> for Quantity<'s> {
    type Output = Quantity<'s>;

    fn mul(self, k: f64) -> Quantity<'s> {
        self.with_nominal(self.nominal * k)
    }
}

impl<'s> Mul<Quantity<'s>> for f64 {
    type Output = Quantity<'s>;

    fn mul(self, q: Quantity<'s>) -> Quantity<'s> {
        q * self
    }
}

impl<'s> Div<f64> for Quantity<'s> {
    type Output = Quantity<'s>;

    fn div(self, k: f64) -> Quantity<'s> {
        self.with_nominal(self.nominal / k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RegistryError, UnitsError};
    use crate::system::SystemConfig;
    use approx::assert_relative_eq;

    fn length_time() -> UnitSystem {
        let mut us = UnitSystem::new();
        let meter = us.new_dimension("Length", "Meter").unwrap();
        us.new_dimension("Time", "Second").unwrap();
        let length = us.dimension("Length").unwrap().clone();
        let time = us.dimension("Time").unwrap().clone();
        us.add_derived_dimension(&length * &length, "Area", "Meter^2")
            .unwrap();
        us.add_derived_dimension(&length / &time, "Velocity", "Meters_second")
            .unwrap();
        let feet = us.add_unit("Feet", &meter / 3.208).unwrap();
        us.add_unit("Yard", &feet * 3.0).unwrap();
        us
    }

    fn q<'s>(us: &'s UnitSystem, unit: &str, value: f64) -> Quantity<'s> {
        us.quantity_of(unit, value).unwrap()
    }

    #[test]
    fn like_addition() {
        let us = length_time();
        let sum = (q(&us, "Meter", 10.0) + q(&us, "Meter", 10.0)).unwrap();
        assert!(sum.try_eq(&q(&us, "Meter", 20.0)).unwrap());
    }

    #[test]
    fn mixed_unit_sum_lands_in_base_unit() {
        let us = length_time();
        let sum = (q(&us, "Feet", 3.208) + q(&us, "Meter", 1.0)).unwrap();
        assert_eq!(&*sum.unit().name, "Meter");
        assert_relative_eq!(sum.nominal(), 2.0, epsilon = 1e-12);

        let diff = (q(&us, "Yard", 1.0) - q(&us, "Feet", 1.0)).unwrap();
        assert!(diff.approx_eq(&q(&us, "Feet", 2.0), 7).unwrap());
    }

    #[test]
    fn unlike_addition_is_invalid_type() {
        let us = length_time();
        let err = (q(&us, "Meter", 10.0) + q(&us, "Second", 20.0)).unwrap_err();
        assert!(matches!(
            err,
            UnitsError::Arithmetic(ArithmeticError::InvalidType { operation: "add", .. })
        ));
        assert!((q(&us, "Meter", 1.0) - q(&us, "Second", 1.0)).is_err());
    }

    #[test]
    fn comparing_dimensions_is_an_error() {
        let us = length_time();
        assert!(q(&us, "Meter", 1.0).try_eq(&q(&us, "Second", 1.0)).is_err());
        assert!(q(&us, "Meter", 10.0).try_eq(&q(&us, "Meter", 10.0)).unwrap());
        assert!(!q(&us, "Meter", 10.0).try_eq(&q(&us, "Meter", 11.0)).unwrap());
    }

    #[test]
    fn multiplication_resolves_through_relations() {
        let us = length_time();
        let area = (q(&us, "Meter", 10.0) * q(&us, "Meter", 10.0)).unwrap();
        assert!(area.try_eq(&q(&us, "Meter^2", 100.0)).unwrap());
        assert_eq!(area.dimension().unwrap().name.as_ref(), "Area");
    }

    #[test]
    fn division_uses_derived_inverse() {
        let us = length_time();
        let side = (q(&us, "Meter^2", 100.0) / q(&us, "Meter", 10.0)).unwrap();
        assert!(side.approx_eq(&q(&us, "Meter", 10.0), 7).unwrap());

        let distance = (q(&us, "Meters_second", 3.0) * q(&us, "Second", 4.0)).unwrap();
        assert!(distance.approx_eq(&q(&us, "Meter", 12.0), 7).unwrap());
    }

    #[test]
    fn multiplication_order_follows_commuted_entry() {
        let us = length_time();
        // Only Length/Time was declared; Time*Velocity exists only after closure.
        let a = (q(&us, "Second", 2.0) * q(&us, "Meters_second", 5.0)).unwrap();
        let b = (q(&us, "Meters_second", 5.0) * q(&us, "Second", 2.0)).unwrap();
        assert!(a.try_eq(&b).unwrap());
    }

    #[test]
    fn unrelated_product_is_invalid_type() {
        let us = length_time();
        let err = (q(&us, "Second", 2.0) * q(&us, "Second", 2.0)).unwrap_err();
        assert!(err.to_string().contains("multiply Time and Time"));
        assert!((q(&us, "Second", 2.0) / q(&us, "Meter", 2.0)).is_err());
    }

    #[test]
    fn scalar_scaling_keeps_unit() {
        let us = length_time();
        let feet = q(&us, "Feet", 1.0);
        assert!(q(&us, "Feet", 3.0).approx_eq(&(feet * 3.0), 7).unwrap());
        assert!(q(&us, "Feet", 3.0).approx_eq(&(3.0 * feet), 7).unwrap());
        assert!(feet.approx_eq(&(q(&us, "Feet", 3.0) / 3.0), 7).unwrap());
        assert_eq!(&*(feet * 3.0).unit().name, "Feet");
        assert!(q(&us, "Feet", 3.0).approx_eq(&q(&us, "Yard", 1.0), 7).unwrap());
    }

    #[test]
    fn conversion_round_trip() {
        let us = length_time();
        let feet = us.unit("Feet").unwrap();
        let meter = us.unit("Meter").unwrap();
        assert_relative_eq!(
            q(&us, "Feet", 3.208).real_quantity(),
            q(&us, "Meter", 1.0).real_quantity(),
            epsilon = 1e-12
        );
        let there = q(&us, "Meter", 1.0).convert_to(feet).unwrap();
        assert_relative_eq!(there.nominal(), 3.208, epsilon = 1e-12);
        let back = there.convert_to(meter).unwrap();
        assert_relative_eq!(back.nominal(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn conversion_across_dimensions_fails() {
        let us = length_time();
        let second = us.unit("Second").unwrap();
        let err = q(&us, "Meter", 1.0).convert_to(second).unwrap_err();
        assert!(matches!(
            err,
            UnitsError::Conversion(ConversionError::NoConversionPossible { .. })
        ));
        assert!(matches!(
            q(&us, "Meter", 1.0).convert_to_named("Parsec"),
            Err(UnitsError::Registry(RegistryError::UnknownUnit { .. }))
        ));
    }

    #[test]
    fn foreign_quantities_never_combine() {
        let a = length_time();
        let b = length_time();
        assert!((q(&a, "Meter", 1.0) + q(&b, "Meter", 1.0)).is_err());
        assert!((q(&a, "Meter", 1.0) * q(&b, "Meter", 1.0)).is_err());
        let foreign_feet = b.unit("Feet").unwrap();
        assert!(q(&a, "Meter", 1.0).convert_to(foreign_feet).is_err());
    }

    #[test]
    fn abs_round_and_display() {
        let us = length_time();
        let neg = q(&us, "Feet", -2.6);
        assert_eq!(neg.abs().nominal(), 2.6);
        assert_eq!(neg.round().nominal(), -3.0);
        assert_eq!(q(&us, "Meter", 1.5).to_string(), "1.5 Meter");
    }

    #[test]
    fn approx_eq_survives_huge_precision() {
        let us = length_time();
        let a = q(&us, "Meter", 1.5);
        assert!(a.approx_eq(&q(&us, "Meter", 1.5), 400).unwrap());
        assert!(a.approx_eq(&q(&us, "Meter", 1.5), u32::MAX).unwrap());
        assert!(!a.approx_eq(&q(&us, "Meter", 1.6), 400).unwrap());
    }

    #[test]
    fn approx_eq_default_uses_configured_places() {
        let mut us = UnitSystem::with_config(SystemConfig {
            float_places: 400,
            ..SystemConfig::default()
        });
        let meter = us.new_dimension("Length", "Meter").unwrap();
        let a = us.quantity(&meter, 2.0).unwrap();
        assert!(a.approx_eq_default(&us.quantity(&meter, 2.0).unwrap()).unwrap());
    }

    proptest::proptest! {
        #[test]
        fn addition_matches_summed_nominals(
            a in -1.0e6f64..1.0e6,
            b in -1.0e6f64..1.0e6,
            unit in proptest::sample::select(vec!["Meter", "Feet", "Yard"]),
        ) {
            let us = length_time();
            let sum = (q(&us, unit, a) + q(&us, unit, b)).unwrap();
            let expected = q(&us, unit, a + b).real_quantity();
            proptest::prop_assert!((sum.real_quantity() - expected).abs() <= 1e-9 * (1.0 + expected.abs()));
        }
    }
}
