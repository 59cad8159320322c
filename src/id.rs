//! Identifier types for systems, dimensions and units.
//!
//! All identifiers wrap a `NonZeroU64` so that `Option<Id>` is the same size
//! as `Id`. Dimension and unit IDs are dense, 1-based positions inside the
//! [`UnitSystem`](crate::system::UnitSystem) that allocated them; a
//! [`SystemId`] tells those systems apart.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

macro_rules! dense_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(NonZeroU64);

        impl $name {
            /// Create an ID from a raw `u64`. Returns `None` if `raw` is zero.
            pub fn new(raw: u64) -> Option<Self> {
                NonZeroU64::new(raw).map($name)
            }

            /// ID for the zero-based slot `index`.
            pub(crate) fn from_index(index: usize) -> Self {
                $name(NonZeroU64::MIN.saturating_add(index as u64))
            }

            /// Zero-based slot of this ID.
            pub(crate) fn index(self) -> usize {
                (self.0.get() - 1) as usize
            }

            /// Get the underlying `u64` value.
            pub fn get(self) -> u64 {
                self.0.get()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

dense_id!(
    /// Identifier of a dimension within one unit system.
    DimensionId,
    "dim"
);

dense_id!(
    /// Identifier of a unit within one unit system.
    UnitId,
    "unit"
);

/// Process-unique identity of a [`UnitSystem`](crate::system::UnitSystem).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SystemId(NonZeroU64);

static NEXT_SYSTEM: AtomicU64 = AtomicU64::new(1);

impl SystemId {
    /// Allocate a fresh system identity.
    pub(crate) fn fresh() -> Self {
        let raw = NEXT_SYSTEM.fetch_add(1, Ordering::Relaxed);
        SystemId(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MAX))
    }

    /// Sentinel identity matching no live system.
    pub(crate) fn foreign() -> Self {
        SystemId(NonZeroU64::MAX)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_niche_optimization() {
        assert_eq!(
            std::mem::size_of::<Option<UnitId>>(),
            std::mem::size_of::<UnitId>()
        );
    }

    #[test]
    fn index_round_trips_through_id() {
        let id = DimensionId::from_index(0);
        assert_eq!(id.get(), 1);
        assert_eq!(id.index(), 0);
        assert_eq!(UnitId::from_index(41).get(), 42);
    }

    #[test]
    fn zero_is_none() {
        assert!(UnitId::new(0).is_none());
        assert_eq!(DimensionId::new(7).unwrap().get(), 7);
    }

    #[test]
    fn systems_get_distinct_ids() {
        let a = SystemId::fresh();
        let b = SystemId::fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn display_uses_prefix() {
        assert_eq!(DimensionId::new(3).unwrap().to_string(), "dim:3");
        assert_eq!(UnitId::new(5).unwrap().to_string(), "unit:5");
    }
}
