// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # simple-units
//!
//! A dimensional-algebra and unit-conversion engine: declare dimensions,
//! relate them by products and quotients, attach scaled units, and compute
//! with quantities that reject dimensionally meaningless operations.
//!
//! ## Architecture
//!
//! - **Relation table** (`relation`): typed `(lhs, op, rhs)` keys closed to a fixed point
//! - **Conversion graph** (`conversion`): petgraph digraph of units weighted by factors
//! - **Unit system** (`system`): explicit registry owning dimensions, units and both tables
//! - **Quantities** (`quantity`): value + unit, arithmetic checked against the relation table
//! - **Seed packs** (`seeds`): TOML unit sets, SI and imperial bundled
//!
//! ## Library usage
//!
//! ```no_run
//! use simple_units::seeds::SeedRegistry;
//!
//! let us = SeedRegistry::bundled().build_system("imperial").unwrap();
//! let speed = us.quantity_of("Miles_hour", 60.0).unwrap();
//! let hours = us.quantity_of("Hour", 2.0).unwrap();
//! let distance = (speed * hours).unwrap();
//! println!("{}", distance.convert_to_named("Kilometer").unwrap());
//! ```

pub mod conversion;
pub mod dimension;
pub mod error;
pub mod export;
pub mod id;
pub mod quantity;
pub mod relation;
pub mod seeds;
pub mod system;
pub mod unit;
