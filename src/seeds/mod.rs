//! Seed packs: unit-set declarations loaded at startup.
//!
//! A seed pack is a TOML file listing dimensions, derived dimensions and units
//! in declaration order. Applying a pack replays those declarations against a
//! [`UnitSystem`]. Two packs are bundled into the binary: `si` and `imperial`
//! (which requires `si`).
//!
//! ```toml
//! [seed]
//! id = "nautical"
//! name = "Nautical"
//! version = "1.0.0"
//! description = "Nautical miles and knots"
//! requires = ["si"]
//!
//! [[units]]
//! name = "Nautical_mile"
//! expr = "1852 * Meter"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::error::UnitsError;
use crate::system::{SystemConfig, UnitSystem};

// ── Errors ──────────────────────────────────────────────────────────────

#[derive(Debug, Error, Diagnostic)]
pub enum SeedError {
    #[error("seed pack not found: \"{id}\"")]
    #[diagnostic(
        code(units::seed::not_found),
        help("List available packs with `units seeds`, or pass a seed file with `--seed <path>`.")
    )]
    NotFound { id: String },

    #[error("failed to parse seed pack \"{id}\": {message}")]
    #[diagnostic(
        code(units::seed::parse),
        help("Check the seed.toml syntax: a [seed] table plus [[dimensions]], [[derived]] and [[units]] arrays.")
    )]
    Parse { id: String, message: String },

    #[error("failed to read seed file: {path}")]
    #[diagnostic(code(units::seed::io), help("Ensure the file exists and is readable."))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to apply seed \"{id}\": {message}")]
    #[diagnostic(
        code(units::seed::apply),
        help(
            "Declarations are replayed in file order: a derived dimension or unit can only \
             refer to names declared before it, or in a pack listed under `requires`."
        )
    )]
    Apply { id: String, message: String },
}

pub type SeedResult<T> = std::result::Result<T, SeedError>;

// ── Seed pack data model ────────────────────────────────────────────────

/// A seed pack: TOML-defined unit set.
#[derive(Debug, Clone)]
pub struct SeedPack {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    /// Packs that must be applied first.
    pub requires: Vec<String>,
    /// System tunables, used when the pack builds a fresh system.
    pub config: Option<SystemConfig>,
    pub dimensions: Vec<SeedDimension>,
    pub derived: Vec<SeedDerived>,
    pub units: Vec<SeedUnit>,
    /// Source: `Bundled` or `External(path)`.
    pub source: SeedSource,
}

/// Where a seed pack came from.
#[derive(Debug, Clone)]
pub enum SeedSource {
    /// Bundled into the binary via `include_str!`.
    Bundled,
    /// Loaded from an external file.
    External(PathBuf),
}

/// A base dimension and its base unit.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedDimension {
    pub name: String,
    pub base_unit: String,
}

/// A dimension defined by a relation, e.g. `Area = Length*Length`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedDerived {
    pub expr: String,
    pub name: String,
    pub base_unit: String,
}

/// A unit scaled from an existing one, e.g. `Feet = Meter * 0.3048`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUnit {
    pub name: String,
    pub expr: String,
}

/// Report after applying a seed pack.
#[derive(Debug, Clone)]
pub struct SeedReport {
    pub id: String,
    pub dimensions_applied: usize,
    pub derived_applied: usize,
    pub units_applied: usize,
    pub already_applied: bool,
}

// ── TOML deserialization helpers ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SeedToml {
    seed: SeedMeta,
    #[serde(default)]
    config: Option<SystemConfig>,
    #[serde(default)]
    dimensions: Vec<SeedDimension>,
    #[serde(default)]
    derived: Vec<SeedDerived>,
    #[serde(default)]
    units: Vec<SeedUnit>,
}

#[derive(Debug, Deserialize)]
struct SeedMeta {
    id: String,
    name: String,
    version: String,
    description: String,
    #[serde(default)]
    requires: Vec<String>,
}

// ── Bundled seed packs ──────────────────────────────────────────────────

const SI_TOML: &str = include_str!("../../data/seeds/si/seed.toml");
const IMPERIAL_TOML: &str = include_str!("../../data/seeds/imperial/seed.toml");

/// Parse a seed pack from TOML text.
pub fn parse_seed_toml(toml_str: &str, source: SeedSource) -> SeedResult<SeedPack> {
    let parsed: SeedToml = toml::from_str(toml_str).map_err(|e| SeedError::Parse {
        id: "(unknown)".into(),
        message: e.to_string(),
    })?;
    Ok(SeedPack {
        id: parsed.seed.id,
        name: parsed.seed.name,
        version: parsed.seed.version,
        description: parsed.seed.description,
        requires: parsed.seed.requires,
        config: parsed.config,
        dimensions: parsed.dimensions,
        derived: parsed.derived,
        units: parsed.units,
        source,
    })
}

/// Read and parse a seed pack from a file.
pub fn load_seed_file(path: &Path) -> SeedResult<SeedPack> {
    let content = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_seed_toml(&content, SeedSource::External(path.to_path_buf()))
}

fn bundled_packs() -> Vec<SeedPack> {
    [(SI_TOML, "si"), (IMPERIAL_TOML, "imperial")]
        .iter()
        .filter_map(
            |(toml, id)| match parse_seed_toml(toml, SeedSource::Bundled) {
                Ok(pack) => Some(pack),
                Err(e) => {
                    tracing::warn!(seed = id, "Failed to parse bundled seed: {e}");
                    None
                }
            },
        )
        .collect()
}

// ── Seed Registry ───────────────────────────────────────────────────────

/// Registry of available seed packs (bundled + discovered from disk).
pub struct SeedRegistry {
    packs: HashMap<String, SeedPack>,
}

impl SeedRegistry {
    /// Create a registry with only bundled packs.
    pub fn bundled() -> Self {
        let packs = bundled_packs()
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        Self { packs }
    }

    /// Discover seed packs from a directory (in addition to bundled packs).
    ///
    /// Each subdirectory containing a `seed.toml` is loaded as a pack.
    pub fn discover(seeds_dir: &Path) -> Self {
        let mut registry = Self::bundled();

        if let Ok(entries) = std::fs::read_dir(seeds_dir) {
            for entry in entries.flatten() {
                let seed_file = entry.path().join("seed.toml");
                if !seed_file.is_file() {
                    continue;
                }
                match load_seed_file(&seed_file) {
                    Ok(pack) => registry.insert(pack),
                    Err(e) => {
                        tracing::warn!(path = %seed_file.display(), "Failed to load seed pack: {e}");
                    }
                }
            }
        }

        registry
    }

    /// Add or replace a pack.
    pub fn insert(&mut self, pack: SeedPack) {
        self.packs.insert(pack.id.clone(), pack);
    }

    /// List all available seed packs.
    pub fn list(&self) -> Vec<&SeedPack> {
        let mut packs: Vec<&SeedPack> = self.packs.values().collect();
        packs.sort_by(|a, b| a.id.cmp(&b.id));
        packs
    }

    /// Get a seed pack by ID.
    pub fn get(&self, id: &str) -> SeedResult<&SeedPack> {
        self.packs
            .get(id)
            .ok_or_else(|| SeedError::NotFound { id: id.to_string() })
    }

    /// Apply a pack and, first, every pack it requires.
    pub fn apply(&self, pack_id: &str, system: &mut UnitSystem) -> SeedResult<Vec<SeedReport>> {
        let mut reports = Vec::new();
        self.apply_with_requirements(pack_id, system, &mut Vec::new(), &mut reports)?;
        Ok(reports)
    }

    fn apply_with_requirements(
        &self,
        pack_id: &str,
        system: &mut UnitSystem,
        visiting: &mut Vec<String>,
        reports: &mut Vec<SeedReport>,
    ) -> SeedResult<()> {
        if visiting.iter().any(|v| v == pack_id) {
            return Err(SeedError::Apply {
                id: pack_id.to_string(),
                message: format!("requirement cycle: {} -> {pack_id}", visiting.join(" -> ")),
            });
        }
        let pack = self.get(pack_id)?;
        visiting.push(pack_id.to_string());
        for required in &pack.requires {
            self.apply_with_requirements(required, system, visiting, reports)?;
        }
        visiting.pop();
        reports.push(apply_seed(pack, system)?);
        Ok(())
    }

    /// Build a fresh system from a pack and its requirements, using the
    /// pack's `[config]` table when present.
    pub fn build_system(&self, pack_id: &str) -> SeedResult<UnitSystem> {
        let pack = self.get(pack_id)?;
        let mut system = UnitSystem::with_config(pack.config.clone().unwrap_or_default());
        self.apply(pack_id, &mut system)?;
        Ok(system)
    }
}

// ── Application logic ───────────────────────────────────────────────────

fn apply_error(pack: &SeedPack, what: &str, err: UnitsError) -> SeedError {
    SeedError::Apply {
        id: pack.id.clone(),
        message: format!("{what}: {err}"),
    }
}

/// Replay a pack's declarations against `system`. Idempotent: a pack already
/// applied to this system is skipped.
///
/// All-or-nothing: declarations run against a staged copy that replaces
/// `system` only once every one of them succeeded.
pub fn apply_seed(pack: &SeedPack, system: &mut UnitSystem) -> SeedResult<SeedReport> {
    if system.has_seed(&pack.id) {
        return Ok(SeedReport {
            id: pack.id.clone(),
            dimensions_applied: 0,
            derived_applied: 0,
            units_applied: 0,
            already_applied: true,
        });
    }

    let mut staged = system.staged();

    for dim in &pack.dimensions {
        staged
            .new_dimension(&dim.name, &dim.base_unit)
            .map_err(|e| apply_error(pack, &format!("dimension '{}'", dim.name), e))?;
    }

    for derived in &pack.derived {
        let what = format!("derived dimension '{}'", derived.name);
        let expr = staged
            .parse_dimension_expr(&derived.expr)
            .map_err(|e| apply_error(pack, &what, e))?;
        staged
            .add_derived_dimension(expr, &derived.name, &derived.base_unit)
            .map_err(|e| apply_error(pack, &what, e))?;
    }

    for unit in &pack.units {
        let what = format!("unit '{}'", unit.name);
        let expr = staged
            .parse_unit_expr(&unit.expr)
            .map_err(|e| apply_error(pack, &what, e))?;
        staged
            .add_unit(&unit.name, expr)
            .map_err(|e| apply_error(pack, &what, e))?;
    }

    staged.mark_seed(&pack.id);
    *system = staged;
    tracing::info!(
        seed = %pack.id,
        dimensions = pack.dimensions.len(),
        derived = pack.derived.len(),
        units = pack.units.len(),
        "applied seed pack"
    );

    Ok(SeedReport {
        id: pack.id.clone(),
        dimensions_applied: pack.dimensions.len(),
        derived_applied: pack.derived.len(),
        units_applied: pack.units.len(),
        already_applied: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::Operator;

    #[test]
    fn bundled_packs_parse() {
        let packs = bundled_packs();
        assert_eq!(packs.len(), 2);
        assert!(packs.iter().any(|p| p.id == "si"));
        assert!(packs.iter().any(|p| p.id == "imperial"));
    }

    #[test]
    fn si_pack_declares_base_dimensions() {
        let reg = SeedRegistry::bundled();
        let si = reg.get("si").unwrap();
        assert_eq!(si.dimensions.len(), 7);
        assert!(si.derived.iter().any(|d| d.name == "Resistance"));
        assert_eq!(si.config.as_ref().map(|c| c.float_places), Some(7));
    }

    #[test]
    fn apply_si_builds_closed_relations() {
        let reg = SeedRegistry::bundled();
        let mut us = UnitSystem::new();
        let reports = reg.apply("si", &mut us).unwrap();
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].already_applied);

        let table = us.relations();
        assert!(table.is_closed());
        let force = us.dimension("Force").unwrap().id;
        let mass = us.dimension("Mass").unwrap().id;
        let accel = us.dimension("Acceleration").unwrap().id;
        assert_eq!(table.resolve(force, Operator::Div, mass), Some(accel));

        let again = reg.apply("si", &mut us).unwrap();
        assert!(again[0].already_applied);
    }

    #[test]
    fn imperial_pulls_in_si() {
        let reg = SeedRegistry::bundled();
        let us = reg.build_system("imperial").unwrap();
        let ids: Vec<&str> = us.seeds().iter().map(String::as_str).collect();
        assert_eq!(ids, ["si", "imperial"]);
        let mile = us.quantity_of("Mile", 1.0).unwrap();
        let km = mile.convert_to_named("Kilometer").unwrap();
        assert!((km.nominal() - 1.609344).abs() < 1e-9);
    }

    #[test]
    fn unknown_unit_in_pack_fails_to_apply() {
        let toml = r#"
            [seed]
            id = "broken"
            name = "Broken"
            version = "0.1.0"
            description = "refers to an undeclared unit"

            [[units]]
            name = "Furlong"
            expr = "Chain * 10"
        "#;
        let pack = parse_seed_toml(toml, SeedSource::Bundled).unwrap();
        let mut us = UnitSystem::new();
        let err = apply_seed(&pack, &mut us).unwrap_err();
        assert!(matches!(err, SeedError::Apply { ref id, .. } if id == "broken"));
    }

    #[test]
    fn failed_apply_leaves_system_untouched() {
        let toml = r#"
            [seed]
            id = "half"
            name = "Half"
            version = "0.1.0"
            description = "a dimension, then a unit scaled from nothing"

            [[dimensions]]
            name = "Length"
            base_unit = "Meter"

            [[units]]
            name = "Furlong"
            expr = "Chain * 10"
        "#;
        let pack = parse_seed_toml(toml, SeedSource::Bundled).unwrap();
        let mut us = UnitSystem::new();
        us.new_dimension("Time", "Second").unwrap();

        for _ in 0..2 {
            let err = apply_seed(&pack, &mut us).unwrap_err();
            assert!(
                matches!(err, SeedError::Apply { ref message, .. } if message.contains("Furlong")),
                "{err}"
            );
            assert_eq!(us.dimensions().len(), 1);
            assert_eq!(us.units().len(), 1);
            assert!(us.dimension("Length").is_err());
            assert!(us.seeds().is_empty());
        }
    }

    #[test]
    fn failed_derived_dimension_keeps_relations() {
        let toml = r#"
            [seed]
            id = "bad_area"
            name = "Bad area"
            version = "0.1.0"
            description = "declares Area then an invalid unit"

            [[derived]]
            expr = "Length*Length"
            name = "Area"
            base_unit = "Meter^2"

            [[units]]
            name = "Acre"
            expr = "Meter^2 * 0"
        "#;
        let pack = parse_seed_toml(toml, SeedSource::Bundled).unwrap();
        let mut us = UnitSystem::new();
        us.new_dimension("Length", "Meter").unwrap();
        assert!(apply_seed(&pack, &mut us).is_err());
        assert!(us.relations().is_empty());
        assert!(us.dimension("Area").is_err());
        assert_eq!(us.conversion_graph().unit_count(), 1);
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = parse_seed_toml("[seed]\nid = 3", SeedSource::Bundled).unwrap_err();
        assert!(matches!(err, SeedError::Parse { .. }));
    }

    #[test]
    fn missing_pack_is_not_found() {
        let reg = SeedRegistry::bundled();
        assert!(matches!(reg.get("klingon"), Err(SeedError::NotFound { .. })));
    }

    #[test]
    fn requirement_cycle_is_reported() {
        let mut reg = SeedRegistry::bundled();
        for (id, other) in [("a", "b"), ("b", "a")] {
            let toml = format!(
                "[seed]\nid = \"{id}\"\nname = \"{id}\"\nversion = \"0\"\ndescription = \"\"\nrequires = [\"{other}\"]\n"
            );
            reg.insert(parse_seed_toml(&toml, SeedSource::Bundled).unwrap());
        }
        let mut us = UnitSystem::new();
        let err = reg.apply("a", &mut us).unwrap_err();
        assert!(matches!(err, SeedError::Apply { ref message, .. } if message.contains("requirement cycle")));
    }
}
