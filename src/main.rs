//! units CLI: dimensional algebra and unit conversion.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use simple_units::export::SystemExport;
use simple_units::quantity::Quantity;
use simple_units::relation::Origin;
use simple_units::seeds::{SeedRegistry, apply_seed, load_seed_file};
use simple_units::system::UnitSystem;

#[derive(Parser)]
#[command(name = "units", version, about = "Dimensional algebra and unit conversion")]
struct Cli {
    /// Bundled seed pack to start from (see `units seeds`).
    #[arg(long, global = true, default_value = "si")]
    pack: String,

    /// Additional seed file(s) to apply after the pack, in order.
    #[arg(long, global = true)]
    seed: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available seed packs.
    Seeds,

    /// List dimensions and their base units.
    Dimensions,

    /// List units, optionally only those of one dimension.
    Units {
        /// Dimension name.
        #[arg(long)]
        dimension: Option<String>,
    },

    /// List the closed relation table.
    Relations {
        /// Only show declared relations.
        #[arg(long)]
        declared: bool,
    },

    /// Convert a value from one unit to another.
    Convert {
        value: f64,
        from: String,
        to: String,
    },

    /// Show the chain of declared conversions between two units.
    Path { from: String, to: String },

    /// Multiply two quantities, e.g. `multiply 3 Meter 4 Meter`.
    Multiply {
        a: f64,
        a_unit: String,
        b: f64,
        b_unit: String,
    },

    /// Divide two quantities, e.g. `divide 100 Meter 9.58 Second`.
    Divide {
        a: f64,
        a_unit: String,
        b: f64,
        b_unit: String,
    },

    /// Export the unit system as JSON.
    Export,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = SeedRegistry::bundled();

    if let Commands::Seeds = cli.command {
        for pack in registry.list() {
            let requires = if pack.requires.is_empty() {
                String::new()
            } else {
                format!(" (requires {})", pack.requires.join(", "))
            };
            println!("{:<10} {} v{}{requires}", pack.id, pack.name, pack.version);
            println!("           {}", pack.description);
        }
        return Ok(());
    }

    let system = build_system(&registry, &cli.pack, &cli.seed)?;

    match cli.command {
        // Listed before the system is built.
        Commands::Seeds => {}

        Commands::Dimensions => {
            for dim in system.dimensions() {
                let base = system.base_unit(dim.id)?;
                println!("{:<20} {}", dim.name, base.name);
            }
        }

        Commands::Units { dimension } => {
            let units: Vec<_> = match dimension {
                Some(name) => system.units_of(system.dimension(&name)?.id),
                None => system.units().iter().collect(),
            };
            for unit in units {
                let dim = system.dimension_of(unit)?;
                println!(
                    "{:<20} {:<20} {}",
                    unit.name, dim.name, unit.conversion_factor
                );
            }
        }

        Commands::Relations { declared } => {
            let table = system.relations();
            for (key, relation) in table.iter() {
                if declared && relation.origin != Origin::Declared {
                    continue;
                }
                let tag = match relation.origin {
                    Origin::Declared => "declared",
                    Origin::Derived => "derived",
                };
                println!(
                    "{:<40} = {:<20} [{tag}]",
                    system.describe_key(key),
                    system.dimension_by_id(relation.result)?.name
                );
            }
            println!("{} relations", table.len());
        }

        Commands::Convert { value, from, to } => {
            let q = system.quantity_of(&from, value)?;
            println!("{q} = {}", q.convert_to_named(&to)?);
        }

        Commands::Path { from, to } => {
            let from = system.unit(&from)?;
            let to = system.unit(&to)?;
            let path = system.conversion_path(from, to)?;
            let names = path
                .units
                .iter()
                .map(|id| system.unit_by_id(*id).map(|u| u.name.to_string()))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            println!("{}", names.join(" -> "));
            println!("1 {} = {} {} ({} hops)", from.name, path.factor, to.name, path.hops());
        }

        Commands::Multiply {
            a,
            a_unit,
            b,
            b_unit,
        } => {
            let (qa, qb) = operands(&system, a, &a_unit, b, &b_unit)?;
            println!("{qa} * {qb} = {}", (qa * qb)?);
        }

        Commands::Divide {
            a,
            a_unit,
            b,
            b_unit,
        } => {
            let (qa, qb) = operands(&system, a, &a_unit, b, &b_unit)?;
            println!("{qa} / {qb} = {}", (qa / qb)?);
        }

        Commands::Export => {
            let json = SystemExport::from_system(&system).to_json().into_diagnostic()?;
            println!("{json}");
        }
    }

    Ok(())
}

fn build_system(registry: &SeedRegistry, pack: &str, seeds: &[PathBuf]) -> Result<UnitSystem> {
    let mut system = registry.build_system(pack)?;
    for path in seeds {
        let extra = load_seed_file(path)?;
        for required in &extra.requires {
            registry.apply(required, &mut system)?;
        }
        let report = apply_seed(&extra, &mut system)?;
        tracing::debug!(
            seed = %report.id,
            units = report.units_applied,
            "applied external seed"
        );
    }
    Ok(system)
}

fn operands<'s>(
    system: &'s UnitSystem,
    a: f64,
    a_unit: &str,
    b: f64,
    b_unit: &str,
) -> Result<(Quantity<'s>, Quantity<'s>)> {
    Ok((system.quantity_of(a_unit, a)?, system.quantity_of(b_unit, b)?))
}
