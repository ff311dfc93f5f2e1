use std::{env, io};

use portalx::{ProjectConfig, SearchError, SearchOrchestrator, SectionCatalog};
use tracing_subscriber::{fmt, EnvFilter};

const SECTIONS: &str = include_str!("sections.csv");
const PROJECT: &str = include_str!("project.toml");

/// Log search progress to stderr, `RUST_LOG` overriding the `info` default.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    // A subscriber may already be installed by an embedding process.
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    // Optional arguments: a project file followed by a section table.
    let mut args = env::args().skip(1);
    let project = match args.next() {
        Some(path) => ProjectConfig::from_path(path)?,
        None => ProjectConfig::from_toml_str(PROJECT)?,
    };
    let catalog = match args.next() {
        Some(path) => SectionCatalog::from_csv_path(path)?,
        None => SectionCatalog::from_csv_reader(SECTIONS.as_bytes())?,
    };

    let orchestrator = SearchOrchestrator::from_project(&project, catalog)?;
    let design = match orchestrator.run() {
        Ok(design) => design,
        Err(SearchError::NoFeasibleDesign) => {
            println!("no section pair satisfies the deflection and strength limits");
            return Ok(());
        }
        Err(error) => return Err(error.into()),
    };

    println!(
        "rafter {} / column {}: {:.1} kg",
        design.rafter.designation, design.column.designation, design.report.weight
    );
    for outcome in [&design.rafter_first, &design.column_first] {
        println!(
            "{:>12}: {} pairs in {} batches, {} feasible",
            outcome.direction.to_string(),
            outcome.stats.evaluations,
            outcome.stats.batches,
            outcome.stats.feasible
        );
    }
    println!("{}", design.report.to_json()?);

    Ok(())
}
