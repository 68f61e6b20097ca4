//! The `solve` command: System-Optimal value of one or more networks.
//!
//! Every input file is parsed and solved on its own model; files are processed in parallel.
//! The value of each network is printed as `<file>: System Optimal = <value>`.
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use sotap::solve::{SolveArgs, solve_main};
//!
//! let args = SolveArgs {
//!     files: vec!["braess.net".into()],
//!     lp: true,
//!     output_dir: Some("models".into()),
//!     report: Some("braess.rpt".into()),
//!     time_limit: Some(60.0),
//!     verbose: false,
//! };
//!
//! solve_main(args)?;
//! # Ok(())
//! # }
//! ```

use std::{
    cmp, fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::*;
use clap::Parser;
use ordered_float::OrderedFloat;
use prettytable::*;
use rayon::prelude::*;

use crate::{
    AppError,
    assignment::{SolveOutcome, SystemOptimalModel, SystemOptimum},
    lp_model_builder,
    lp_solver::SolverSettings,
    read_file,
};

/// Command-line arguments for the solve command.
#[derive(Parser, Debug)]
pub struct SolveArgs {
    /// Network description files
    #[clap(required = true)]
    pub files: Vec<PathBuf>,

    /// Write the model of each network as `<stem>.lp`
    #[clap(long)]
    pub lp: bool,

    /// Directory for the `.lp` files (default: next to each input)
    #[clap(long, short)]
    pub output_dir: Option<PathBuf>,

    /// Per-edge flow report
    #[clap(long, short)]
    pub report: Option<PathBuf>,

    /// Solver time limit in seconds
    #[clap(long, short)]
    pub time_limit: Option<f64>,

    /// Show solver progress
    #[clap(long, short)]
    pub verbose: bool,
}

fn lp_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let file_name = input.with_extension("lp");
    match (output_dir, file_name.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => file_name,
    }
}

fn solve_file(input: &Path, args: &SolveArgs, settings: &SolverSettings) -> Result<SolveOutcome> {
    let network = read_file(input)?;
    tracing::debug!(
        "{}: {} nodes, {} edges, {} OD pairs",
        input.display(),
        network.graph.node_count(),
        network.graph.edge_count(),
        network.od.len()
    );

    let mut model = SystemOptimalModel::new(&network, lp_model_builder!(AssignmentModel))
        .with_context(|| format!("building the model of {}", input.display()))?;
    model.build()?;

    if args.lp {
        let path = lp_path(input, args.output_dir.as_deref());
        let name = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        fs::write(&path, model.export_lp(&name))
            .with_context(|| format!("writing {}", path.display()))?;
    }

    model.solve(settings)
}

fn write_report(writer: &mut impl Write, input: &Path, optimum: &SystemOptimum) -> Result<()> {
    writeln!(writer, "Network: {}", input.display())?;
    writeln!(
        writer,
        "Total cost: {:.3}  Total demand: {:.3}  System Optimal: {:.6}",
        optimum.total_cost, optimum.total_demand, optimum.value
    )?;

    let mut edges: Vec<_> = optimum.edges.iter().collect();
    edges.sort_by_key(|e| cmp::Reverse(OrderedFloat(e.cost)));

    let mut table = Table::new();
    table.set_titles(row!["Edge", "From", "To", "Flow", "Latency", "Cost"]);
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    for edge in edges {
        table.add_row(row![
            edge.name,
            edge.start,
            edge.end,
            format!("{:.3}", edge.flow),
            format!("{:.3}", edge.latency),
            format!("{:.3}", edge.cost),
        ]);
    }
    table.print(writer)?;
    writeln!(writer)?;

    Ok(())
}

/// Solve the System-Optimal assignment of every input network.
///
/// Fails with [`AppError::Infeasible`] or [`AppError::TimedOut`] when any network has no
/// solution, after every file has been attempted and reported.
pub fn solve_main(args: SolveArgs) -> Result<()> {
    let settings = SolverSettings {
        time_limit: args.time_limit,
        verbose: args.verbose,
    };

    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir)?;
    }

    let results: Vec<(&PathBuf, Result<SolveOutcome>)> = args
        .files
        .par_iter()
        .map(|input| (input, solve_file(input, &args, &settings)))
        .collect();

    let mut report = match &args.report {
        Some(path) => Some(BufWriter::new(fs::File::create(path)?)),
        None => None,
    };

    let mut failure = None;
    for (input, result) in results {
        match result? {
            SolveOutcome::Optimal(optimum) => {
                println!("{}: System Optimal = {}", input.display(), optimum.value);
                if let Some(writer) = report.as_mut() {
                    write_report(writer, input, &optimum)?;
                }
            }
            SolveOutcome::Infeasible => {
                println!("{}: infeasible", input.display());
                failure.get_or_insert(AppError::Infeasible);
            }
            SolveOutcome::TimedOut => {
                println!("{}: time limit reached", input.display());
                failure.get_or_insert(AppError::TimedOut);
            }
        }
    }

    if let Some(mut writer) = report {
        writer.flush()?;
    }

    match failure {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}
