//! System-Optimal traffic assignment
//!
//! Reads a road network, where every edge carries a symbolic cost function of its flow, and
//! computes the System-Optimal value: the minimum total travel cost over all assignments of the
//! origin-destination demand to routes, divided by the total demand.
//!
//! # Pipeline
//!
//! 1. **Parsing** ([`network::parser`]): functions, nodes, edges and OD pairs from a
//!    line-oriented description
//! 2. **Cost resolution** ([`network::resolve`]): edge constants are bound into the function
//!    body and the result simplified with the [`expression`] engine
//! 3. **Coefficient extraction** ([`assignment::coefficients`]): each resolved cost is reduced
//!    to `m*f + n`
//! 4. **Model building** ([`assignment`]): a multi-commodity flow model with quadratic epigraph
//!    constraints, handed to a convex solver through [`lp_solver`]
//!
//! # Usage Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use sotap::assignment::solve_system_optimal;
//! use sotap::lp_solver::SolverSettings;
//! use sotap::read_file;
//! use std::path::Path;
//!
//! let network = read_file(Path::new("braess.net"))?;
//! let outcome = solve_system_optimal(&network, &SolverSettings::default())?;
//! println!("System Optimal = {:?}", outcome.value());
//! # Ok(())
//! # }
//! ```
//!
//! # Solver backends
//!
//! Clarabel is built in by default. Gurobi is available behind the `gurobi` feature; set
//! `SOTAP_LP_SOLVER=gurobi` to select it when both are compiled in.

use anyhow::{Context, Result};
use clap::Parser;
use std::{fs, path::Path};
use string_cache::DefaultAtom;
use thiserror::Error;

pub mod assignment;
pub mod check;
pub mod expression;
pub mod lp_solver;
pub mod network;
pub mod solve;

pub use check::{CheckArgs, check_main};
pub use solve::{SolveArgs, solve_main};

/// Interned name of a node, edge, function or symbol.
pub type Symbol = DefaultAtom;

/// Application-level errors reported by the command-line tools.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppError {
    /// At least one network has no feasible assignment of its demand.
    #[error("Problem Infeasible")]
    Infeasible,
    /// The solver hit its time limit before proving optimality.
    #[error("Solver time limit reached")]
    TimedOut,
}

/// Reads and parses a network description from a file.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use sotap::read_file;
/// use std::path::Path;
///
/// let network = read_file(Path::new("braess.net"))?;
/// println!("{} OD pairs", network.od.len());
/// # Ok(())
/// # }
/// ```
pub fn read_file(file_name: &Path) -> Result<network::Network> {
    let file = fs::read_to_string(file_name)
        .with_context(|| format!("reading {}", file_name.display()))?;
    network::parser::parse(&file).with_context(|| format!("parsing {}", file_name.display()))
}

/// Command-line interface arguments for the assignment tools.
#[derive(Debug, Parser)]
#[clap(name = "sotap", about = "System-Optimal traffic assignment")]
pub enum CLIArguments {
    /// Solve the System-Optimal assignment of one or more networks.
    Solve(SolveArgs),
    /// Parse a network and show the resolved edge costs and free-flow OD costs.
    Check(CheckArgs),
}
