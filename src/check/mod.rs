//! The `check` command: inspect a network without solving it.
//!
//! Prints the resolved cost of every edge with its `(m, n)` coefficients, then the demand and
//! free-flow route cost of every OD pair.

use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::*;
use clap::Parser;
use prettytable::*;

use crate::{assignment::coefficients, network::Network, read_file};

/// Command-line arguments for the check command.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Network description file
    pub input: PathBuf,
}

fn edge_table(network: &Network) -> Table {
    let mut table = Table::new();
    table.set_titles(row!["Edge", "From", "To", "Cost", "m", "n", "Free flow"]);
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

    for ix in network.graph.edge_indices() {
        let edge = &network.graph[ix];
        let (start, end) = match network.endpoint_names(ix) {
            Some(names) => names,
            None => continue,
        };

        let (cost, m, n) = match &edge.cost {
            Some(cost) => match coefficients::extract(&edge.name, cost) {
                Result::Ok(c) => (
                    cost.expression.to_string(),
                    format!("{}", c.slope),
                    format!("{}", c.intercept),
                ),
                Err(e) => (cost.expression.to_string(), e.to_string(), String::new()),
            },
            None => ("unresolved".to_string(), String::new(), String::new()),
        };

        table.add_row(row![
            edge.name,
            start,
            end,
            cost,
            m,
            n,
            format!("{}", edge.free_flow_cost),
        ]);
    }

    table
}

fn od_table(network: &Network) -> Table {
    let mut table = Table::new();
    table.set_titles(row!["Origin", "Destination", "Demand", "Free-flow route"]);
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

    for (entry, (_, route)) in network.od.iter().zip(network.free_flow_route_costs()) {
        table.add_row(row![
            entry.origin,
            entry.destination,
            format!("{}", entry.demand),
            route.map_or_else(|| "unreachable".to_string(), |c| format!("{}", c)),
        ]);
    }

    table
}

/// Write the edge and OD summaries of `network`.
pub fn write_summary(writer: &mut impl Write, network: &Network) -> Result<()> {
    writeln!(
        writer,
        "{} nodes, {} edges, {} OD pairs, total demand {}",
        network.graph.node_count(),
        network.graph.edge_count(),
        network.od.len(),
        network.od.total_demand()
    )?;

    writeln!(writer, "\nEdges:")?;
    edge_table(network).print(writer)?;
    writeln!(writer, "\nOD pairs:")?;
    od_table(network).print(writer)?;

    Ok(())
}

/// Parse a network and print what the model would be built from.
pub fn check_main(args: CheckArgs) -> Result<()> {
    let network = read_file(&args.input)?;
    let mut out = io::stdout().lock();
    write_summary(&mut out, &network)
}
