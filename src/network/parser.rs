//! Line-oriented network description parser.
//!
//! Each non-blank line is a directive; `#` starts a comment running to the end of the line.
//!
//! ```text
//! function <name> (<param>) <expression>
//! node <name>
//! edge <name> <u> <v> <function> [constants...]
//! dedge <name> <u> <v> <function> [constants...]
//! od <label> <origin> <destination> <demand>
//! ```
//!
//! `edge` declares both directions, the reverse one named `v-u`. Constant values bind to the
//! free symbols of the function body other than its parameter, in order of first appearance.
//!
//! Declarations (`function`, `node`) are collected before edges and OD entries are resolved, so
//! their position in the file does not matter. Every error reports the 1-based line number and
//! the raw line text.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::Symbol;
use crate::expression::{Expr, ExpressionError};
use crate::network::resolve::{free_flow_cost, resolve_cost};
use crate::network::{CostFunction, Edge, Network, OdEntry};

lazy_static! {
    static ref FUNCTION_RE: Regex =
        Regex::new(r"^function\s+([^\s(]+)\s*\(([^)]*)\)\s*(.*)$").unwrap();
}

/// What is wrong with a line.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatErrorKind {
    #[error("unknown directive `{0}`")]
    UnknownDirective(String),

    #[error("`{directive}` needs {expected} fields, found {found}")]
    MissingFields {
        directive: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("`{0}` is not a valid number")]
    InvalidNumber(String),

    #[error("demand {0} is negative")]
    NegativeDemand(f64),

    #[error("function `{0}` is not declared")]
    UndeclaredFunction(Symbol),

    #[error("node `{0}` is not declared")]
    UndeclaredNode(Symbol),

    #[error("function `{function}` takes {expected} constants, {found} given")]
    ConstantCount {
        function: Symbol,
        expected: usize,
        found: usize,
    },

    #[error("function `{function}` must have exactly one parameter, found {found}")]
    ParameterCount { function: Symbol, found: usize },

    #[error("expected `function <name> (<param>) <expression>`")]
    MalformedFunction,
}

/// A malformed line of a network description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {kind}: `{content}`")]
pub struct FormatError {
    pub line: usize,
    pub content: String,
    pub kind: FormatErrorKind,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetworkError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Expression(#[from] ExpressionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Edge,
    DirectedEdge,
    Od,
}

impl Directive {
    fn keyword(self) -> &'static str {
        match self {
            Directive::Edge => "edge",
            Directive::DirectedEdge => "dedge",
            Directive::Od => "od",
        }
    }
}

/// A line kept for the second pass.
struct Pending<'a> {
    line: usize,
    content: &'a str,
    directive: Directive,
    tokens: Vec<&'a str>,
}

impl Pending<'_> {
    fn error(&self, kind: FormatErrorKind) -> FormatError {
        FormatError {
            line: self.line,
            content: self.content.to_string(),
            kind,
        }
    }
}

fn format_error(line: usize, content: &str, kind: FormatErrorKind) -> FormatError {
    FormatError {
        line,
        content: content.to_string(),
        kind,
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_number(token: &str) -> Result<f64, FormatErrorKind> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FormatErrorKind::InvalidNumber(token.to_string()))
}

fn parse_function(
    line: usize,
    content: &str,
    text: &str,
) -> Result<CostFunction, NetworkError> {
    let error = |kind| format_error(line, content, kind);

    let caps = FUNCTION_RE
        .captures(text)
        .ok_or_else(|| error(FormatErrorKind::MalformedFunction))?;

    let name = Symbol::from(&caps[1]);
    let parameters: Vec<&str> = caps[2]
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let body = caps[3].trim();

    if parameters.len() != 1 {
        return Err(error(FormatErrorKind::ParameterCount {
            function: name,
            found: parameters.len(),
        })
        .into());
    }
    if body.is_empty() {
        return Err(error(FormatErrorKind::MalformedFunction).into());
    }

    let parameter = Symbol::from(parameters[0]);
    let body = Expr::parse(body).map_err(|e| ExpressionError::InvalidFunction {
        function: name.clone(),
        line,
        message: e.to_string(),
    })?;
    let constants = body
        .variables()
        .into_iter()
        .filter(|s| *s != parameter)
        .collect();

    Ok(CostFunction {
        name,
        parameter,
        constants,
        body,
    })
}

/// Parse a network description and resolve the cost of every edge.
pub fn parse(input: &str) -> Result<Network, NetworkError> {
    let mut network = Network::new();
    let mut pending = Vec::new();

    for (index, content) in input.lines().enumerate() {
        let line = index + 1;
        let text = strip_comment(content).trim();
        let tokens: Vec<&str> = text.split_whitespace().collect();

        let Some(&keyword) = tokens.first() else {
            continue;
        };

        let directive = match keyword {
            "function" => {
                let function = parse_function(line, content, text)?;
                if let Some(previous) = network.functions.insert(function.name.clone(), function)
                {
                    tracing::warn!(
                        "line {}: function `{}` redeclared, the last declaration is used",
                        line,
                        previous.name
                    );
                }
                continue;
            }
            "node" => {
                let name = tokens.get(1).ok_or_else(|| {
                    format_error(
                        line,
                        content,
                        FormatErrorKind::MissingFields {
                            directive: "node",
                            expected: 2,
                            found: tokens.len(),
                        },
                    )
                })?;
                if !network.add_node(Symbol::from(*name)).1 {
                    tracing::warn!(
                        "line {}: node `{}` redeclared, keeping the first declaration",
                        line,
                        name
                    );
                }
                continue;
            }
            "edge" => Directive::Edge,
            "dedge" => Directive::DirectedEdge,
            "od" => Directive::Od,
            other => {
                return Err(format_error(
                    line,
                    content,
                    FormatErrorKind::UnknownDirective(other.to_string()),
                )
                .into());
            }
        };

        pending.push(Pending {
            line,
            content,
            directive,
            tokens,
        });
    }

    for entry in &pending {
        match entry.directive {
            Directive::Edge | Directive::DirectedEdge => add_edges(&mut network, entry)?,
            Directive::Od => add_od(&mut network, entry)?,
        }
    }

    tracing::debug!(
        "parsed network: {} nodes, {} edges, {} functions, {} commodities",
        network.graph.node_count(),
        network.graph.edge_count(),
        network.functions.len(),
        network.od.len()
    );

    Ok(network)
}

fn add_edges(network: &mut Network, entry: &Pending) -> Result<(), NetworkError> {
    if entry.tokens.len() < 5 {
        return Err(entry
            .error(FormatErrorKind::MissingFields {
                directive: entry.directive.keyword(),
                expected: 5,
                found: entry.tokens.len(),
            })
            .into());
    }

    let name = Symbol::from(entry.tokens[1]);
    let start_name = Symbol::from(entry.tokens[2]);
    let end_name = Symbol::from(entry.tokens[3]);
    let function_name = Symbol::from(entry.tokens[4]);

    let function = network
        .functions
        .get(&function_name)
        .ok_or_else(|| entry.error(FormatErrorKind::UndeclaredFunction(function_name.clone())))?;

    let start = network
        .node(&start_name)
        .ok_or_else(|| entry.error(FormatErrorKind::UndeclaredNode(start_name.clone())))?;
    let end = network
        .node(&end_name)
        .ok_or_else(|| entry.error(FormatErrorKind::UndeclaredNode(end_name.clone())))?;

    let constants = entry.tokens[5..]
        .iter()
        .map(|token| parse_number(token))
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|kind| entry.error(kind))?;

    if constants.len() != function.constants.len() {
        return Err(entry
            .error(FormatErrorKind::ConstantCount {
                function: function_name,
                expected: function.constants.len(),
                found: constants.len(),
            })
            .into());
    }

    let free_flow = free_flow_cost(function, &constants)?;

    let mut directions = vec![(start, end, name.clone())];
    if entry.directive == Directive::Edge {
        directions.push((end, start, format!("{}-{}", end_name, start_name).into()));
    }

    let resolved = directions
        .into_iter()
        .map(|(u, v, edge_name)| {
            let cost = resolve_cost(&edge_name, function, &constants)?;
            let mut edge = Edge::new(edge_name, function_name.clone(), constants.clone());
            edge.free_flow_cost = free_flow;
            edge.cost = Some(cost);
            Ok((u, v, edge))
        })
        .collect::<Result<Vec<_>, ExpressionError>>()?;

    for (u, v, edge) in resolved {
        tracing::trace!("edge {} resolved to {:?}", edge.name, edge.cost);
        network.add_edge(u, v, edge);
    }

    Ok(())
}

fn add_od(network: &mut Network, entry: &Pending) -> Result<(), NetworkError> {
    if entry.tokens.len() < 5 {
        return Err(entry
            .error(FormatErrorKind::MissingFields {
                directive: entry.directive.keyword(),
                expected: 5,
                found: entry.tokens.len(),
            })
            .into());
    }

    let origin = Symbol::from(entry.tokens[2]);
    let destination = Symbol::from(entry.tokens[3]);

    for name in [&origin, &destination] {
        if network.node(name).is_none() {
            return Err(entry
                .error(FormatErrorKind::UndeclaredNode(name.clone()))
                .into());
        }
    }

    let demand = parse_number(entry.tokens[4]).map_err(|kind| entry.error(kind))?;
    if demand < 0.0 {
        return Err(entry.error(FormatErrorKind::NegativeDemand(demand)).into());
    }

    let od_entry = OdEntry {
        origin,
        destination,
        demand,
    };
    let key = od_entry.key();
    if let Some(previous) = network.od.insert(od_entry) {
        tracing::warn!(
            "line {}: demand of `{}` overwritten ({} -> {})",
            entry.line,
            key,
            previous,
            demand
        );
    }

    Ok(())
}
