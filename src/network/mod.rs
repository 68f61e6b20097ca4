//! Road network representation.
//!
//! A [`Network`] is a directed graph of [`Node`]s and [`Edge`]s, the named [`CostFunction`]s the
//! edges refer to, and the origin-destination demand ([`OdMatrix`]) to be routed through it.
//!
//! Networks are produced by [`parser::parse`] from the line-oriented network description
//! format and are immutable afterwards: the System-Optimal model builder only reads them.
//!
//! # Example
//!
//! ```
//! use sotap::network::parser::parse;
//!
//! let network = parse(r#"
//!     function lin (f) f + 1
//!     node A
//!     node B
//!     dedge AB A B lin
//!     od x A B 10
//! "#).unwrap();
//!
//! assert_eq!(network.graph.node_count(), 2);
//! assert_eq!(network.graph.edge_count(), 1);
//! assert_eq!(network.od.total_demand(), 10.0);
//! ```

pub mod parser;
pub mod resolve;

use std::collections::HashMap;
use std::fmt;

use petgraph::algo::dijkstra;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;

use crate::Symbol;
use crate::expression::Expr;

/// A network node, identified by its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    pub name: Symbol,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A named cost function with exactly one flow parameter and any number of constants.
#[derive(Debug, Clone, PartialEq)]
pub struct CostFunction {
    pub name: Symbol,
    /// Formal flow parameter.
    pub parameter: Symbol,
    /// Constant names, in the order edge values bind to them.
    pub constants: Vec<Symbol>,
    pub body: Expr,
}

/// Edge cost after its constants were bound: an expression in the single flow variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCost {
    pub variable: Symbol,
    pub expression: Expr,
}

impl ResolvedCost {
    /// Whether the cost depends on flow at all.
    pub fn is_constant(&self) -> bool {
        !self.expression.contains(&self.variable)
    }
}

/// A directed edge. Endpoints are the graph endpoints of the edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub name: Symbol,
    pub function: Symbol,
    /// Constant values, positionally bound to the function constants.
    pub constants: Vec<f64>,
    /// Cost with zero flow on the edge.
    pub free_flow_cost: f64,
    /// Present once the edge cost was resolved.
    pub cost: Option<ResolvedCost>,
}

impl Edge {
    pub fn new(name: Symbol, function: Symbol, constants: Vec<f64>) -> Self {
        Self {
            name,
            function,
            constants,
            free_flow_cost: 0.0,
            cost: None,
        }
    }
}

/// One origin-destination demand entry; each entry is a commodity of the flow model.
#[derive(Debug, Clone, PartialEq)]
pub struct OdEntry {
    pub origin: Symbol,
    pub destination: Symbol,
    pub demand: f64,
}

impl OdEntry {
    /// Commodity key, `origin|destination`.
    pub fn key(&self) -> Symbol {
        commodity_key(&self.origin, &self.destination)
    }
}

pub fn commodity_key(origin: &Symbol, destination: &Symbol) -> Symbol {
    format!("{}|{}", origin, destination).into()
}

/// OD demand keyed by commodity, kept in first-declaration order.
///
/// Inserting a pair that already exists overwrites its demand in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OdMatrix {
    entries: Vec<OdEntry>,
    index: HashMap<Symbol, usize>,
}

impl OdMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a demand entry. Returns the previous demand of the pair, if any.
    pub fn insert(&mut self, entry: OdEntry) -> Option<f64> {
        let key = entry.key();
        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i], entry).demand),
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(entry);
                None
            }
        }
    }

    pub fn get(&self, key: &Symbol) -> Option<&OdEntry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &OdEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all commodity demands.
    pub fn total_demand(&self) -> f64 {
        self.entries.iter().fold(0.0, |acc, e| acc + e.demand)
    }
}

pub type RoadGraph = StableGraph<Node, Edge>;

/// A parsed, cost-resolved network.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub graph: RoadGraph,
    pub functions: HashMap<Symbol, CostFunction>,
    pub od: OdMatrix,
    node_index: HashMap<Symbol, NodeIndex>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node unless one with the same name exists. Returns the index of the node carrying
    /// that name and whether it was newly added.
    pub fn add_node(&mut self, name: Symbol) -> (NodeIndex, bool) {
        if let Some(&ix) = self.node_index.get(&name) {
            return (ix, false);
        }
        let ix = self.graph.add_node(Node { name: name.clone() });
        self.node_index.insert(name, ix);
        (ix, true)
    }

    pub fn node(&self, name: &Symbol) -> Option<NodeIndex> {
        self.node_index.get(name).copied()
    }

    pub fn add_edge(&mut self, start: NodeIndex, end: NodeIndex, edge: Edge) -> EdgeIndex {
        self.graph.add_edge(start, end, edge)
    }

    /// Names of the start and end nodes of an edge.
    pub fn endpoint_names(&self, edge: EdgeIndex) -> Option<(&Symbol, &Symbol)> {
        let (start, end) = self.graph.edge_endpoints(edge)?;
        Some((&self.graph[start].name, &self.graph[end].name))
    }

    /// Cheapest route cost of each commodity using edge free-flow costs, in OD order.
    ///
    /// `None` when the destination cannot be reached from the origin.
    pub fn free_flow_route_costs(&self) -> Vec<(Symbol, Option<f64>)> {
        let mut trees: HashMap<NodeIndex, HashMap<NodeIndex, f64>> = HashMap::new();

        self.od
            .iter()
            .map(|entry| {
                let cost = match (self.node(&entry.origin), self.node(&entry.destination)) {
                    (Some(origin), Some(destination)) => trees
                        .entry(origin)
                        .or_insert_with(|| {
                            dijkstra(&self.graph, origin, None, |e| e.weight().free_flow_cost)
                        })
                        .get(&destination)
                        .copied(),
                    _ => None,
                };
                (entry.key(), cost)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn od_matrix_overwrites_duplicate_pairs() {
        let mut od = OdMatrix::new();
        let entry = |o: &str, d: &str, demand| OdEntry {
            origin: o.into(),
            destination: d.into(),
            demand,
        };

        assert_eq!(od.insert(entry("A", "B", 10.0)), None);
        assert_eq!(od.insert(entry("B", "A", 5.0)), None);
        assert_eq!(od.insert(entry("A", "B", 4.0)), Some(10.0));

        assert_eq!(od.len(), 2);
        assert_eq!(od.total_demand(), 9.0);
        assert_eq!(od.get(&Symbol::from("A|B")).unwrap().demand, 4.0);

        let order: Vec<Symbol> = od.iter().map(OdEntry::key).collect();
        assert_eq!(order, vec![Symbol::from("A|B"), Symbol::from("B|A")]);
    }

    #[test]
    fn empty_od_matrix_has_positive_zero_demand() {
        let total = OdMatrix::new().total_demand();
        assert_eq!(total, 0.0);
        assert!(total.is_sign_positive());
        assert_eq!(format!("{}", total), "0");
    }

    #[test]
    fn add_node_keeps_first_declaration() {
        let mut network = Network::new();
        let (a, added) = network.add_node("A".into());
        assert!(added);
        let (again, added) = network.add_node("A".into());
        assert!(!added);
        assert_eq!(a, again);
        assert_eq!(network.graph.node_count(), 1);
    }

    #[test]
    fn free_flow_route_costs() {
        let network = parser::parse(
            r#"
            function c (f) t + f
            node A
            node B
            node C
            node D
            dedge AB A B c 4
            dedge BC B C c 1
            dedge AC A C c 7
            od 1 A C 10
            od 2 C A 1
            od 3 A D 1
            "#,
        )
        .unwrap();

        let costs = network.free_flow_route_costs();
        assert_eq!(
            costs,
            vec![
                (Symbol::from("A|C"), Some(5.0)),
                (Symbol::from("C|A"), None),
                (Symbol::from("A|D"), None),
            ]
        );
    }
}
