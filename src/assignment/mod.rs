//! System-Optimal assignment as a multi-commodity flow model.
//!
//! Every OD entry of the network is a commodity. For each edge `e` the model has a load
//! variable `l_e`, an epigraph cost variable `phi_e`, and one share variable `x_{e,k}` per
//! commodity `k`, all continuous and non-negative. Constraints:
//!
//! - conservation, per commodity and node: `Σ x arriving - Σ x leaving` is the commodity demand
//!   at its destination, minus the demand at its origin, zero elsewhere
//! - linkage, per edge: `l_e = Σ_k x_{e,k}`
//! - domain, per variable: `v >= 0`
//! - epigraph, per edge with cost `m*f + n`: `m*l_e^2 + n*l_e - phi_e <= 0`
//!
//! and the objective minimises `Σ_e phi_e`. The reported System-Optimal value is the optimum
//! divided by the total demand.
//!
//! The model is built in strictly ordered steps ([`ModelStage`]); [`SystemOptimalModel::build`]
//! runs all of them.
//!
//! ```no_run
//! use sotap::assignment::{solve_system_optimal, SolveOutcome};
//! use sotap::lp_solver::SolverSettings;
//! use sotap::network::parser::parse;
//!
//! let network = parse("function c (f) f + 1\nnode A\nnode B\ndedge AB A B c\nod 1 A B 10\n")?;
//! match solve_system_optimal(&network, &SolverSettings::default())? {
//!     SolveOutcome::Optimal(optimum) => assert!((optimum.value - 11.0).abs() < 1e-4),
//!     other => panic!("{:?}", other),
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod coefficients;

use std::collections::HashMap;
use std::fmt;

use anyhow::{Result, anyhow};
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use thiserror::Error;

use crate::Symbol;
use crate::constraint;
use crate::expression::ExpressionError;
use crate::lp_model_builder;
use crate::lp_solver::{
    LPModelBuilder, LinearExpression, OptimizationSense, OptimizationStatus, SolverSettings,
    VariableId,
};
use crate::network::{Network, OdEntry};

pub use coefficients::CostCoefficients;

/// Build progress of a [`SystemOptimalModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModelStage {
    Empty,
    VariablesDeclared,
    ObjectiveSet,
    ConstraintsGenerated,
}

impl fmt::Display for ModelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelStage::Empty => "empty",
            ModelStage::VariablesDeclared => "variables declared",
            ModelStage::ObjectiveSet => "objective set",
            ModelStage::ConstraintsGenerated => "constraints generated",
        };
        write!(f, "{}", name)
    }
}

/// Errors raised while formulating the model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("model step requires stage `{expected}`, but the model is at `{found}`")]
    OutOfOrder {
        expected: ModelStage,
        found: ModelStage,
    },

    #[error("edge {0:?} has no variables in the model")]
    UnknownEdge(EdgeIndex),

    #[error("node `{0}` is not part of the network")]
    UnknownNode(Symbol),

    #[error("commodity `{0}` is not part of the model")]
    UnknownCommodity(Symbol),

    #[error("edge `{0}` has no resolved cost")]
    UnresolvedCost(Symbol),

    #[error(transparent)]
    Formulation(#[from] ExpressionError),
}

/// Variable and constraint counts of a built model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelStats {
    pub variables: usize,
    pub constraints: usize,
    pub quadratic_constraints: usize,
}

/// Optimal flow on one edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeFlow {
    pub name: Symbol,
    pub start: Symbol,
    pub end: Symbol,
    /// Total load `l_e`.
    pub flow: f64,
    /// Epigraph value `phi_e`, the total cost incurred on the edge.
    pub cost: f64,
    /// Per-traveller cost `m*l_e + n`.
    pub latency: f64,
    /// Share of each commodity, in OD order.
    pub shares: Vec<(Symbol, f64)>,
}

/// Optimal System-Optimal assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemOptimum {
    /// Minimised objective `Σ phi_e`.
    pub total_cost: f64,
    pub total_demand: f64,
    /// `total_cost / total_demand`, 0 when there is no demand.
    pub value: f64,
    pub edges: Vec<EdgeFlow>,
}

/// Result of handing the model to the solver.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Optimal(SystemOptimum),
    Infeasible,
    TimedOut,
}

impl SolveOutcome {
    /// Normalised System-Optimal value, if solved.
    pub fn value(&self) -> Option<f64> {
        match self {
            SolveOutcome::Optimal(optimum) => Some(optimum.value),
            _ => None,
        }
    }
}

struct EdgeVariables<Brand> {
    load: VariableId<Brand>,
    cost: VariableId<Brand>,
    /// Indexed like `SystemOptimalModel::commodities`.
    shares: Vec<VariableId<Brand>>,
}

/// Multi-commodity flow formulation of the System-Optimal assignment of one network.
pub struct SystemOptimalModel<'a, Brand> {
    network: &'a Network,
    builder: LPModelBuilder<Brand>,
    stage: ModelStage,
    commodities: Vec<&'a OdEntry>,
    commodity_index: HashMap<Symbol, usize>,
    edge_order: Vec<EdgeIndex>,
    coefficients: HashMap<EdgeIndex, CostCoefficients>,
    variables: HashMap<EdgeIndex, EdgeVariables<Brand>>,
    total_demand: f64,
}

impl<'a, Brand> SystemOptimalModel<'a, Brand> {
    /// Prepare a model for `network`, extracting the cost coefficients of every edge.
    pub fn new(network: &'a Network, builder: LPModelBuilder<Brand>) -> Result<Self, ModelError> {
        let edge_order: Vec<EdgeIndex> = network.graph.edge_indices().collect();

        let coefficients = edge_order
            .iter()
            .map(|&ix| {
                let edge = &network.graph[ix];
                let cost = edge
                    .cost
                    .as_ref()
                    .ok_or_else(|| ModelError::UnresolvedCost(edge.name.clone()))?;
                Ok((ix, coefficients::extract(&edge.name, cost)?))
            })
            .collect::<Result<HashMap<_, _>, ModelError>>()?;

        let commodities: Vec<&OdEntry> = network.od.iter().collect();
        let commodity_index = commodities
            .iter()
            .enumerate()
            .map(|(k, entry)| (entry.key(), k))
            .collect();

        for entry in commodities.iter().filter(|e| e.origin == e.destination) {
            tracing::warn!(
                "commodity `{}` starts at its destination and does not flow",
                entry.key()
            );
        }

        Ok(Self {
            network,
            builder,
            stage: ModelStage::Empty,
            commodities,
            commodity_index,
            edge_order,
            coefficients,
            variables: HashMap::new(),
            total_demand: network.od.total_demand(),
        })
    }

    pub fn stage(&self) -> ModelStage {
        self.stage
    }

    /// Sum of the demand of every commodity, fixed when the model was created.
    pub fn total_demand(&self) -> f64 {
        self.total_demand
    }

    fn expect_stage(&self, expected: ModelStage) -> Result<(), ModelError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(ModelError::OutOfOrder {
                expected,
                found: self.stage,
            })
        }
    }

    fn edge_variables(&self, edge: EdgeIndex) -> Result<&EdgeVariables<Brand>, ModelError> {
        self.variables
            .get(&edge)
            .ok_or(ModelError::UnknownEdge(edge))
    }

    fn node(&self, name: &Symbol) -> Result<NodeIndex, ModelError> {
        self.network
            .node(name)
            .ok_or_else(|| ModelError::UnknownNode(name.clone()))
    }

    /// Share variable of commodity `key` on `edge`.
    pub fn share(&self, edge: EdgeIndex, key: &Symbol) -> Result<VariableId<Brand>, ModelError> {
        let k = *self
            .commodity_index
            .get(key)
            .ok_or_else(|| ModelError::UnknownCommodity(key.clone()))?;
        Ok(self.edge_variables(edge)?.shares[k])
    }

    /// Declare `l_e`, `phi_e` and `x_{e,k}` for every edge and commodity.
    pub fn declare_variables(&mut self) -> Result<(), ModelError> {
        self.expect_stage(ModelStage::Empty)?;

        for &ix in &self.edge_order {
            let name = &self.network.graph[ix].name;
            let load = self.builder.add_variable(format!("l_{}", name), 0.0, f64::INFINITY);
            let cost = self
                .builder
                .add_variable(format!("phi_{}", name), 0.0, f64::INFINITY);
            let shares = self
                .commodities
                .iter()
                .map(|entry| {
                    self.builder.add_variable(
                        format!("x_{}_{}", name, entry.key()),
                        0.0,
                        f64::INFINITY,
                    )
                })
                .collect();

            self.variables.insert(ix, EdgeVariables { load, cost, shares });
        }

        tracing::debug!(
            "declared {} variables for {} edges and {} commodities",
            self.builder.num_variables(),
            self.edge_order.len(),
            self.commodities.len()
        );
        self.stage = ModelStage::VariablesDeclared;
        Ok(())
    }

    /// Minimise the total system cost `Σ phi_e`.
    pub fn set_objective(&mut self) -> Result<(), ModelError> {
        self.expect_stage(ModelStage::VariablesDeclared)?;

        let objective = self
            .edge_order
            .iter()
            .map(|&ix| Ok(self.edge_variables(ix)?.cost))
            .collect::<Result<Vec<_>, ModelError>>()?
            .into_iter()
            .sum::<LinearExpression<Brand>>();
        self.builder
            .set_objective(objective, OptimizationSense::Minimize);

        self.stage = ModelStage::ObjectiveSet;
        Ok(())
    }

    /// Generate conservation, linkage, domain and epigraph constraints.
    pub fn generate_constraints(&mut self) -> Result<(), ModelError> {
        self.expect_stage(ModelStage::ObjectiveSet)?;

        self.conservation_constraints()?;
        self.linkage_constraints()?;
        self.domain_constraints()?;
        self.epigraph_constraints()?;

        tracing::debug!(
            "generated {} constraints ({} quadratic)",
            self.builder.num_constraints(),
            self.builder.num_quadratic_constraints()
        );
        self.stage = ModelStage::ConstraintsGenerated;
        Ok(())
    }

    fn conservation_constraints(&mut self) -> Result<(), ModelError> {
        let graph = &self.network.graph;

        for (k, commodity) in self.commodities.iter().enumerate() {
            let origin = self.node(&commodity.origin)?;
            let destination = self.node(&commodity.destination)?;
            let key = commodity.key();

            for node in graph.node_indices() {
                let arriving = graph
                    .edges_directed(node, Direction::Incoming)
                    .map(|e| Ok(self.edge_variables(e.id())?.shares[k]))
                    .collect::<Result<Vec<_>, ModelError>>()?;
                let leaving = graph
                    .edges_directed(node, Direction::Outgoing)
                    .map(|e| Ok(self.edge_variables(e.id())?.shares[k]))
                    .collect::<Result<Vec<_>, ModelError>>()?;

                let net_flow = if origin == destination {
                    0.0
                } else if node == destination {
                    commodity.demand
                } else if node == origin {
                    -commodity.demand
                } else {
                    0.0
                };

                let inflow: LinearExpression<Brand> = arriving.into_iter().sum();
                let outflow: LinearExpression<Brand> = leaving.into_iter().sum();

                self.builder.add_constraint(constraint!(
                    format!("flow_{}_{}", graph[node].name, key),
                    (inflow - outflow) == net_flow
                ));
            }
        }

        Ok(())
    }

    fn linkage_constraints(&mut self) -> Result<(), ModelError> {
        for &ix in &self.edge_order {
            let vars = self.edge_variables(ix)?;
            let shares: LinearExpression<Brand> = vars.shares.iter().copied().sum();
            let constraint = constraint!(
                format!("link_{}", self.network.graph[ix].name),
                (vars.load - shares) == 0.0
            );
            self.builder.add_constraint(constraint);
        }
        Ok(())
    }

    fn domain_constraints(&mut self) -> Result<(), ModelError> {
        for &ix in &self.edge_order {
            let vars = self.edge_variables(ix)?;
            let all: Vec<VariableId<Brand>> = [vars.load, vars.cost]
                .into_iter()
                .chain(vars.shares.iter().copied())
                .collect();

            for var in all {
                let name = format!("domain_{}", self.builder.variable_name(var));
                self.builder.add_constraint(constraint!(name, (var) >= 0.0));
            }
        }
        Ok(())
    }

    fn epigraph_constraints(&mut self) -> Result<(), ModelError> {
        for &ix in &self.edge_order {
            let vars = self.edge_variables(ix)?;
            let (load, cost) = (vars.load, vars.cost);
            let CostCoefficients { slope, intercept } = self.coefficients[&ix];

            self.builder.add_constraint(constraint!(
                format!("cost_{}", self.network.graph[ix].name),
                (slope * (load * load) + intercept * load - cost) <= 0.0
            ));
        }
        Ok(())
    }

    /// Run every remaining build step in order.
    pub fn build(&mut self) -> Result<(), ModelError> {
        if self.stage == ModelStage::Empty {
            self.declare_variables()?;
        }
        if self.stage == ModelStage::VariablesDeclared {
            self.set_objective()?;
        }
        if self.stage == ModelStage::ObjectiveSet {
            self.generate_constraints()?;
        }
        Ok(())
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            variables: self.builder.num_variables(),
            constraints: self.builder.num_constraints(),
            quadratic_constraints: self.builder.num_quadratic_constraints(),
        }
    }

    /// CPLEX LP rendering of the model as built so far.
    pub fn export_lp(&self, name: &str) -> String {
        self.builder.export_lp(name)
    }

    /// Solve the fully built model.
    pub fn solve(self, settings: &SolverSettings) -> Result<SolveOutcome> {
        self.expect_stage(ModelStage::ConstraintsGenerated)?;

        let Self {
            network,
            builder,
            commodities,
            edge_order,
            coefficients,
            variables,
            total_demand,
            ..
        } = self;

        let solution = builder.solve_with(settings)?;

        match solution.status {
            OptimizationStatus::Optimal => {}
            OptimizationStatus::Infeasible => return Ok(SolveOutcome::Infeasible),
            OptimizationStatus::TimedOut => return Ok(SolveOutcome::TimedOut),
            OptimizationStatus::Unbounded => {
                return Err(anyhow!("System-Optimal model is unbounded"));
            }
            OptimizationStatus::Other(status) => {
                return Err(anyhow!("solver stopped without a solution: {}", status));
            }
        }

        let value_of = |var: VariableId<Brand>| solution.get_value(var).unwrap_or(0.0);

        let edges = edge_order
            .iter()
            .map(|ix| {
                let vars = variables.get(ix).ok_or(ModelError::UnknownEdge(*ix))?;
                let (start, end) = network
                    .endpoint_names(*ix)
                    .ok_or(ModelError::UnknownEdge(*ix))?;
                let flow = value_of(vars.load);

                Ok(EdgeFlow {
                    name: network.graph[*ix].name.clone(),
                    start: start.clone(),
                    end: end.clone(),
                    flow,
                    cost: value_of(vars.cost),
                    latency: coefficients[ix].latency(flow),
                    shares: commodities
                        .iter()
                        .zip(&vars.shares)
                        .map(|(entry, &share)| (entry.key(), value_of(share)))
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        let total_cost = solution.objective_value;
        let value = if total_demand > 0.0 {
            total_cost / total_demand
        } else {
            0.0
        };

        Ok(SolveOutcome::Optimal(SystemOptimum {
            total_cost,
            total_demand,
            value,
            edges,
        }))
    }
}

/// Build and solve the System-Optimal model of `network`.
pub fn solve_system_optimal(network: &Network, settings: &SolverSettings) -> Result<SolveOutcome> {
    let mut model = SystemOptimalModel::new(network, lp_model_builder!(AssignmentModel))?;
    model.build()?;
    model.solve(settings)
}
