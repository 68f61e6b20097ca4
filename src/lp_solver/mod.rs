//! Convex optimisation solver abstraction layer
//!
//! This module provides a backend-independent model builder for linear programs with
//! (convex, diagonal) quadratic constraints, which is what the System-Optimal formulation
//! needs: linear flow constraints plus one epigraph constraint `m*l^2 + n*l - phi <= 0` per
//! edge. Backends are [clarabel](https://clarabel.org) (pure Rust, interior point, quadratic
//! constraints are lowered to second-order cones) and Gurobi.
//!
//! # Type Safety with Branded Types
//!
//! All core types (`VariableId`, `LinearExpression`, `QuadraticExpression`, `Constraint`,
//! `LPModelBuilder`) use a generic `Brand` type parameter so that variables of one model cannot
//! be used in another. The brand is a zero-sized phantom type.
//!
//! Use the `lp_model_builder!()` macro to create builders with a unique brand:
//!
//! ```rust
//! use sotap::constraint;
//! use sotap::lp_model_builder;
//!
//! let mut builder1 = lp_model_builder!();
//! let mut builder2 = lp_model_builder!();
//!
//! let x = builder1.add_variable("x", 0.0, 10.0);
//! let y = builder2.add_variable("y", 0.0, 10.0);
//!
//! // This compiles:
//! builder1.add_constraint(constraint!((x) <= 5.0));
//!
//! // This would NOT compile (type error):
//! // builder1.add_constraint(constraint!((y) <= 5.0));
//! ```
//!
//! For custom brands, use the explicit generic syntax:
//!
//! ```rust
//! use sotap::lp_solver::LPModelBuilder;
//!
//! struct MyModel;
//! let mut builder = LPModelBuilder::<MyModel>::new();
//! ```
//!
//! # Building Models
//!
//! ```rust,no_run
//! use sotap::constraint;
//! use sotap::lp_model_builder;
//! use sotap::lp_solver::OptimizationSense;
//!
//! let mut builder = lp_model_builder!();
//! let l = builder.add_variable("l", 0.0, f64::INFINITY);
//! let phi = builder.add_variable("phi", 0.0, f64::INFINITY);
//!
//! builder.add_constraint(constraint!("demand", (l) == 10.0));
//! // phi >= 2 l^2 + 3 l
//! builder.add_constraint(constraint!((2.0 * (l * l) + 3.0 * l - phi) <= 0.0));
//!
//! builder.set_objective(phi, OptimizationSense::Minimize);
//! let solution = builder.solve().unwrap();
//! println!("{}", solution.objective_value);
//! ```
//!
//! Variables and solutions use `Vec` storage; the `VariableId` is an index into them.
//!
//! # Solver Selection
//!
//! The backend can be selected via the `SOTAP_LP_SOLVER` environment variable:
//! - `"clarabel"` - Use Clarabel (requires `clarabel` feature, enabled by default)
//! - `"gurobi"` - Use Gurobi (requires `gurobi` feature)
//!
//! If not set, the solver defaults to Gurobi if available, otherwise Clarabel.

use anyhow::Result;
use std::env;
use std::marker::PhantomData;

/// Constraint sense
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintSense {
    /// Less than or equal to (≤)
    LessEqual,
    /// Equal to (=)
    Equal,
    /// Greater than or equal to (≥)
    GreaterEqual,
}

/// Optimization direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationSense {
    /// Minimize the objective function
    Minimize,
    /// Maximize the objective function
    Maximize,
}

/// Status of the optimization process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationStatus {
    /// Optimal solution found
    Optimal,
    /// Problem is infeasible (no solution exists)
    Infeasible,
    /// Problem is unbounded
    Unbounded,
    /// The time limit was reached before the solver finished
    TimedOut,
    /// Other status (solver-specific)
    Other(&'static str),
}

/// Options passed to the backend for one solve.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolverSettings {
    /// Wall-clock limit in seconds.
    pub time_limit: Option<f64>,
    /// Let the backend print its progress.
    pub verbose: bool,
}

/// Available solver backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SolverBackend {
    #[cfg(feature = "gurobi")]
    /// Gurobi commercial solver
    Gurobi,
    #[cfg(feature = "clarabel")]
    /// Clarabel interior point conic solver
    Clarabel,
}

impl SolverBackend {
    /// Get the solver backend from environment variable or use fallback logic
    fn from_env_or_default() -> Result<Self> {
        if let Ok(solver_name) = env::var("SOTAP_LP_SOLVER") {
            match solver_name.to_lowercase().as_str() {
                "gurobi" => {
                    #[cfg(feature = "gurobi")]
                    return Ok(SolverBackend::Gurobi);
                    #[cfg(not(feature = "gurobi"))]
                    return Err(anyhow::anyhow!(
                        "Gurobi solver requested via SOTAP_LP_SOLVER but gurobi feature not enabled"
                    ));
                }
                "clarabel" => {
                    #[cfg(feature = "clarabel")]
                    return Ok(SolverBackend::Clarabel);
                    #[cfg(not(feature = "clarabel"))]
                    return Err(anyhow::anyhow!(
                        "Clarabel solver requested via SOTAP_LP_SOLVER but clarabel feature not enabled"
                    ));
                }
                _ => {
                    return Err(anyhow::anyhow!(
                        "Invalid solver '{}' in SOTAP_LP_SOLVER. Valid options: gurobi, clarabel",
                        solver_name
                    ));
                }
            }
        }

        // Fallback logic: prefer gurobi if available, then clarabel
        #[cfg(feature = "gurobi")]
        return Ok(SolverBackend::Gurobi);

        #[allow(unreachable_code)]
        #[cfg(feature = "clarabel")]
        return Ok(SolverBackend::Clarabel);

        #[cfg(not(any(feature = "gurobi", feature = "clarabel")))]
        Err(anyhow::anyhow!(
            "No solver backend available. Please enable a solver feature (e.g., 'clarabel' or 'gurobi')"
        ))
    }
}

/// A linear expression term: coefficient * variable
#[derive(Debug, Clone)]
pub struct LinearTerm<Brand> {
    pub coefficient: f64,
    pub variable: VariableId<Brand>,
}

/// A linear expression: sum of terms plus constant
#[derive(Debug, Clone)]
pub struct LinearExpression<Brand> {
    pub terms: Vec<LinearTerm<Brand>>,
    pub constant: f64,
}

impl<Brand> LinearExpression<Brand> {
    /// Create a new linear expression with a constant term
    pub fn new(constant: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant,
        }
    }

    /// Add a term to the expression
    pub fn add_term(&mut self, coefficient: f64, variable: VariableId<Brand>) {
        self.terms.push(LinearTerm {
            coefficient,
            variable,
        });
    }

    /// Create a linear expression from a single variable
    pub fn from_variable(variable: VariableId<Brand>) -> Self {
        Self {
            terms: vec![LinearTerm {
                coefficient: 1.0,
                variable,
            }],
            constant: 0.0,
        }
    }

    /// Value of the expression for the given variable values.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|t| t.coefficient * values[t.variable.id])
            .sum::<f64>()
            + self.constant
    }
}

impl<Brand> From<VariableId<Brand>> for LinearExpression<Brand> {
    fn from(variable: VariableId<Brand>) -> Self {
        Self::from_variable(variable)
    }
}

/// A quadratic term: coefficient * first * second
#[derive(Debug, Clone)]
pub struct QuadraticTerm<Brand> {
    pub coefficient: f64,
    pub first: VariableId<Brand>,
    pub second: VariableId<Brand>,
}

impl<Brand> QuadraticTerm<Brand> {
    /// Whether the term is a square `x * x`.
    pub fn is_diagonal(&self) -> bool {
        self.first == self.second
    }
}

/// A quadratic expression: quadratic terms plus a linear part
#[derive(Debug, Clone)]
pub struct QuadraticExpression<Brand> {
    pub quadratic: Vec<QuadraticTerm<Brand>>,
    pub linear: LinearExpression<Brand>,
}

impl<Brand> QuadraticExpression<Brand> {
    /// The product `first * second`.
    pub fn product(first: VariableId<Brand>, second: VariableId<Brand>) -> Self {
        Self {
            quadratic: vec![QuadraticTerm {
                coefficient: 1.0,
                first,
                second,
            }],
            linear: LinearExpression::new(0.0),
        }
    }

    pub fn is_linear(&self) -> bool {
        self.quadratic.iter().all(|t| t.coefficient == 0.0)
    }

    /// Value of the expression for the given variable values.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.quadratic
            .iter()
            .map(|t| t.coefficient * values[t.first.id] * values[t.second.id])
            .sum::<f64>()
            + self.linear.evaluate(values)
    }
}

impl<Brand> From<LinearExpression<Brand>> for QuadraticExpression<Brand> {
    fn from(linear: LinearExpression<Brand>) -> Self {
        Self {
            quadratic: Vec::new(),
            linear,
        }
    }
}

impl<Brand> From<VariableId<Brand>> for QuadraticExpression<Brand> {
    fn from(variable: VariableId<Brand>) -> Self {
        LinearExpression::from_variable(variable).into()
    }
}

/// Unique identifier for a variable in the model
///
/// The `Brand` type parameter ensures that variables can only be used with the
/// builder that created them. This is enforced at compile time.
pub struct VariableId<Brand> {
    id: usize,
    _brand: PhantomData<fn() -> Brand>,
}

// Manual trait implementations that don't require Brand to implement anything
impl<Brand> std::fmt::Debug for VariableId<Brand> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableId").field("id", &self.id).finish()
    }
}

impl<Brand> Clone for VariableId<Brand> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Brand> Copy for VariableId<Brand> {}

impl<Brand> PartialEq for VariableId<Brand> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<Brand> Eq for VariableId<Brand> {}

impl<Brand> std::hash::Hash for VariableId<Brand> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A linear or quadratic constraint `expression <sense> rhs`
///
/// # Examples
///
/// ```rust,no_run
/// use sotap::constraint;
/// use sotap::lp_model_builder;
/// use sotap::lp_solver::{Constraint, ConstraintSense};
///
/// let mut builder = lp_model_builder!();
/// let x = builder.add_variable("x", 0.0, 10.0);
/// let y = builder.add_variable("y", 0.0, 10.0);
///
/// // Using the constraint! macro (recommended)
/// let c = constraint!((x + y) == 10.0);
///
/// // Using the constructor directly
/// let c = Constraint::new(x * x - y, ConstraintSense::LessEqual, 0.0).named("cone");
/// ```
#[derive(Debug, Clone)]
pub struct Constraint<Brand> {
    name: Option<String>,
    expression: QuadraticExpression<Brand>,
    sense: ConstraintSense,
    rhs: f64,
}

impl<Brand> Constraint<Brand> {
    /// Create a new constraint
    pub fn new(
        expression: impl Into<QuadraticExpression<Brand>>,
        sense: ConstraintSense,
        rhs: f64,
    ) -> Self {
        Self {
            name: None,
            expression: expression.into(),
            sense,
            rhs,
        }
    }

    /// Attach a name, used in exported models and backend diagnostics.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn sense(&self) -> ConstraintSense {
        self.sense
    }

    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    pub fn is_quadratic(&self) -> bool {
        !self.expression.is_linear()
    }
}

/// Variable information stored in the model
#[derive(Debug, Clone)]
struct VariableInfo {
    name: String,
    lower_bound: f64,
    upper_bound: f64,
}

/// Objective function information
#[derive(Debug, Clone)]
struct ObjectiveInfo<Brand> {
    expression: LinearExpression<Brand>,
    sense: OptimizationSense,
}

/// Result of solving a model
#[derive(Debug, Clone)]
pub struct LPSolution<Brand> {
    pub status: OptimizationStatus,
    pub objective_value: f64,
    variable_values: Vec<f64>,
    _brand: PhantomData<fn() -> Brand>,
}

impl<Brand> LPSolution<Brand> {
    /// Get the value of a variable from the solution
    pub fn get_value(&self, var_id: VariableId<Brand>) -> Option<f64> {
        self.variable_values.get(var_id.id).copied()
    }
}

/// Builder for optimisation models that can work with different backends
///
/// The `Brand` type parameter ensures type safety - variables from one builder
/// cannot be accidentally used with another builder.
///
/// # Examples
///
/// ```rust,no_run
/// use sotap::lp_model_builder;
/// use sotap::lp_solver::LPModelBuilder;
///
/// struct MyModel;
/// let mut builder1 = LPModelBuilder::<MyModel>::new();
/// let x = builder1.add_variable("x", 0.0, 10.0);
///
/// let mut builder2 = lp_model_builder!();  // Creates unique brand automatically
/// ```
pub struct LPModelBuilder<Brand> {
    variables: Vec<VariableInfo>,
    constraints: Vec<Constraint<Brand>>,
    objective: Option<ObjectiveInfo<Brand>>,
    _brand: PhantomData<fn() -> Brand>,
}

impl<Brand> LPModelBuilder<Brand> {
    /// Create a new model builder
    pub fn new() -> Self {
        Self {
            variables: Vec::new(),
            constraints: Vec::new(),
            objective: None,
            _brand: PhantomData,
        }
    }

    /// Add a continuous variable to the model
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        lower_bound: f64,
        upper_bound: f64,
    ) -> VariableId<Brand> {
        let var_id = VariableId {
            id: self.variables.len(),
            _brand: PhantomData,
        };
        self.variables.push(VariableInfo {
            name: name.into(),
            lower_bound,
            upper_bound,
        });
        var_id
    }

    /// Add a constraint to the model
    pub fn add_constraint(&mut self, constraint: Constraint<Brand>) {
        self.constraints.push(constraint);
    }

    /// Set the objective function
    pub fn set_objective(
        &mut self,
        expression: impl Into<LinearExpression<Brand>>,
        sense: OptimizationSense,
    ) {
        self.objective = Some(ObjectiveInfo {
            expression: expression.into(),
            sense,
        });
    }

    pub fn variable_name(&self, variable: VariableId<Brand>) -> &str {
        &self.variables[variable.id].name
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn num_quadratic_constraints(&self) -> usize {
        self.constraints.iter().filter(|c| c.is_quadratic()).count()
    }

    pub fn constraints(&self) -> impl Iterator<Item = &Constraint<Brand>> {
        self.constraints.iter()
    }

    /// Solve the model with default settings
    pub fn solve(self) -> Result<LPSolution<Brand>> {
        self.solve_with(&SolverSettings::default())
    }

    /// Solve the model with the backend selected by `SOTAP_LP_SOLVER`
    pub fn solve_with(self, settings: &SolverSettings) -> Result<LPSolution<Brand>> {
        let solver = SolverBackend::from_env_or_default()?;

        tracing::debug!(
            "solving with {:?}: {} variables, {} constraints ({} quadratic)",
            solver,
            self.num_variables(),
            self.num_constraints(),
            self.num_quadratic_constraints()
        );

        match solver {
            #[cfg(feature = "gurobi")]
            SolverBackend::Gurobi => crate::lp_solver::gurobi::solve_gurobi(self, settings),

            #[cfg(feature = "clarabel")]
            SolverBackend::Clarabel => crate::lp_solver::clarabel::solve_clarabel(self, settings),
        }
    }
}

impl<Brand> Default for LPModelBuilder<Brand> {
    fn default() -> Self {
        Self::new()
    }
}

// Macros for convenient syntax
pub mod macros;

// Operator overloading for linear and quadratic expressions
pub mod ops;

// CPLEX LP text export
pub mod export;

#[cfg(feature = "gurobi")]
pub mod gurobi;

#[cfg(feature = "gurobi")]
pub mod output_suppression;

#[cfg(feature = "clarabel")]
pub mod clarabel;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constraint, lp_model_builder};

    #[test]
    fn test_constraint_macro() {
        let mut builder = lp_model_builder!();
        let x = builder.add_variable("x", 0.0, 10.0);
        let y = builder.add_variable("y", 0.0, 10.0);

        let c = constraint!((x + y) == 10.0);
        assert_eq!(c.sense, ConstraintSense::Equal);
        assert_eq!(c.rhs, 10.0);
        assert_eq!(c.name(), None);

        let c = constraint!((2.0 * x) <= 5.0);
        assert_eq!(c.sense, ConstraintSense::LessEqual);
        assert_eq!(c.rhs, 5.0);

        let c = constraint!((x - y) >= 0.0);
        assert_eq!(c.sense, ConstraintSense::GreaterEqual);
        assert_eq!(c.rhs, 0.0);

        let c = constraint!("cap", (x) <= 1.0);
        assert_eq!(c.name(), Some("cap"));
        assert!(!c.is_quadratic());
    }

    #[test]
    fn test_constraint_macro_with_builder() {
        let mut builder = lp_model_builder!();
        let x = builder.add_variable("x", 0.0, 10.0);
        let y = builder.add_variable("y", 0.0, 10.0);

        builder.add_constraint(constraint!((x + y) == 10.0));
        builder.add_constraint(constraint!((x * x - y) <= 5.0));

        assert_eq!(builder.num_variables(), 2);
        assert_eq!(builder.num_constraints(), 2);
        assert_eq!(builder.num_quadratic_constraints(), 1);
        assert_eq!(builder.variable_name(y), "y");
    }

    #[test]
    fn test_named_constraint() {
        let mut builder = lp_model_builder!();
        let x = builder.add_variable("x", 0.0, 10.0);

        let c = Constraint::new(x - 1.0, ConstraintSense::GreaterEqual, 0.0).named("lower");
        assert_eq!(c.sense(), ConstraintSense::GreaterEqual);
        assert_eq!(c.rhs(), 0.0);
        assert_eq!(c.name(), Some("lower"));
        assert!(!c.is_quadratic());

        let c = Constraint::new(x * x, ConstraintSense::LessEqual, 4.0);
        assert_eq!(c.name(), None);
        assert!(c.is_quadratic());
    }

    #[test]
    fn test_add_variable_to_linear_expression() {
        let mut builder = lp_model_builder!();
        let x = builder.add_variable("x", 0.0, 10.0);
        let y = builder.add_variable("y", 0.0, 10.0);

        let expr = 2.0 * x + 5.0;
        assert_eq!(expr.terms.len(), 1);
        assert_eq!(expr.terms[0].coefficient, 2.0);
        assert_eq!(expr.terms[0].variable, x);
        assert_eq!(expr.constant, 5.0);

        let result = expr + y;
        assert_eq!(result.terms.len(), 2);
        assert_eq!(result.constant, 5.0);
        assert_eq!(result.terms[1].coefficient, 1.0);
        assert_eq!(result.terms[1].variable, y);
    }

    #[test]
    fn test_evaluate_expressions() {
        let mut builder = lp_model_builder!();
        let x = builder.add_variable("x", 0.0, 10.0);
        let y = builder.add_variable("y", 0.0, 10.0);

        let values = [3.0, 4.0];
        assert_eq!((2.0 * x - y + 1.0).evaluate(&values), 3.0);

        let q = 2.0 * (x * x) + y - 1.0;
        assert_eq!(q.evaluate(&values), 21.0);
        assert!(!q.is_linear());
    }
}
