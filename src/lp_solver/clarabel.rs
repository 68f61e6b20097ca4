//! Clarabel backend.
//!
//! Clarabel solves `min 1/2 x'Px + q'x  s.t.  Ax + s = b, s ∈ K`. Linear rows go to the zero
//! cone (equalities) or the nonnegative cone (inequalities, variable bounds). A diagonal
//! quadratic row `Σ p_i x_i^2 <= t` with `p_i >= 0` and `t` affine becomes the second-order
//! cone `(t + 1, t - 1, 2√p_1 x_1, ...)`, since `(t+1)^2 - (t-1)^2 = 4t`.

use anyhow::{Result, anyhow};
use ::clarabel::algebra::CscMatrix;
use ::clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};

use crate::lp_solver::*;

/// Row-wise accumulation of `A`, `b` and the cone list.
struct ConicProblem {
    columns: Vec<Vec<(usize, f64)>>,
    rhs: Vec<f64>,
    cones: Vec<SupportedConeT<f64>>,
}

impl ConicProblem {
    fn new(num_variables: usize) -> Self {
        Self {
            columns: vec![Vec::new(); num_variables],
            rhs: Vec::new(),
            cones: Vec::new(),
        }
    }

    fn push_row(&mut self, coefficients: impl IntoIterator<Item = (usize, f64)>, b: f64) -> usize {
        let row = self.rhs.len();
        for (col, value) in coefficients {
            if value != 0.0 {
                self.columns[col].push((row, value));
            }
        }
        self.rhs.push(b);
        row
    }

    /// `a·x == b`
    fn push_eq(&mut self, coefficients: impl IntoIterator<Item = (usize, f64)>, b: f64) {
        self.push_row(coefficients, b);
        match self.cones.last_mut() {
            Some(SupportedConeT::ZeroConeT(n)) => *n += 1,
            _ => self.cones.push(SupportedConeT::ZeroConeT(1)),
        }
    }

    /// `a·x <= b`
    fn push_leq(&mut self, coefficients: impl IntoIterator<Item = (usize, f64)>, b: f64) {
        self.push_row(coefficients, b);
        match self.cones.last_mut() {
            Some(SupportedConeT::NonnegativeConeT(n)) => *n += 1,
            _ => self.cones.push(SupportedConeT::NonnegativeConeT(1)),
        }
    }

    /// `Σ p_i x_i^2 <= g·x + h`
    fn push_soc(&mut self, squares: &[(usize, f64)], g: &[(usize, f64)], h: f64) {
        let negated = || g.iter().map(|&(col, value)| (col, -value));
        self.push_row(negated(), h + 1.0);
        self.push_row(negated(), h - 1.0);
        for &(col, p) in squares {
            self.push_row([(col, -2.0 * p.sqrt())], 0.0);
        }
        self.cones
            .push(SupportedConeT::SecondOrderConeT(2 + squares.len()));
    }

    fn constraint_matrix(mut self) -> (CscMatrix<f64>, Vec<f64>, Vec<SupportedConeT<f64>>) {
        let num_rows = self.rhs.len();
        let num_cols = self.columns.len();

        let mut col_ptr = Vec::with_capacity(num_cols + 1);
        let mut row_idx = Vec::new();
        let mut values: Vec<f64> = Vec::new();

        for column in &mut self.columns {
            col_ptr.push(row_idx.len());
            column.sort_by_key(|(r, _)| *r);
            for &(r, v) in column.iter() {
                // merge repeated entries of the same row
                if row_idx.len() > *col_ptr.last().unwrap_or(&0) && row_idx.last() == Some(&r) {
                    if let Some(last) = values.last_mut() {
                        *last += v;
                    }
                } else {
                    row_idx.push(r);
                    values.push(v);
                }
            }
        }
        col_ptr.push(row_idx.len());

        (
            CscMatrix::new(num_rows, num_cols, col_ptr, row_idx, values),
            self.rhs,
            self.cones,
        )
    }
}

fn linear_coefficients<Brand>(expr: &LinearExpression<Brand>) -> Vec<(usize, f64)> {
    expr.terms
        .iter()
        .map(|t| (t.variable.id, t.coefficient))
        .collect()
}

fn add_constraint<Brand>(
    problem: &mut ConicProblem,
    variables: &[VariableInfo],
    index: usize,
    constraint: &Constraint<Brand>,
) -> Result<()> {
    let label = || {
        constraint
            .name
            .clone()
            .unwrap_or_else(|| format!("#{}", index))
    };
    let linear = &constraint.expression.linear;
    let a = linear_coefficients(linear);
    let b = constraint.rhs - linear.constant;

    if constraint.expression.is_linear() {
        match constraint.sense {
            ConstraintSense::Equal => problem.push_eq(a, b),
            ConstraintSense::LessEqual => problem.push_leq(a, b),
            ConstraintSense::GreaterEqual => {
                problem.push_leq(a.into_iter().map(|(c, v)| (c, -v)), -b)
            }
        }
        return Ok(());
    }

    // Normalise to Σ p x^2 <= g·x + h
    let sign = match constraint.sense {
        ConstraintSense::LessEqual => 1.0,
        ConstraintSense::GreaterEqual => -1.0,
        ConstraintSense::Equal => {
            return Err(anyhow!(
                "constraint {} is a quadratic equality, which is not convex",
                label()
            ));
        }
    };

    let mut squares: Vec<(usize, f64)> = Vec::new();
    for term in constraint.expression.quadratic.iter().filter(|t| t.coefficient != 0.0) {
        if !term.is_diagonal() {
            return Err(anyhow!(
                "constraint {} has a cross term, only squares are supported",
                label()
            ));
        }
        let p = sign * term.coefficient;
        if p < 0.0 {
            return Err(anyhow!(
                "constraint {} is not convex: `{}` has a negative square coefficient",
                label(),
                variables[term.first.id].name
            ));
        }
        match squares.iter_mut().find(|(col, _)| *col == term.first.id) {
            Some((_, existing)) => *existing += p,
            None => squares.push((term.first.id, p)),
        }
    }

    let g: Vec<(usize, f64)> = a.into_iter().map(|(c, v)| (c, -sign * v)).collect();
    problem.push_soc(&squares, &g, sign * b);

    Ok(())
}

fn status(status: &SolverStatus) -> OptimizationStatus {
    match status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => OptimizationStatus::Optimal,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            OptimizationStatus::Infeasible
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
            OptimizationStatus::Unbounded
        }
        SolverStatus::MaxTime => OptimizationStatus::TimedOut,
        SolverStatus::MaxIterations => OptimizationStatus::Other("Max iterations reached"),
        SolverStatus::NumericalError => OptimizationStatus::Other("Numerical error"),
        SolverStatus::InsufficientProgress => OptimizationStatus::Other("No progress"),
        _ => OptimizationStatus::Other("Unsolved"),
    }
}

/// Solve a model using Clarabel
pub fn solve_clarabel<Brand>(
    builder: LPModelBuilder<Brand>,
    settings: &SolverSettings,
) -> Result<LPSolution<Brand>> {
    let num_vars = builder.variables.len();
    let mut problem = ConicProblem::new(num_vars);

    for (col, var) in builder.variables.iter().enumerate() {
        if var.lower_bound.is_finite() {
            problem.push_leq([(col, -1.0)], -var.lower_bound);
        }
        if var.upper_bound.is_finite() {
            problem.push_leq([(col, 1.0)], var.upper_bound);
        }
    }

    for (index, constraint) in builder.constraints.iter().enumerate() {
        add_constraint(&mut problem, &builder.variables, index, constraint)?;
    }

    let (direction, objective) = match &builder.objective {
        Some(obj) => (
            match obj.sense {
                OptimizationSense::Minimize => 1.0,
                OptimizationSense::Maximize => -1.0,
            },
            Some(&obj.expression),
        ),
        None => (1.0, None),
    };

    let mut q = vec![0.0; num_vars];
    if let Some(expr) = objective {
        for term in &expr.terms {
            q[term.variable.id] += direction * term.coefficient;
        }
    }

    let (a, b, cones) = problem.constraint_matrix();

    // Clarabel cannot factor an empty system
    if num_vars == 0 && b.is_empty() {
        return Ok(LPSolution {
            status: OptimizationStatus::Optimal,
            objective_value: objective.map_or(0.0, |expr| expr.evaluate(&[])),
            variable_values: Vec::new(),
            _brand: std::marker::PhantomData,
        });
    }

    let p = CscMatrix::zeros((num_vars, num_vars));

    let mut solver_settings = DefaultSettingsBuilder::default();
    solver_settings.verbose(settings.verbose);
    if let Some(limit) = settings.time_limit {
        solver_settings.time_limit(limit);
    }
    let solver_settings = solver_settings
        .build()
        .map_err(|e| anyhow!("Clarabel settings error: {:?}", e))?;

    let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, solver_settings)
        .map_err(|e| anyhow!("Clarabel initialization failed: {:?}", e))?;

    solver.solve();

    let optimization_status = status(&solver.solution.status);
    tracing::debug!(
        "clarabel finished with {:?} after {} iterations",
        solver.solution.status,
        solver.solution.iterations
    );

    let (variable_values, objective_value) = match optimization_status {
        OptimizationStatus::Optimal => {
            let values = solver.solution.x.clone();
            let value = objective.map_or(0.0, |expr| expr.evaluate(&values));
            (values, value)
        }
        _ => (vec![0.0; num_vars], 0.0),
    };

    Ok(LPSolution {
        status: optimization_status,
        objective_value,
        variable_values,
        _brand: std::marker::PhantomData,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constraint, lp_model_builder};
    use approx::assert_abs_diff_eq;

    #[test]
    fn linear_program() {
        let mut builder = lp_model_builder!();
        let x = builder.add_variable("x", 0.0, f64::INFINITY);
        let y = builder.add_variable("y", 0.0, 3.0);

        builder.add_constraint(constraint!((x + y) >= 4.0));
        builder.set_objective(2.0 * x + y, OptimizationSense::Minimize);

        let solution = solve_clarabel(builder, &SolverSettings::default()).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert_abs_diff_eq!(solution.objective_value, 5.0, epsilon = 1e-5);
        assert_abs_diff_eq!(solution.get_value(x).unwrap(), 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(solution.get_value(y).unwrap(), 3.0, epsilon = 1e-5);
    }

    #[test]
    fn maximisation() {
        let mut builder = lp_model_builder!();
        let x = builder.add_variable("x", 0.0, 2.0);
        builder.set_objective(3.0 * x + 1.0, OptimizationSense::Maximize);

        let solution = solve_clarabel(builder, &SolverSettings::default()).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert_abs_diff_eq!(solution.objective_value, 7.0, epsilon = 1e-5);
    }

    #[test]
    fn quadratic_epigraph() {
        let mut builder = lp_model_builder!();
        let l = builder.add_variable("l", 0.0, f64::INFINITY);
        let phi = builder.add_variable("phi", 0.0, f64::INFINITY);

        builder.add_constraint(constraint!((l) == 10.0));
        builder.add_constraint(constraint!((l * l + l - phi) <= 0.0));
        builder.set_objective(phi, OptimizationSense::Minimize);

        let solution = solve_clarabel(builder, &SolverSettings::default()).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert_abs_diff_eq!(solution.objective_value, 110.0, epsilon = 1e-4);
    }

    #[test]
    fn greater_equal_quadratic() {
        let mut builder = lp_model_builder!();
        let x = builder.add_variable("x", f64::NEG_INFINITY, f64::INFINITY);
        let t = builder.add_variable("t", 0.0, f64::INFINITY);

        // t >= (x - 0)^2 with x >= 2
        builder.add_constraint(constraint!((t - x * x) >= 0.0));
        builder.add_constraint(constraint!((x) >= 2.0));
        builder.set_objective(t, OptimizationSense::Minimize);

        let solution = solve_clarabel(builder, &SolverSettings::default()).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert_abs_diff_eq!(solution.objective_value, 4.0, epsilon = 1e-4);
    }

    #[test]
    fn empty_model_is_trivially_optimal() {
        let builder = lp_model_builder!();
        let solution = solve_clarabel(builder, &SolverSettings::default()).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert_eq!(solution.objective_value, 0.0);
        assert!(solution.variable_values.is_empty());
    }

    #[test]
    fn infeasible() {
        let mut builder = lp_model_builder!();
        let x = builder.add_variable("x", 0.0, 1.0);
        builder.add_constraint(constraint!((x) == 5.0));
        builder.set_objective(x, OptimizationSense::Minimize);

        let solution = solve_clarabel(builder, &SolverSettings::default()).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Infeasible);
    }

    #[test]
    fn non_convex_rejected() {
        let mut builder = lp_model_builder!();
        let x = builder.add_variable("x", 0.0, 1.0);
        let t = builder.add_variable("t", 0.0, 1.0);
        builder.add_constraint(constraint!("bad", (t - x * x) <= 0.0));
        builder.set_objective(t, OptimizationSense::Minimize);

        let err = solve_clarabel(builder, &SolverSettings::default())
            .err()
            .expect("non-convex row should be rejected");
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn repeated_entries_are_merged() {
        let mut problem = ConicProblem::new(2);
        problem.push_eq([(0, 1.0), (0, 2.0), (1, 1.0)], 3.0);
        problem.push_leq([(1, 4.0)], 1.0);

        let (a, b, cones) = problem.constraint_matrix();
        assert_eq!(a.colptr, vec![0, 1, 3]);
        assert_eq!(a.rowval, vec![0, 0, 1]);
        assert_eq!(a.nzval, vec![3.0, 1.0, 4.0]);
        assert_eq!(b, vec![3.0, 1.0]);
        assert_eq!(cones.len(), 2);
    }
}
