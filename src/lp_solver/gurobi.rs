use ::gurobi::{
    ConstrSense, Env, LinExpr, Model, ModelSense, QuadExpr, Status, VarType, attr, param,
};

use crate::lp_solver::output_suppression::suppress_output;
use crate::lp_solver::*;

fn sense(sense: ConstraintSense) -> ConstrSense {
    match sense {
        ConstraintSense::LessEqual => ConstrSense::Less,
        ConstraintSense::Equal => ConstrSense::Equal,
        ConstraintSense::GreaterEqual => ConstrSense::Greater,
    }
}

/// Solve a model using Gurobi
pub fn solve_gurobi<Brand>(
    builder: LPModelBuilder<Brand>,
    settings: &SolverSettings,
) -> Result<LPSolution<Brand>> {
    // The license banner is printed when the environment is created
    let gag = if settings.verbose {
        None
    } else {
        suppress_output().ok()
    };

    let mut env = Env::new("")?;
    env.set(param::OutputFlag, settings.verbose as i32)?;
    if let Some(limit) = settings.time_limit {
        env.set(param::TimeLimit, limit)?;
    }
    let mut model = Model::new("sotap", &env)?;

    let vars = builder
        .variables
        .iter()
        .map(|var_info| {
            model.add_var(
                &var_info.name,
                VarType::Continuous,
                0.0, // objective coefficient
                var_info.lower_bound,
                var_info.upper_bound,
                &[], // coefficients for existing constraints
                &[], // constraint indices
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    model.update()?;

    for (constr_id, constraint) in builder.constraints.iter().enumerate() {
        let name = constraint
            .name
            .clone()
            .unwrap_or_else(|| format!("c{}", constr_id));
        let linear = &constraint.expression.linear;

        if constraint.is_quadratic() {
            let mut gurobi_expr = QuadExpr::new();
            for term in &constraint.expression.quadratic {
                gurobi_expr = gurobi_expr.add_qterm(
                    term.coefficient,
                    vars[term.first.id].clone(),
                    vars[term.second.id].clone(),
                );
            }
            for term in &linear.terms {
                gurobi_expr = gurobi_expr.add_term(term.coefficient, vars[term.variable.id].clone());
            }
            gurobi_expr = gurobi_expr.add_constant(linear.constant);

            model.add_qconstr(&name, gurobi_expr, sense(constraint.sense), constraint.rhs)?;
        } else {
            let mut gurobi_expr = LinExpr::new();
            for term in &linear.terms {
                gurobi_expr = gurobi_expr.add_term(term.coefficient, vars[term.variable.id].clone());
            }
            gurobi_expr = gurobi_expr.add_constant(linear.constant);

            model.add_constr(&name, gurobi_expr, sense(constraint.sense), constraint.rhs)?;
        }
    }

    model.update()?;

    if let Some(obj_info) = &builder.objective {
        let mut gurobi_expr = LinExpr::new();
        for term in &obj_info.expression.terms {
            gurobi_expr = gurobi_expr.add_term(term.coefficient, vars[term.variable.id].clone());
        }
        gurobi_expr = gurobi_expr.add_constant(obj_info.expression.constant);

        let sense = match obj_info.sense {
            OptimizationSense::Minimize => ModelSense::Minimize,
            OptimizationSense::Maximize => ModelSense::Maximize,
        };

        model.set_objective(gurobi_expr, sense)?;
    }

    model.optimize()?;
    drop(gag);

    let optimization_status = match model.status()? {
        Status::Optimal | Status::SubOptimal => OptimizationStatus::Optimal,
        Status::Infeasible => OptimizationStatus::Infeasible,
        Status::Unbounded | Status::InfOrUnbd => OptimizationStatus::Unbounded,
        Status::TimeLimit => OptimizationStatus::TimedOut,
        _ => OptimizationStatus::Other("Unknown status"),
    };

    let num_vars = builder.variables.len();
    let mut variable_values = vec![0.0; num_vars];
    let objective_value = match optimization_status {
        OptimizationStatus::Optimal => {
            for (idx, var) in vars.iter().enumerate() {
                variable_values[idx] = var.get(&model, attr::X)?;
            }
            model.get(attr::ObjVal)?
        }
        _ => 0.0,
    };

    Ok(LPSolution {
        status: optimization_status,
        objective_value,
        variable_values,
        _brand: std::marker::PhantomData,
    })
}
