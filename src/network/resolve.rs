//! Binding edge constants into cost functions.

use std::collections::HashMap;

use crate::Symbol;
use crate::expression::{Expr, ExpressionError};
use crate::network::{CostFunction, ResolvedCost};

/// Map the function constants positionally to `values`.
pub fn bind_constants(
    function: &CostFunction,
    values: &[f64],
) -> Result<HashMap<Symbol, f64>, ExpressionError> {
    if function.constants.len() != values.len() {
        return Err(ExpressionError::ConstantCount {
            function: function.name.clone(),
            expected: function.constants.len(),
            found: values.len(),
        });
    }

    Ok(function
        .constants
        .iter()
        .cloned()
        .zip(values.iter().copied())
        .collect())
}

/// Resolve the cost of `edge` to an expression in the function's flow parameter only.
///
/// Bodies that are numeric literals, or that lose every occurrence of the parameter once the
/// constants are folded, resolve to a single number.
pub fn resolve_cost(
    edge: &Symbol,
    function: &CostFunction,
    values: &[f64],
) -> Result<ResolvedCost, ExpressionError> {
    let variable = function.parameter.clone();

    if let Expr::Number(_) = function.body {
        return Ok(ResolvedCost {
            variable,
            expression: function.body.clone(),
        });
    }

    let bindings = bind_constants(function, values)?;
    let simplified = function.body.simplify(&bindings);

    if let Some(symbol) = simplified.variables().into_iter().find(|s| *s != variable) {
        return Err(ExpressionError::FreeSymbol {
            edge: edge.clone(),
            symbol,
        });
    }

    let expression = if simplified.contains(&variable) {
        simplified
    } else {
        Expr::Number(simplified.evaluate(&HashMap::new())?)
    };

    Ok(ResolvedCost {
        variable,
        expression,
    })
}

/// Cost of an edge carrying no flow.
pub fn free_flow_cost(function: &CostFunction, values: &[f64]) -> Result<f64, ExpressionError> {
    let mut bindings = bind_constants(function, values)?;
    bindings.insert(function.parameter.clone(), 0.0);
    function.body.evaluate(&bindings)
}
