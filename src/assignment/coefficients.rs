//! Reduction of resolved edge costs to `m*f + n`.
//!
//! The System-Optimal epigraph of an edge with cost `m*f + n` is `m*l^2 + n*l`. Costs are
//! matched over the expression tree: any affine combination of the flow variable is accepted
//! (`2*f+3`, `f/4+1`, `(f+1)*3`, `5`), anything non-affine is rejected.

use crate::Symbol;
use crate::expression::{BinaryOp, Expr, ExpressionError, UnaryOp};
use crate::network::ResolvedCost;

/// Coefficients of an affine edge cost `slope * f + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostCoefficients {
    /// `m`, multiplies the flow.
    pub slope: f64,
    /// `n`, the free-flow cost.
    pub intercept: f64,
}

impl CostCoefficients {
    /// Value of the epigraph `m*l^2 + n*l` at total flow `load`.
    pub fn system_cost(&self, load: f64) -> f64 {
        self.slope * load * load + self.intercept * load
    }

    /// Value of the edge cost `m*f + n`.
    pub fn latency(&self, flow: f64) -> f64 {
        self.slope * flow + self.intercept
    }
}

/// `(coefficient of variable, constant)`
type Affine = (f64, f64);

fn affine(expr: &Expr, variable: &Symbol) -> Option<Affine> {
    match expr {
        Expr::Number(k) => Some((0.0, *k)),
        Expr::Variable(v) if v == variable => Some((1.0, 0.0)),
        Expr::Variable(_) => None,
        Expr::Unary(UnaryOp::Neg, operand) => {
            let (m, n) = affine(operand, variable)?;
            Some((-m, -n))
        }
        Expr::Binary(op, lhs, rhs) => {
            let (lm, ln) = affine(lhs, variable)?;
            let (rm, rn) = affine(rhs, variable)?;
            match op {
                BinaryOp::Add => Some((lm + rm, ln + rn)),
                BinaryOp::Sub => Some((lm - rm, ln - rn)),
                BinaryOp::Mul if lm == 0.0 => Some((ln * rm, ln * rn)),
                BinaryOp::Mul if rm == 0.0 => Some((lm * rn, ln * rn)),
                BinaryOp::Div if rm == 0.0 && rn != 0.0 => Some((lm / rn, ln / rn)),
                BinaryOp::Pow if lm == 0.0 && rm == 0.0 => Some((0.0, ln.powf(rn))),
                _ => None,
            }
        }
    }
}

/// Extract `(m, n)` from the resolved cost of `edge`.
///
/// Fails with [`ExpressionError::UnsupportedShape`] when the cost is not affine in its flow
/// variable or a coefficient is not finite, and with [`ExpressionError::NonConvex`] when `m` is
/// negative.
pub fn extract(edge: &Symbol, cost: &ResolvedCost) -> Result<CostCoefficients, ExpressionError> {
    let (slope, intercept) = affine(&cost.expression, &cost.variable)
        .filter(|(m, n)| m.is_finite() && n.is_finite())
        .ok_or_else(|| ExpressionError::UnsupportedShape {
            edge: edge.clone(),
            variable: cost.variable.clone(),
            expression: cost.expression.to_string(),
        })?;

    if slope < 0.0 {
        return Err(ExpressionError::NonConvex {
            edge: edge.clone(),
            slope,
        });
    }

    Ok(CostCoefficients { slope, intercept })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coefficients(text: &str) -> Result<CostCoefficients, ExpressionError> {
        let cost = ResolvedCost {
            variable: "f".into(),
            expression: Expr::parse(text).unwrap(),
        };
        extract(&"e".into(), &cost)
    }

    fn pair(text: &str) -> (f64, f64) {
        let c = coefficients(text).unwrap();
        (c.slope, c.intercept)
    }

    #[test]
    fn canonical_shapes() {
        assert_eq!(pair("(2*f+3)"), (2.0, 3.0));
        assert_eq!(pair("(f/4+1)"), (0.25, 1.0));
        assert_eq!(pair("(5)"), (0.0, 5.0));
    }

    #[test]
    fn missing_terms() {
        assert_eq!(pair("f"), (1.0, 0.0));
        assert_eq!(pair("3*f"), (3.0, 0.0));
        assert_eq!(pair("f/2"), (0.5, 0.0));
        assert_eq!(pair("1+f"), (1.0, 1.0));
    }

    #[test]
    fn affine_combinations() {
        assert_eq!(pair("3 + f*2"), (2.0, 3.0));
        assert_eq!(pair("(f + 1) * 3"), (3.0, 3.0));
        assert_eq!(pair("f - -1"), (1.0, 1.0));
        assert_eq!(pair("2*(1+f/4)"), (0.5, 2.0));
        assert_eq!(pair("f + 2^3"), (1.0, 8.0));
    }

    #[test]
    fn non_affine_is_rejected() {
        for text in ["f*f+1", "1/f", "f^2", "2^f", "f/0", "f + k"] {
            assert!(
                matches!(
                    coefficients(text),
                    Err(ExpressionError::UnsupportedShape { .. })
                ),
                "{}",
                text
            );
        }
    }

    #[test]
    fn non_finite_coefficients_are_rejected() {
        for text in ["f + 0^-1", "1e999 * f", "0^-1 - 0^-1"] {
            match coefficients(text) {
                Err(ExpressionError::UnsupportedShape { edge, .. }) => {
                    assert_eq!(edge, Symbol::from("e"))
                }
                other => panic!("{} gave {:?}", text, other),
            }
        }
    }

    #[test]
    fn negative_slope_is_rejected() {
        assert_eq!(
            coefficients("10 - f"),
            Err(ExpressionError::NonConvex {
                edge: "e".into(),
                slope: -1.0,
            })
        );
    }

    #[test]
    fn epigraph_values() {
        let c = CostCoefficients {
            slope: 1.0,
            intercept: 1.0,
        };
        assert_eq!(c.latency(10.0), 11.0);
        assert_eq!(c.system_cost(10.0), 110.0);
    }
}
