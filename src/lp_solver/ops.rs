//! Operator overloading for model expressions
//!
//! Variables and expressions support natural arithmetic operators:
//!
//! ```ignore
//! let x = builder.add_variable("x", 0.0, 10.0);
//! let y = builder.add_variable("y", 0.0, 10.0);
//!
//! let expr1 = x + y;                 // Addition
//! let expr2 = x - y;                 // Subtraction
//! let expr3 = 2.0 * x;               // Scalar multiplication (left)
//! let expr4 = x * 2.0;               // Scalar multiplication (right)
//! let expr5 = (x + y) * 3.0;         // Parentheses work
//! let expr6 = 4.0 * (x * x) + y;     // Products of variables are quadratic
//! let expr7: LinearExpression<_> = [x, y].into_iter().sum();
//! ```
//!
//! All operations maintain the brand type parameter, ensuring variables from different
//! models cannot be accidentally mixed.

use super::{LinearExpression, LinearTerm, QuadraticExpression, QuadraticTerm, VariableId};

// ============================================================================
// Operators for LinearExpression
// ============================================================================

impl<Brand> std::ops::Add<LinearExpression<Brand>> for LinearExpression<Brand> {
    type Output = LinearExpression<Brand>;

    fn add(self, other: LinearExpression<Brand>) -> Self::Output {
        let mut terms = self.terms;
        terms.extend(other.terms);
        LinearExpression {
            terms,
            constant: self.constant + other.constant,
        }
    }
}

impl<Brand> std::ops::Add<VariableId<Brand>> for LinearExpression<Brand> {
    type Output = LinearExpression<Brand>;

    fn add(mut self, other: VariableId<Brand>) -> Self::Output {
        self.add_term(1.0, other);
        self
    }
}

impl<Brand> std::ops::Add<f64> for LinearExpression<Brand> {
    type Output = LinearExpression<Brand>;

    fn add(self, other: f64) -> Self::Output {
        LinearExpression {
            terms: self.terms,
            constant: self.constant + other,
        }
    }
}

impl<Brand> std::ops::Sub<LinearExpression<Brand>> for LinearExpression<Brand> {
    type Output = LinearExpression<Brand>;

    fn sub(self, other: LinearExpression<Brand>) -> Self::Output {
        self + (-other)
    }
}

impl<Brand> std::ops::Sub<VariableId<Brand>> for LinearExpression<Brand> {
    type Output = LinearExpression<Brand>;

    fn sub(mut self, other: VariableId<Brand>) -> Self::Output {
        self.add_term(-1.0, other);
        self
    }
}

impl<Brand> std::ops::Sub<f64> for LinearExpression<Brand> {
    type Output = LinearExpression<Brand>;

    fn sub(self, other: f64) -> Self::Output {
        LinearExpression {
            terms: self.terms,
            constant: self.constant - other,
        }
    }
}

impl<Brand> std::ops::Neg for LinearExpression<Brand> {
    type Output = LinearExpression<Brand>;

    fn neg(self) -> Self::Output {
        self * -1.0
    }
}

impl<Brand> std::ops::Mul<f64> for LinearExpression<Brand> {
    type Output = LinearExpression<Brand>;

    fn mul(self, other: f64) -> Self::Output {
        LinearExpression {
            terms: self
                .terms
                .into_iter()
                .map(|term| LinearTerm {
                    coefficient: term.coefficient * other,
                    variable: term.variable,
                })
                .collect(),
            constant: self.constant * other,
        }
    }
}

impl<Brand> std::ops::Mul<LinearExpression<Brand>> for f64 {
    type Output = LinearExpression<Brand>;

    fn mul(self, other: LinearExpression<Brand>) -> Self::Output {
        other * self
    }
}

impl<Brand> std::iter::Sum<VariableId<Brand>> for LinearExpression<Brand> {
    fn sum<I: Iterator<Item = VariableId<Brand>>>(iter: I) -> Self {
        iter.fold(LinearExpression::new(0.0), |acc, var| acc + var)
    }
}

impl<Brand> std::iter::Sum<LinearExpression<Brand>> for LinearExpression<Brand> {
    fn sum<I: Iterator<Item = LinearExpression<Brand>>>(iter: I) -> Self {
        iter.fold(LinearExpression::new(0.0), |acc, expr| acc + expr)
    }
}

// ============================================================================
// Operators for VariableId
// ============================================================================

impl<Brand> std::ops::Add<LinearExpression<Brand>> for VariableId<Brand> {
    type Output = LinearExpression<Brand>;

    fn add(self, other: LinearExpression<Brand>) -> Self::Output {
        LinearExpression::from_variable(self) + other
    }
}

impl<Brand> std::ops::Add<VariableId<Brand>> for VariableId<Brand> {
    type Output = LinearExpression<Brand>;

    fn add(self, other: VariableId<Brand>) -> Self::Output {
        LinearExpression::from_variable(self) + other
    }
}

impl<Brand> std::ops::Add<f64> for VariableId<Brand> {
    type Output = LinearExpression<Brand>;

    fn add(self, other: f64) -> Self::Output {
        LinearExpression::from_variable(self) + other
    }
}

impl<Brand> std::ops::Sub<VariableId<Brand>> for VariableId<Brand> {
    type Output = LinearExpression<Brand>;

    fn sub(self, other: VariableId<Brand>) -> Self::Output {
        LinearExpression::from_variable(self) - other
    }
}

impl<Brand> std::ops::Sub<LinearExpression<Brand>> for VariableId<Brand> {
    type Output = LinearExpression<Brand>;

    fn sub(self, other: LinearExpression<Brand>) -> Self::Output {
        LinearExpression::from_variable(self) - other
    }
}

impl<Brand> std::ops::Sub<f64> for VariableId<Brand> {
    type Output = LinearExpression<Brand>;

    fn sub(self, other: f64) -> Self::Output {
        LinearExpression::from_variable(self) - other
    }
}

impl<Brand> std::ops::Mul<f64> for VariableId<Brand> {
    type Output = LinearExpression<Brand>;

    fn mul(self, other: f64) -> Self::Output {
        LinearExpression::from_variable(self) * other
    }
}

impl<Brand> std::ops::Mul<VariableId<Brand>> for VariableId<Brand> {
    type Output = QuadraticExpression<Brand>;

    fn mul(self, other: VariableId<Brand>) -> Self::Output {
        QuadraticExpression::product(self, other)
    }
}

// ============================================================================
// Operators for QuadraticExpression
// ============================================================================

impl<Brand> std::ops::Mul<f64> for QuadraticExpression<Brand> {
    type Output = QuadraticExpression<Brand>;

    fn mul(self, other: f64) -> Self::Output {
        QuadraticExpression {
            quadratic: self
                .quadratic
                .into_iter()
                .map(|term| QuadraticTerm {
                    coefficient: term.coefficient * other,
                    ..term
                })
                .collect(),
            linear: self.linear * other,
        }
    }
}

impl<Brand> std::ops::Mul<QuadraticExpression<Brand>> for f64 {
    type Output = QuadraticExpression<Brand>;

    fn mul(self, other: QuadraticExpression<Brand>) -> Self::Output {
        other * self
    }
}

impl<Brand> std::ops::Add<QuadraticExpression<Brand>> for QuadraticExpression<Brand> {
    type Output = QuadraticExpression<Brand>;

    fn add(self, other: QuadraticExpression<Brand>) -> Self::Output {
        let mut quadratic = self.quadratic;
        quadratic.extend(other.quadratic);
        QuadraticExpression {
            quadratic,
            linear: self.linear + other.linear,
        }
    }
}

impl<Brand> std::ops::Add<LinearExpression<Brand>> for QuadraticExpression<Brand> {
    type Output = QuadraticExpression<Brand>;

    fn add(self, other: LinearExpression<Brand>) -> Self::Output {
        QuadraticExpression {
            quadratic: self.quadratic,
            linear: self.linear + other,
        }
    }
}

impl<Brand> std::ops::Add<VariableId<Brand>> for QuadraticExpression<Brand> {
    type Output = QuadraticExpression<Brand>;

    fn add(self, other: VariableId<Brand>) -> Self::Output {
        QuadraticExpression {
            quadratic: self.quadratic,
            linear: self.linear + other,
        }
    }
}

impl<Brand> std::ops::Add<f64> for QuadraticExpression<Brand> {
    type Output = QuadraticExpression<Brand>;

    fn add(self, other: f64) -> Self::Output {
        QuadraticExpression {
            quadratic: self.quadratic,
            linear: self.linear + other,
        }
    }
}

impl<Brand> std::ops::Sub<LinearExpression<Brand>> for QuadraticExpression<Brand> {
    type Output = QuadraticExpression<Brand>;

    fn sub(self, other: LinearExpression<Brand>) -> Self::Output {
        QuadraticExpression {
            quadratic: self.quadratic,
            linear: self.linear - other,
        }
    }
}

impl<Brand> std::ops::Sub<VariableId<Brand>> for QuadraticExpression<Brand> {
    type Output = QuadraticExpression<Brand>;

    fn sub(self, other: VariableId<Brand>) -> Self::Output {
        QuadraticExpression {
            quadratic: self.quadratic,
            linear: self.linear - other,
        }
    }
}

impl<Brand> std::ops::Sub<f64> for QuadraticExpression<Brand> {
    type Output = QuadraticExpression<Brand>;

    fn sub(self, other: f64) -> Self::Output {
        QuadraticExpression {
            quadratic: self.quadratic,
            linear: self.linear - other,
        }
    }
}

impl<Brand> std::ops::Add<QuadraticExpression<Brand>> for VariableId<Brand> {
    type Output = QuadraticExpression<Brand>;

    fn add(self, other: QuadraticExpression<Brand>) -> Self::Output {
        other + self
    }
}

impl<Brand> std::ops::Sub<QuadraticExpression<Brand>> for VariableId<Brand> {
    type Output = QuadraticExpression<Brand>;

    fn sub(self, other: QuadraticExpression<Brand>) -> Self::Output {
        QuadraticExpression::from(self) + other * -1.0
    }
}

// ============================================================================
// Reverse operators for f64
// ============================================================================

impl<Brand> std::ops::Mul<VariableId<Brand>> for f64 {
    type Output = LinearExpression<Brand>;

    fn mul(self, other: VariableId<Brand>) -> Self::Output {
        other * self
    }
}

impl<Brand> std::ops::Add<VariableId<Brand>> for f64 {
    type Output = LinearExpression<Brand>;

    fn add(self, other: VariableId<Brand>) -> Self::Output {
        LinearExpression::from_variable(other) + self
    }
}

impl<Brand> std::ops::Sub<VariableId<Brand>> for f64 {
    type Output = LinearExpression<Brand>;

    fn sub(self, other: VariableId<Brand>) -> Self::Output {
        LinearExpression::new(self) - other
    }
}

#[cfg(test)]
mod tests {
    use crate::lp_model_builder;
    use crate::lp_solver::LinearExpression;

    #[test]
    fn test_branded_type_safety() {
        let mut builder1 = lp_model_builder!();
        let mut builder2 = lp_model_builder!();

        let x = builder1.add_variable("x", 0.0, 10.0);
        let y = builder2.add_variable("y", 0.0, 10.0);

        let _expr1 = x + 2.0;
        let _expr2 = y * 3.0;

        // This would NOT compile (uncomment to verify):
        // let _mixed = x + y;  // ERROR: different brands
    }

    #[test]
    fn test_expression_operations() {
        let mut builder = lp_model_builder!();
        let x = builder.add_variable("x", 0.0, 10.0);
        let y = builder.add_variable("y", 0.0, 10.0);

        let expr = 2.0 * x + 3.0 * y + 5.0;
        assert_eq!(expr.constant, 5.0);
        assert_eq!(expr.terms.len(), 2);

        let expr2 = x + y;
        let expr3 = x - y;
        let expr4 = 2.0 * x;
        let expr5 = x * 2.0;

        assert_eq!(expr2.terms.len(), 2);
        assert_eq!(expr3.terms.len(), 2);
        assert_eq!(expr3.terms[1].coefficient, -1.0);
        assert_eq!(expr4.terms.len(), 1);
        assert_eq!(expr5.terms.len(), 1);
    }

    #[test]
    fn test_constant_minus_variable() {
        let mut builder = lp_model_builder!();
        let x = builder.add_variable("x", 0.0, 10.0);

        let expr = 10.0 - x;
        assert_eq!(expr.constant, 10.0);
        assert_eq!(expr.terms[0].coefficient, -1.0);
    }

    #[test]
    fn test_sum_of_variables() {
        let mut builder = lp_model_builder!();
        let vars: Vec<_> = (0..4)
            .map(|i| builder.add_variable(format!("x{}", i), 0.0, 1.0))
            .collect();

        let total: LinearExpression<_> = vars.iter().copied().sum();
        assert_eq!(total.terms.len(), 4);
        assert!(total.terms.iter().all(|t| t.coefficient == 1.0));

        let empty: LinearExpression<_> = vars[..0].iter().copied().sum();
        assert!(empty.terms.is_empty());
        assert_eq!(empty.constant, 0.0);
    }

    #[test]
    fn test_quadratic_expressions() {
        let mut builder = lp_model_builder!();
        let l = builder.add_variable("l", 0.0, 10.0);
        let phi = builder.add_variable("phi", 0.0, 10.0);

        let epigraph = 2.0 * (l * l) + 3.0 * l - phi;
        assert_eq!(epigraph.quadratic.len(), 1);
        assert_eq!(epigraph.quadratic[0].coefficient, 2.0);
        assert!(epigraph.quadratic[0].is_diagonal());
        assert_eq!(epigraph.linear.terms.len(), 2);
        assert_eq!(epigraph.linear.terms[0].coefficient, 3.0);
        assert_eq!(epigraph.linear.terms[1].coefficient, -1.0);

        let cross = l * phi;
        assert!(!cross.quadratic[0].is_diagonal());
    }

    #[test]
    fn test_variable_minus_quadratic() {
        let mut builder = lp_model_builder!();
        let x = builder.add_variable("x", 0.0, 10.0);
        let t = builder.add_variable("t", 0.0, 10.0);

        let slack = t - x * x;
        assert_eq!(slack.quadratic.len(), 1);
        assert_eq!(slack.quadratic[0].coefficient, -1.0);
        assert_eq!(slack.linear.terms.len(), 1);
        assert_eq!(slack.linear.terms[0].coefficient, 1.0);
        assert_eq!(slack.linear.terms[0].variable, t);

        let total = t + 2.0 * (x * x);
        assert_eq!(total.quadratic[0].coefficient, 2.0);
        assert_eq!(total.linear.terms[0].variable, t);
    }

    #[test]
    fn test_variable_id_debug() {
        let mut builder = lp_model_builder!();
        let x = builder.add_variable("x", 0.0, 10.0);

        let debug_str = format!("{:?}", x);
        assert!(debug_str.contains("VariableId"));
    }
}
