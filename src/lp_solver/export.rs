//! CPLEX LP text export.
//!
//! Produces the textual model a CPLEX-compatible tool can read back, for inspecting what was
//! handed to the solver. Quadratic parts of constraints are written between brackets, e.g.
//! `c1: 3 l - phi + [ 2 l ^ 2 ] <= 0`. Names are reduced to `[A-Za-z0-9_.]` and made unique.

use std::collections::HashSet;

use itertools::Itertools;

use crate::lp_solver::*;

/// Assigns LP-safe unique names.
#[derive(Default)]
struct NameTable {
    used: HashSet<String>,
}

impl NameTable {
    fn assign(&mut self, raw: &str, fallback: impl FnOnce() -> String) -> String {
        let mut name: String = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        if name.is_empty() {
            name = fallback();
        }
        if name.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            name.insert(0, '_');
        }

        let mut candidate = name.clone();
        let mut suffix = 1;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{}_{}", name, suffix);
            suffix += 1;
        }
        candidate
    }
}

fn number(value: f64) -> String {
    if value.is_infinite() {
        if value > 0.0 { "+inf" } else { "-inf" }.to_string()
    } else {
        format!("{}", value)
    }
}

/// `+ 2 x`, `- x`
fn signed_term(coefficient: f64, body: &str, first: bool) -> String {
    let sign = match (coefficient < 0.0, first) {
        (true, _) => "- ",
        (false, true) => "",
        (false, false) => "+ ",
    };
    let magnitude = coefficient.abs();
    if magnitude == 1.0 {
        format!("{}{}", sign, body)
    } else {
        format!("{}{} {}", sign, number(magnitude), body)
    }
}

fn linear_terms<Brand>(expr: &LinearExpression<Brand>, names: &[String]) -> Vec<String> {
    expr.terms
        .iter()
        .filter(|t| t.coefficient != 0.0)
        .enumerate()
        .map(|(i, t)| signed_term(t.coefficient, &names[t.variable.id], i == 0))
        .collect()
}

/// `[ 2 l ^ 2 + x * y ]`, empty when there are no nonzero quadratic terms.
fn quadratic_part<Brand>(terms: &[QuadraticTerm<Brand>], names: &[String]) -> Option<String> {
    let rendered = terms
        .iter()
        .filter(|t| t.coefficient != 0.0)
        .enumerate()
        .map(|(i, t)| {
            let body = if t.is_diagonal() {
                format!("{} ^ 2", names[t.first.id])
            } else {
                format!("{} * {}", names[t.first.id], names[t.second.id])
            };
            signed_term(t.coefficient, &body, i == 0)
        })
        .join(" ");

    (!rendered.is_empty()).then(|| format!("+ [ {} ]", rendered))
}

impl<Brand> LPModelBuilder<Brand> {
    /// Render the model in CPLEX LP format.
    pub fn export_lp(&self, model_name: &str) -> String {
        let mut table = NameTable::default();
        let names: Vec<String> = self
            .variables
            .iter()
            .enumerate()
            .map(|(i, v)| table.assign(&v.name, || format!("x{}", i)))
            .collect();

        let mut out = format!("\\ Problem name: {}\n\n", model_name);

        let (sense, objective) = match &self.objective {
            Some(obj) => (obj.sense, Some(&obj.expression)),
            None => (OptimizationSense::Minimize, None),
        };
        out += match sense {
            OptimizationSense::Minimize => "Minimize\n",
            OptimizationSense::Maximize => "Maximize\n",
        };
        let mut objective_terms = objective
            .map(|expr| linear_terms(expr, &names))
            .unwrap_or_default();
        if let Some(constant) = objective.map(|e| e.constant).filter(|c| *c != 0.0) {
            objective_terms.push(format!(
                "{} {}",
                if constant < 0.0 { "-" } else { "+" },
                number(constant.abs())
            ));
        }
        if objective_terms.is_empty() {
            objective_terms.push(format!("0 {}", names.first().map_or("x0", String::as_str)));
        }
        out += &format!(" obj: {}\n", objective_terms.join(" "));

        out += "Subject To\n";
        for (i, constraint) in self.constraints.iter().enumerate() {
            let name = table.assign(constraint.name().unwrap_or(""), || format!("c{}", i + 1));
            let expression = &constraint.expression;

            let mut lhs = linear_terms(&expression.linear, &names);
            lhs.extend(quadratic_part(&expression.quadratic, &names));
            if lhs.is_empty() {
                lhs.push(format!("0 {}", names.first().map_or("x0", String::as_str)));
            }

            let relation = match constraint.sense {
                ConstraintSense::LessEqual => "<=",
                ConstraintSense::Equal => "=",
                ConstraintSense::GreaterEqual => ">=",
            };
            let rhs = constraint.rhs - expression.linear.constant;

            out += &format!(" {}: {} {} {}\n", name, lhs.join(" "), relation, number(rhs));
        }

        out += "Bounds\n";
        for (var, name) in self.variables.iter().zip(&names) {
            let line = match (var.lower_bound.is_finite(), var.upper_bound.is_finite()) {
                (true, true) if var.lower_bound == var.upper_bound => {
                    format!("{} = {}", name, number(var.lower_bound))
                }
                (true, true) => format!(
                    "{} <= {} <= {}",
                    number(var.lower_bound),
                    name,
                    number(var.upper_bound)
                ),
                (true, false) => format!("{} >= {}", name, number(var.lower_bound)),
                (false, true) => format!("-inf <= {} <= {}", name, number(var.upper_bound)),
                (false, false) => format!("{} free", name),
            };
            out += &format!(" {}\n", line);
        }

        out += "End\n";
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::lp_solver::OptimizationSense;
    use crate::{constraint, lp_model_builder};

    #[test]
    fn export_quadratic_model() {
        let mut builder = lp_model_builder!();
        let l = builder.add_variable("l_AB", 0.0, f64::INFINITY);
        let phi = builder.add_variable("phi_AB", 0.0, f64::INFINITY);

        builder.add_constraint(constraint!("link", (l) == 10.0));
        builder.add_constraint(constraint!("epigraph", (2.0 * (l * l) + 3.0 * l - phi) <= 0.0));
        builder.set_objective(phi, OptimizationSense::Minimize);

        let text = builder.export_lp("demo");
        let expected = "\\ Problem name: demo\n\n\
                        Minimize\n \
                        obj: phi_AB\n\
                        Subject To\n \
                        link: l_AB = 10\n \
                        epigraph: 3 l_AB - phi_AB + [ 2 l_AB ^ 2 ] <= 0\n\
                        Bounds\n \
                        l_AB >= 0\n \
                        phi_AB >= 0\n\
                        End\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn export_sanitises_and_deduplicates_names() {
        let mut builder = lp_model_builder!();
        let a = builder.add_variable("x_A|B", 0.0, 1.0);
        let b = builder.add_variable("x_A-B", f64::NEG_INFINITY, f64::INFINITY);
        let c = builder.add_variable("1st", 2.0, 2.0);

        builder.add_constraint(constraint!((a - b + c) >= -1.0));
        builder.set_objective(a + 4.0, OptimizationSense::Maximize);

        let text = builder.export_lp("names");
        assert!(text.contains("Maximize\n obj: x_A_B + 4\n"));
        assert!(text.contains(" c1: x_A_B - x_A_B_1 + _1st >= -1\n"));
        assert!(text.contains(" 0 <= x_A_B <= 1\n"));
        assert!(text.contains(" x_A_B_1 free\n"));
        assert!(text.contains(" _1st = 2\n"));
    }
}
