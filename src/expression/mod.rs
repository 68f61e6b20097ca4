//! Symbolic cost expressions.
//!
//! Cost functions in a network description are written as small arithmetic formulas over a
//! flow parameter and any number of named constants, e.g. `t0*(1+f/c)` or `f/4+1`. This module
//! parses such formulas into an immutable expression tree and provides the operations the
//! network layer needs on them:
//!
//! - [`Expr::parse`]: build a tree from text
//! - [`Expr::variables`]: free symbols in order of first appearance
//! - [`Expr::substitute`] / [`Expr::simplify`]: bind symbols to numbers and fold constants
//! - [`Expr::evaluate`]: compute a numeric value
//! - [`std::fmt::Display`]: print back to a re-parseable canonical form
//!
//! Every operation returns a new tree; nothing is mutated in place.
//!
//! # Example
//!
//! ```
//! use sotap::expression::Expr;
//! use std::collections::HashMap;
//!
//! let body = Expr::parse("a*f + b").unwrap();
//! let bindings = HashMap::from([("a".into(), 2.0), ("b".into(), 3.0)]);
//!
//! let resolved = body.simplify(&bindings);
//! assert_eq!(resolved.to_string(), "2*f+3");
//! ```

mod simplify;

#[allow(clippy::all)]
mod parser {
    #![allow(clippy::all)]
    #![allow(dead_code)]
    #![allow(unused_parens)]
    #![allow(unused_imports)]
    #![allow(non_snake_case)]
    #![allow(non_camel_case_types)]
    #![allow(non_upper_case_globals)]
    include!(concat!(env!("OUT_DIR"), "/expression/parser.rs"));
}

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::Symbol;

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
            BinaryOp::Pow => lhs.powf(rhs),
        }
    }

    fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
            BinaryOp::Pow => '^',
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
            BinaryOp::Pow => 4,
        }
    }
}

/// Unary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

/// Immutable expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(Symbol),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

/// Errors raised while parsing or evaluating cost expressions, or while reducing them to the
/// coefficients of the System-Optimal objective.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    /// The formula text is not a valid expression.
    #[error("syntax error: {message}")]
    Syntax { message: String },

    /// A cost function body failed to parse.
    #[error("line {line}: cost function `{function}` is malformed: {message}")]
    InvalidFunction {
        function: Symbol,
        line: usize,
        message: String,
    },

    /// A symbol had no value bound at evaluation time.
    #[error("symbol `{0}` has no value")]
    UnboundSymbol(Symbol),

    /// Number of constants given does not match the function declaration.
    #[error("cost function `{function}` expects {expected} constants, got {found}")]
    ConstantCount {
        function: Symbol,
        expected: usize,
        found: usize,
    },

    /// After resolution, a symbol other than the flow variable is still free.
    #[error("cost of edge `{edge}` still depends on `{symbol}` after binding its constants")]
    FreeSymbol { edge: Symbol, symbol: Symbol },

    /// The resolved cost is not of the form `m*f + n`.
    #[error("cost of edge `{edge}` is not linear in `{variable}`: {expression}")]
    UnsupportedShape {
        edge: Symbol,
        variable: Symbol,
        expression: String,
    },

    /// The quadratic coefficient is negative, the epigraph would not be convex.
    #[error("cost of edge `{edge}` has negative slope {slope}")]
    NonConvex { edge: Symbol, slope: f64 },
}

impl Expr {
    /// Parse a formula.
    pub fn parse(text: &str) -> Result<Expr, ExpressionError> {
        parser::ExpressionParser::new()
            .parse(text)
            .map_err(|e| ExpressionError::Syntax {
                message: e.to_string(),
            })
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn neg(operand: Expr) -> Expr {
        Expr::Unary(UnaryOp::Neg, Box::new(operand))
    }

    /// Numeric value if this node is a literal.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Expr::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Free symbols, deduplicated, in order of first appearance.
    ///
    /// Cost function constants bind positionally in this order.
    pub fn variables(&self) -> Vec<Symbol> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<Symbol>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Expr::Unary(_, operand) => operand.collect_variables(out),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
        }
    }

    /// Whether `name` occurs anywhere in the tree.
    pub fn contains(&self, name: &Symbol) -> bool {
        match self {
            Expr::Number(_) => false,
            Expr::Variable(v) => v == name,
            Expr::Unary(_, operand) => operand.contains(name),
            Expr::Binary(_, lhs, rhs) => lhs.contains(name) || rhs.contains(name),
        }
    }

    /// Replace every occurrence of `name` with `value`.
    pub fn substitute(&self, name: &Symbol, value: f64) -> Expr {
        match self {
            Expr::Variable(v) if v == name => Expr::Number(value),
            Expr::Number(_) | Expr::Variable(_) => self.clone(),
            Expr::Unary(op, operand) => Expr::Unary(*op, Box::new(operand.substitute(name, value))),
            Expr::Binary(op, lhs, rhs) => Expr::binary(
                *op,
                lhs.substitute(name, value),
                rhs.substitute(name, value),
            ),
        }
    }

    /// Substitute all `bindings` and fold the constant parts of the tree.
    pub fn simplify(&self, bindings: &HashMap<Symbol, f64>) -> Expr {
        let bound = bindings
            .iter()
            .fold(self.clone(), |expr, (name, value)| expr.substitute(name, *value));
        simplify::fold(bound)
    }

    /// Compute the value of the expression. Every free symbol must be bound.
    pub fn evaluate(&self, bindings: &HashMap<Symbol, f64>) -> Result<f64, ExpressionError> {
        match self {
            Expr::Number(value) => Ok(*value),
            Expr::Variable(name) => bindings
                .get(name)
                .copied()
                .ok_or_else(|| ExpressionError::UnboundSymbol(name.clone())),
            Expr::Unary(UnaryOp::Neg, operand) => Ok(-operand.evaluate(bindings)?),
            Expr::Binary(op, lhs, rhs) => {
                Ok(op.apply(lhs.evaluate(bindings)?, rhs.evaluate(bindings)?))
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Number(value) if *value < 0.0 => 3,
            Expr::Number(_) | Expr::Variable(_) => 5,
            Expr::Unary(..) => 3,
            Expr::Binary(op, ..) => op.precedence(),
        }
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Number(value)
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, min_precedence: u8) -> fmt::Result {
    if expr.precedence() < min_precedence {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => write!(f, "{}", value),
            Expr::Variable(name) => write!(f, "{}", name),
            Expr::Unary(UnaryOp::Neg, operand) => {
                write!(f, "-")?;
                write_operand(f, operand, 3)
            }
            Expr::Binary(op, lhs, rhs) => {
                // Operand precedences follow the grammar: left-associative sums and products,
                // right-associative powers whose base must be atomic.
                let (left_min, right_min) = match op {
                    BinaryOp::Add | BinaryOp::Sub => (1, 2),
                    BinaryOp::Mul | BinaryOp::Div => (2, 3),
                    BinaryOp::Pow => (5, 3),
                };
                write_operand(f, lhs, left_min)?;
                write!(f, "{}", op.symbol())?;
                write_operand(f, rhs, right_min)
            }
        }
    }
}
