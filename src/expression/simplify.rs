use super::{BinaryOp, Expr, UnaryOp};

/// Fold constant sub-trees and drop neutral elements, bottom-up.
pub(super) fn fold(expr: Expr) -> Expr {
    match expr {
        Expr::Number(_) | Expr::Variable(_) => expr,
        Expr::Unary(UnaryOp::Neg, operand) => match fold(*operand) {
            Expr::Number(value) => Expr::Number(-value),
            Expr::Unary(UnaryOp::Neg, inner) => *inner,
            other => Expr::neg(other),
        },
        Expr::Binary(op, lhs, rhs) => fold_binary(op, fold(*lhs), fold(*rhs)),
    }
}

fn fold_binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    use BinaryOp::*;

    match (op, lhs.as_number(), rhs.as_number()) {
        (Div, _, Some(d)) if d == 0.0 => Expr::binary(op, lhs, rhs),
        (_, Some(a), Some(b)) => Expr::Number(op.apply(a, b)),

        (Add, Some(z), _) if z == 0.0 => rhs,
        (Add | Sub, _, Some(z)) if z == 0.0 => lhs,
        (Sub, Some(z), _) if z == 0.0 => fold(Expr::neg(rhs)),

        (Mul, Some(z), _) | (Mul, _, Some(z)) if z == 0.0 => Expr::Number(0.0),
        (Mul, Some(one), _) if one == 1.0 => rhs,
        (Mul | Div, _, Some(one)) if one == 1.0 => lhs,

        (Pow, _, Some(z)) if z == 0.0 => Expr::Number(1.0),
        (Pow, _, Some(one)) if one == 1.0 => lhs,

        (Mul, Some(k), _) => scale(k, rhs),
        (Mul, _, Some(k)) => scale(k, lhs),

        _ => Expr::binary(op, lhs, rhs),
    }
}

/// `k * expr`, merging `k` into a numeric factor already leading a product.
fn scale(k: f64, expr: Expr) -> Expr {
    match expr {
        Expr::Binary(BinaryOp::Mul, lhs, rhs) => match (lhs.as_number(), rhs.as_number()) {
            (Some(a), _) => Expr::binary(BinaryOp::Mul, Expr::Number(k * a), *rhs),
            (_, Some(b)) => Expr::binary(BinaryOp::Mul, Expr::Number(k * b), *lhs),
            _ => Expr::binary(
                BinaryOp::Mul,
                Expr::Number(k),
                Expr::Binary(BinaryOp::Mul, lhs, rhs),
            ),
        },
        other => Expr::binary(BinaryOp::Mul, Expr::Number(k), other),
    }
}
