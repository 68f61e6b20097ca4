//! Macros for the solver module
//!
//! Convenient syntax for creating models and constraints.

/// Create a new model builder with a unique brand
///
/// Each model builder gets a unique type-level brand, preventing accidental mixing of
/// variables between different models.
///
/// # Examples
///
/// ```rust
/// use sotap::lp_model_builder;
///
/// // Anonymous brand (each call creates unique anonymous type)
/// let mut builder = lp_model_builder!();
/// let x = builder.add_variable("x", 0.0, 10.0);
///
/// // Named brand (easier to identify in type system and errors)
/// let mut morning = lp_model_builder!(MorningPeak);
/// let mut evening = lp_model_builder!(EveningPeak);
///
/// let a = morning.add_variable("a", 0.0, 100.0);
/// let b = evening.add_variable("b", 0.0, 24.0);
///
/// // This would cause a compile-time error due to different brands:
/// // evening.add_constraint(constraint!((a) <= 50.0)); // ERROR!
/// ```
#[macro_export]
macro_rules! lp_model_builder {
    // Named brand - user provides the brand name
    ($brand_name:ident) => {{
        struct $brand_name;
        $crate::lp_solver::LPModelBuilder::<$brand_name>::new()
    }};

    // Anonymous brand - the `UniqueBrand` struct is defined locally within the `{{ ... }}` block,
    // so each macro invocation creates a fresh scope with its own distinct `UniqueBrand` type
    () => {{
        struct UniqueBrand;
        $crate::lp_solver::LPModelBuilder::<UniqueBrand>::new()
    }};
}

/// Create constraints using natural comparison syntax
///
/// The left-hand side must be in parentheses and may be any linear or quadratic expression.
/// An optional leading name labels the constraint in exported models.
///
/// # Examples
///
/// ```rust
/// use sotap::constraint;
/// use sotap::lp_model_builder;
///
/// let mut builder = lp_model_builder!(RoutingModel);
/// let x = builder.add_variable("x", 0.0, 10.0);
/// let y = builder.add_variable("y", 0.0, 10.0);
///
/// // Unnamed constraints
/// let c1 = constraint!((x + y) == 10.0);
/// let c2 = constraint!((2.0 * x) <= 5.0);
/// let c3 = constraint!((x - y) >= 0.0);
///
/// // Named, quadratic
/// builder.add_constraint(constraint!("cone", (x * x - y) <= 0.0));
/// ```
#[macro_export]
macro_rules! constraint {
    // Unnamed constraints (most common case)
    (($lhs:expr) == $rhs:expr) => {
        $crate::lp_solver::Constraint::new(
            $lhs,
            $crate::lp_solver::ConstraintSense::Equal,
            $rhs as f64,
        )
    };
    (($lhs:expr) <= $rhs:expr) => {
        $crate::lp_solver::Constraint::new(
            $lhs,
            $crate::lp_solver::ConstraintSense::LessEqual,
            $rhs as f64,
        )
    };
    (($lhs:expr) >= $rhs:expr) => {
        $crate::lp_solver::Constraint::new(
            $lhs,
            $crate::lp_solver::ConstraintSense::GreaterEqual,
            $rhs as f64,
        )
    };

    // Named constraints
    ($name:expr, ($lhs:expr) == $rhs:expr) => {
        $crate::constraint!(($lhs) == $rhs).named($name)
    };
    ($name:expr, ($lhs:expr) <= $rhs:expr) => {
        $crate::constraint!(($lhs) <= $rhs).named($name)
    };
    ($name:expr, ($lhs:expr) >= $rhs:expr) => {
        $crate::constraint!(($lhs) >= $rhs).named($name)
    };
}
