//! Variables module.
//!
//! Parsing of variable expressions, resolution against prior step results,
//! inline `{{expr}}` substitution, and rewriting between runtime and stable
//! step references.

pub mod path;
pub mod resolver;
pub mod rewrite;
pub mod substitution;

pub use path::{render_value, stable_position, stable_reference, PathSegment, VariableExpression};
pub use resolver::{ResultStore, VariableResolver};
pub use rewrite::ReferenceRewriter;
pub use substitution::{
    contains_placeholder, placeholder_expressions, sole_placeholder, substitute_placeholders,
};
