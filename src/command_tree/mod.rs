//! The provider-agnostic command tree: the in-memory representation of one
//! query or data-modification operation handed to the SQL generator.
//!
//! The tree already encodes a fixed logical plan. Nothing in this crate
//! reorders, prunes, or otherwise re-plans it; the generator performs a
//! direct structural translation.

pub mod expr;
pub mod functions;
pub mod values;

pub use expr::{
    AggregateCall, AggregateFunction, ArithmeticOp, Binding, ComparisonOp, Expr, JoinKind,
    ProjectColumn, SetOpKind, SortKey, TableRef,
};
pub use functions::FunctionRef;
pub use values::{DataType, Literal};

use serde::{Deserialize, Serialize};

/// One column assignment in an INSERT or UPDATE tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetClause {
    pub column: String,
    pub value: Expr,
}

/// The four command-tree shapes accepted by the translation entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandTree {
    /// A query whose root is either a relational expression (collection
    /// result) or a scalar expression.
    Query { root: Expr },
    /// A stored function/procedure invocation. Parameters are bound by the
    /// surrounding provider runtime, not rendered here.
    FunctionCall { function: FunctionRef },
    Insert {
        target: TableRef,
        values: Vec<SetClause>,
    },
    Update {
        target: TableRef,
        set: Vec<SetClause>,
        predicate: Option<Expr>,
    },
    Delete {
        target: TableRef,
        predicate: Option<Expr>,
    },
}
