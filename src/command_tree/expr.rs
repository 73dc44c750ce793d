use serde::{Deserialize, Serialize};

use super::functions::FunctionRef;
use super::values::{DataType, Literal};

/// A named source of rows: a base table or view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    #[serde(default)]
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        TableRef {
            schema: None,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Rendered through the dialect's MOD function.
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    FullOuter,
    Cross,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOpKind {
    UnionAll,
    Intersect,
    Except,
}

/// A relational input together with the variable name its rows are bound to.
/// `Expr::Variable` references resolve against these bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub variable: String,
    pub expr: Box<Expr>,
}

impl Binding {
    pub fn new(variable: impl Into<String>, expr: Expr) -> Self {
        Binding {
            variable: variable.into(),
            expr: Box::new(expr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub expr: Expr,
    pub ascending: bool,
}

/// One named output of a projection. Order matters: the projection list is
/// the declared output shape of the statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectColumn {
    pub name: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateCall {
    pub function: AggregateFunction,
    #[serde(default)]
    pub distinct: bool,
    /// None renders as `*` (COUNT only).
    pub arg: Option<Expr>,
}

/// The command-tree expression node. One closed set of kinds; the generator
/// matches exhaustively and has no extension point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    // ----- scalar -----
    Literal(Literal),
    /// Reference to a host parameter, rendered as a placeholder.
    Parameter(String),
    /// Reference to a binding variable. Only legal directly under a
    /// property access or as a function argument.
    Variable(String),
    Property {
        instance: Box<Expr>,
        name: String,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Comparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Negate(Box<Expr>),
    IsNull(Box<Expr>),
    Case {
        when_then: Vec<(Expr, Expr)>,
        #[serde(default)]
        else_expr: Option<Box<Expr>>,
    },
    Cast {
        expr: Box<Expr>,
        to: DataType,
    },
    Function {
        function: FunctionRef,
        args: Vec<Expr>,
    },

    // ----- relational -----
    Scan(TableRef),
    Filter {
        input: Binding,
        predicate: Box<Expr>,
    },
    Project {
        input: Binding,
        columns: Vec<ProjectColumn>,
    },
    Join {
        kind: JoinKind,
        left: Binding,
        right: Binding,
        #[serde(default)]
        condition: Option<Box<Expr>>,
    },
    GroupBy {
        input: Binding,
        keys: Vec<ProjectColumn>,
        aggregates: Vec<(String, AggregateCall)>,
    },
    Sort {
        input: Binding,
        keys: Vec<SortKey>,
    },
    /// Paging skip. Carries its own sort order: the dialect only pages
    /// deterministically over an ordered input.
    Skip {
        input: Binding,
        keys: Vec<SortKey>,
        count: Box<Expr>,
    },
    Limit {
        input: Binding,
        count: Box<Expr>,
    },
    Distinct {
        input: Binding,
    },
    SetOp {
        op: SetOpKind,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Relational node kinds produce row collections; every other kind is a
    /// scalar. The translation entry point uses this to pick between the two
    /// legal root shapes.
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            Expr::Scan(_)
                | Expr::Filter { .. }
                | Expr::Project { .. }
                | Expr::Join { .. }
                | Expr::GroupBy { .. }
                | Expr::Sort { .. }
                | Expr::Skip { .. }
                | Expr::Limit { .. }
                | Expr::Distinct { .. }
                | Expr::SetOp { .. }
        )
    }
}
