use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A constant value appearing in a command tree.
///
/// Query trees inline literals into the generated SQL text; DML trees turn
/// them into positional parameters. Either way the generator owns the
/// rendering - the tree only carries the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    /// Exact decimal kept in its textual form so no precision is lost in
    /// transit. The generator validates the text before inlining it.
    Decimal(String),
    Double(f64),
    String(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
}

impl Literal {
    /// The integer payload, when this literal is a plain integer.
    /// Used for compile-time paging arithmetic and interval sign folding.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Literal::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Dialect data types usable as CAST targets and parameter declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataType {
    SmallInt,
    Int,
    BigInt,
    Decimal { precision: u8, scale: u8 },
    Float,
    Char(u16),
    Varchar(u16),
    Date,
    DateTime,
}
