//! INSERT/UPDATE/DELETE generation.
//!
//! DML statements target a single extent, so no alias machinery is needed;
//! column references render bare. Unlike query trees, literals are not
//! inlined: each one is lifted into a positional `?` parameter so the
//! emitted text is stable across values.

use serde::{Deserialize, Serialize};

use crate::command_tree::{DataType, Expr, Literal, SetClause, TableRef};

use super::errors::SqlGenError;
use super::fragment::{quote_identifier, SqlWriter};
use super::visitor::{comparison_sql, table_sql};

/// One positional parameter of a generated DML statement, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlParameter {
    pub name: String,
    pub data_type: Option<DataType>,
    pub value: Literal,
    /// True when this slot mirrors a caller-bound parameter reference from
    /// the tree rather than a lifted literal; `value` is Null for those.
    pub caller_bound: bool,
}

/// Restricted expression translator for DML values and predicates.
struct DmlTranslator {
    parameters: Vec<SqlParameter>,
}

impl DmlTranslator {
    fn new() -> Self {
        DmlTranslator {
            parameters: Vec::new(),
        }
    }

    fn lift_literal(&mut self, literal: &Literal) -> String {
        self.parameters.push(SqlParameter {
            name: format!("p{}", self.parameters.len()),
            data_type: declared_type(literal),
            value: literal.clone(),
            caller_bound: false,
        });
        "?".to_string()
    }

    fn translate(&mut self, e: &Expr) -> Result<String, SqlGenError> {
        match e {
            Expr::Literal(literal) => Ok(self.lift_literal(literal)),
            Expr::Parameter(name) => {
                self.parameters.push(SqlParameter {
                    name: name.clone(),
                    data_type: None,
                    value: Literal::Null,
                    caller_bound: true,
                });
                Ok("?".to_string())
            }
            Expr::Property { instance, name } => match instance.as_ref() {
                // The single target extent needs no qualifier.
                Expr::Variable(_) => Ok(quote_identifier(name)),
                _ => Err(SqlGenError::MalformedTree(
                    "DML property access must target the statement's extent".to_string(),
                )),
            },
            Expr::Comparison { op, left, right } => Ok(format!(
                "({} {} {})",
                self.translate(left)?,
                comparison_sql(*op),
                self.translate(right)?
            )),
            Expr::And(left, right) => Ok(format!(
                "({} AND {})",
                self.translate(left)?,
                self.translate(right)?
            )),
            Expr::Or(left, right) => Ok(format!(
                "({} OR {})",
                self.translate(left)?,
                self.translate(right)?
            )),
            Expr::Not(inner) => Ok(format!("NOT ({})", self.translate(inner)?)),
            Expr::IsNull(inner) => Ok(format!("({} IS NULL)", self.translate(inner)?)),
            Expr::Negate(inner) => Ok(format!("-({})", self.translate(inner)?)),
            _ => Err(SqlGenError::MalformedTree(
                "expression kind not supported in a DML statement".to_string(),
            )),
        }
    }
}

/// Loose declared type for a lifted literal, for the provider's binding
/// layer.
fn declared_type(literal: &Literal) -> Option<DataType> {
    match literal {
        Literal::Null => None,
        Literal::Bool(_) => Some(DataType::SmallInt),
        Literal::Int(_) => Some(DataType::BigInt),
        Literal::Decimal(text) => {
            let scale = text.split('.').nth(1).map(|f| f.len()).unwrap_or(0);
            Some(DataType::Decimal {
                precision: 32,
                scale: scale.min(30) as u8,
            })
        }
        Literal::Double(_) => Some(DataType::Float),
        Literal::String(s) => Some(DataType::Varchar(s.len().clamp(1, 255) as u16)),
        Literal::Date(_) => Some(DataType::Date),
        Literal::DateTime(_) | Literal::Time(_) => Some(DataType::DateTime),
    }
}

pub fn generate_insert(
    target: &TableRef,
    values: &[SetClause],
) -> Result<(String, Vec<SqlParameter>), SqlGenError> {
    if values.is_empty() {
        return Err(SqlGenError::MalformedTree(
            "INSERT requires at least one column assignment".to_string(),
        ));
    }
    let mut translator = DmlTranslator::new();
    let mut w = SqlWriter::new();
    w.write("INSERT INTO ");
    w.write(&table_sql(target));
    w.write(" (");
    for (i, clause) in values.iter().enumerate() {
        if i > 0 {
            w.write(", ");
        }
        w.write(&quote_identifier(&clause.column));
    }
    w.write(")");
    w.new_line();
    w.write("VALUES (");
    for (i, clause) in values.iter().enumerate() {
        if i > 0 {
            w.write(", ");
        }
        let value = translator.translate(&clause.value)?;
        w.write(&value);
    }
    w.write(")");
    Ok((w.into_string(), translator.parameters))
}

pub fn generate_update(
    target: &TableRef,
    set: &[SetClause],
    predicate: Option<&Expr>,
) -> Result<(String, Vec<SqlParameter>), SqlGenError> {
    if set.is_empty() {
        return Err(SqlGenError::MalformedTree(
            "UPDATE requires at least one SET clause".to_string(),
        ));
    }
    let mut translator = DmlTranslator::new();
    let mut w = SqlWriter::new();
    w.write("UPDATE ");
    w.write(&table_sql(target));
    w.new_line();
    w.write("SET ");
    for (i, clause) in set.iter().enumerate() {
        if i > 0 {
            w.write(", ");
        }
        w.write(&quote_identifier(&clause.column));
        w.write(" = ");
        let value = translator.translate(&clause.value)?;
        w.write(&value);
    }
    if let Some(predicate) = predicate {
        let predicate = translator.translate(predicate)?;
        w.new_line();
        w.write("WHERE ");
        w.write(&predicate);
    }
    Ok((w.into_string(), translator.parameters))
}

pub fn generate_delete(
    target: &TableRef,
    predicate: Option<&Expr>,
) -> Result<(String, Vec<SqlParameter>), SqlGenError> {
    let mut translator = DmlTranslator::new();
    let mut w = SqlWriter::new();
    w.write("DELETE FROM ");
    w.write(&table_sql(target));
    if let Some(predicate) = predicate {
        let predicate = translator.translate(predicate)?;
        w.new_line();
        w.write("WHERE ");
        w.write(&predicate);
    }
    Ok((w.into_string(), translator.parameters))
}
