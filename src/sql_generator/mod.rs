//! The SQL generation engine: walks a command tree and produces the
//! dialect's SQL text, plus a command kind and (for DML) a positional
//! parameter list.

pub mod dml;
pub mod errors;
pub mod fragment;
pub mod function_registry;
pub mod interval;
pub mod patterns;
pub mod select_statement;
pub mod symbols;
pub mod visitor;

pub use dml::SqlParameter;
pub use errors::SqlGenError;

use serde::Serialize;

use crate::command_tree::CommandTree;
use self::fragment::quote_identifier;

/// Target engine version. Paging (OFFSET/FETCH) requires 12.10.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectVersion {
    V11_10,
    V12_10,
}

impl DialectVersion {
    pub fn label(&self) -> &'static str {
        match self {
            DialectVersion::V11_10 => "11.10",
            DialectVersion::V12_10 => "12.10",
        }
    }
}

/// How the provider runtime should execute the generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommandKind {
    Text,
    StoredProcedure,
}

/// The outcome of one translation: exactly one SQL string, its command
/// kind, and - for DML trees - the positional parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Translation {
    pub sql: String,
    pub kind: CommandKind,
    pub parameters: Option<Vec<SqlParameter>>,
}

/// Translate one command tree. A fresh generator (with its own alias
/// registries) is constructed per call; nothing is shared across
/// translations.
pub fn translate(tree: &CommandTree, version: DialectVersion) -> Result<Translation, SqlGenError> {
    match tree {
        CommandTree::Query { root } => {
            let mut generator = visitor::SqlGenerator::new(version);
            let sql = generator.generate_query(root)?;
            Ok(Translation {
                sql,
                kind: CommandKind::Text,
                parameters: None,
            })
        }
        CommandTree::FunctionCall { function } => {
            if let Some(text) = &function.command_text {
                // Caller-authored command text passes through verbatim.
                return Ok(Translation {
                    sql: text.clone(),
                    kind: CommandKind::Text,
                    parameters: None,
                });
            }
            let sql = match &function.schema {
                Some(schema) => format!(
                    "{}.{}",
                    quote_identifier(schema),
                    quote_identifier(function.store_function_name())
                ),
                None => quote_identifier(function.store_function_name()),
            };
            Ok(Translation {
                sql,
                kind: CommandKind::StoredProcedure,
                parameters: None,
            })
        }
        CommandTree::Insert { target, values } => {
            let (sql, parameters) = dml::generate_insert(target, values)?;
            Ok(Translation {
                sql,
                kind: CommandKind::Text,
                parameters: Some(parameters),
            })
        }
        CommandTree::Update {
            target,
            set,
            predicate,
        } => {
            let (sql, parameters) = dml::generate_update(target, set, predicate.as_ref())?;
            Ok(Translation {
                sql,
                kind: CommandKind::Text,
                parameters: Some(parameters),
            })
        }
        CommandTree::Delete { target, predicate } => {
            let (sql, parameters) = dml::generate_delete(target, predicate.as_ref())?;
            Ok(Translation {
                sql,
                kind: CommandKind::Text,
                parameters: Some(parameters),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_tree::FunctionRef;

    #[test]
    fn test_stored_procedure_reference_is_quoted() {
        let mut function = FunctionRef::builtin("GetTopCustomers");
        function.builtin = false;
        function.schema = Some("sales".to_string());
        let tree = CommandTree::FunctionCall { function };
        let result = translate(&tree, DialectVersion::V12_10).unwrap();
        assert_eq!(result.sql, "\"sales\".\"GetTopCustomers\"");
        assert_eq!(result.kind, CommandKind::StoredProcedure);
        assert!(result.parameters.is_none());
    }

    #[test]
    fn test_command_text_passes_through() {
        let mut function = FunctionRef::builtin("raw");
        function.builtin = false;
        function.command_text = Some("EXECUTE PROCEDURE sales_report(1)".to_string());
        let tree = CommandTree::FunctionCall { function };
        let result = translate(&tree, DialectVersion::V12_10).unwrap();
        assert_eq!(result.sql, "EXECUTE PROCEDURE sales_report(1)");
        assert_eq!(result.kind, CommandKind::Text);
    }
}
