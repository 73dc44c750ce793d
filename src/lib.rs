//! ifxgen - Command-tree to SQL translation for the Informix dialect
//!
//! This crate takes a provider-agnostic relational command tree (a logical
//! representation of one query, insert, update, or delete operation) and
//! produces the textual SQL the Informix dialect expects, through:
//! - A typed command-tree model
//! - A structural translation driver (no planning, no optimization)
//! - Symbol management that keeps aliases collision-free across nested scopes
//! - A function translation table for operations the dialect lacks natively

pub mod command_tree;
pub mod sql_generator;

pub use command_tree::{CommandTree, Expr};
pub use sql_generator::{translate, CommandKind, DialectVersion, SqlGenError, Translation};
