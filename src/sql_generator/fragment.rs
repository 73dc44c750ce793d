//! The SQL fragment tree: a write-once, strictly-typed tree of text-emitting
//! nodes. Every node knows how to render itself into the indentation-aware
//! writer given the current alias-renaming state; nothing here is stringly
//! appended, so a fragment either exists as typed structure or not at all.

use super::interval::IntervalExpr;
use super::select_statement::StatementRef;
use super::symbols::{resolve_column_rename, NamingContext, SymbolRef};

/// Indentation-aware output stream for generated SQL.
pub struct SqlWriter {
    out: String,
    indent: usize,
    at_line_start: bool,
}

impl SqlWriter {
    pub fn new() -> Self {
        SqlWriter {
            out: String::new(),
            indent: 0,
            at_line_start: true,
        }
    }

    pub fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.at_line_start {
            for _ in 0..self.indent {
                self.out.push_str("    ");
            }
            self.at_line_start = false;
        }
        self.out.push_str(text);
    }

    pub fn new_line(&mut self) {
        self.out.push('\n');
        self.at_line_start = true;
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn unindent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

impl Default for SqlWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Double-quote-delimited, case-preserving identifier quoting.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quoted string literal with embedded quotes doubled.
pub fn string_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// One node of the fragment tree.
#[derive(Clone)]
pub enum SqlFragment {
    /// Verbatim SQL text.
    Literal(String),
    /// Concatenation of child fragments, in order.
    Seq(Vec<SqlFragment>),
    /// An extent alias; renders its current effective (possibly renamed) name.
    Symbol(SymbolRef),
    /// A qualified column reference: `"alias"."column"`.
    ColumnRef { table: SymbolRef, column: SymbolRef },
    /// A nested select statement, rendered parenthesized and indented.
    Select(StatementRef),
    /// A synthesized INTERVAL expression (date arithmetic).
    Interval(IntervalExpr),
}

impl SqlFragment {
    pub fn lit(text: impl Into<String>) -> Self {
        SqlFragment::Literal(text.into())
    }

    /// Build a sequence from parts (convenience for handler code).
    pub fn seq(parts: Vec<SqlFragment>) -> Self {
        SqlFragment::Seq(parts)
    }

    pub fn write_sql(&self, w: &mut SqlWriter, naming: &mut NamingContext) {
        match self {
            SqlFragment::Literal(text) => w.write(text),
            SqlFragment::Seq(items) => {
                for item in items {
                    item.write_sql(w, naming);
                }
            }
            SqlFragment::Symbol(symbol) => {
                w.write(&quote_identifier(&symbol.borrow().new_name));
            }
            SqlFragment::ColumnRef { table, column } => {
                w.write(&quote_identifier(&table.borrow().new_name));
                w.write(".");
                resolve_column_rename(column, naming);
                w.write(&quote_identifier(&column.borrow().new_name));
            }
            SqlFragment::Select(statement) => {
                w.write("(");
                w.indent();
                w.new_line();
                statement.borrow_mut().write_sql(w, naming);
                w.unindent();
                w.new_line();
                w.write(")");
            }
            SqlFragment::Interval(interval) => interval.write_sql(w, naming),
        }
    }
}

impl std::fmt::Debug for SqlFragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlFragment::Literal(text) => write!(f, "Literal({:?})", text),
            SqlFragment::Seq(items) => f.debug_list().entries(items).finish(),
            SqlFragment::Symbol(s) => write!(f, "Symbol({})", s.borrow().name),
            SqlFragment::ColumnRef { table, column } => {
                write!(f, "ColumnRef({}.{})", table.borrow().name, column.borrow().name)
            }
            SqlFragment::Select(_) => write!(f, "Select(..)"),
            SqlFragment::Interval(_) => write!(f, "Interval(..)"),
        }
    }
}

/// Ordered fragment accumulator used for statement clauses. The same node
/// shape as `SqlFragment::Seq`, kept growable while a clause is being built.
#[derive(Debug, Clone, Default)]
pub struct SqlBuilder {
    items: Vec<SqlFragment>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        SqlBuilder { items: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn append(&mut self, fragment: SqlFragment) {
        self.items.push(fragment);
    }

    pub fn append_str(&mut self, text: impl Into<String>) {
        self.items.push(SqlFragment::Literal(text.into()));
    }

    pub fn write_sql(&self, w: &mut SqlWriter, naming: &mut NamingContext) {
        for item in &self.items {
            item.write_sql(w, naming);
        }
    }
}

impl From<SqlBuilder> for SqlFragment {
    fn from(builder: SqlBuilder) -> Self {
        SqlFragment::Seq(builder.items)
    }
}
