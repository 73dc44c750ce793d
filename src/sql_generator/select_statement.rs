//! The mutable, render-once SELECT statement model: five clause builders
//! plus distinct/paging metadata and the extent bookkeeping needed to detect
//! and resolve alias collisions between nested and outer scopes at render
//! time.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::fragment::{quote_identifier, SqlBuilder, SqlFragment, SqlWriter};
use super::symbols::{flatten_extents, resolve_column_rename, NamingContext, SymbolRef};

pub type StatementRef = Rc<RefCell<SelectStatement>>;

/// Paging clause. Both counts are fragments, not raw integers: they may be
/// parameterized expressions. `skip_count` is stored already adjusted to the
/// engine's 1-based paging (the visitor emits `skip + 1`).
#[derive(Debug, Clone, Default)]
pub struct TopClause {
    pub top_count: Option<SqlFragment>,
    pub skip_count: Option<SqlFragment>,
}

impl TopClause {
    pub fn is_empty(&self) -> bool {
        self.top_count.is_none() && self.skip_count.is_none()
    }

    pub fn write_sql(&self, w: &mut SqlWriter, naming: &mut NamingContext) {
        if let Some(skip) = &self.skip_count {
            w.write("OFFSET ");
            skip.write_sql(w, naming);
            if let Some(top) = &self.top_count {
                w.write(" FETCH NEXT ");
                top.write_sql(w, naming);
                w.write(" ROWS ONLY");
            }
        } else if let Some(top) = &self.top_count {
            w.write("FETCH FIRST ");
            top.write_sql(w, naming);
            w.write(" ROWS ONLY");
        }
    }
}

/// One (target symbol, source expression) pair of a select list.
#[derive(Debug, Clone)]
pub struct SelectColumn {
    pub target: SymbolRef,
    pub expr: SqlFragment,
    /// True when the expression is a bare column reference; enables
    /// pass-through rendering without an AS clause.
    pub is_simple: bool,
}

/// Ordered select list. Order matters: positional correspondence with the
/// declared output shape.
#[derive(Debug, Clone, Default)]
pub struct SelectColumnList {
    pub columns: Vec<SelectColumn>,
}

impl SelectColumnList {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn push(&mut self, column: SelectColumn) {
        self.columns.push(column);
    }
}

/// One SQL SELECT under construction. Created when a relational operator
/// needs a dedicated scope, mutated while its subtree is visited, rendered
/// exactly once at the end of the whole-tree walk. Never reused across
/// translations.
#[derive(Debug, Default)]
pub struct SelectStatement {
    pub select: SelectColumnList,
    pub distinct: bool,
    pub from: SqlBuilder,
    pub where_clause: SqlBuilder,
    pub group_by: SqlBuilder,
    pub order_by: SqlBuilder,
    pub top: TopClause,
    /// Symbols placed directly in this statement's FROM clause.
    pub from_extents: Vec<SymbolRef>,
    /// When a join flattened several extents into this FROM clause, the full
    /// list; supersedes `from_extents` for alias renaming.
    pub all_join_extents: Option<Vec<SymbolRef>>,
    /// Symbols referenced from this statement's clauses but bound in an
    /// enclosing scope.
    pub outer_extents: Vec<SymbolRef>,
    /// Original output name -> column symbol, present only when output
    /// names were forced to change during rendering.
    pub output_columns: Option<HashMap<String, SymbolRef>>,
    /// Only the outermost statement may emit an unpaged ORDER BY; the
    /// dialect rejects it inside derived tables.
    pub is_top_most: bool,
}

impl SelectStatement {
    pub fn new() -> StatementRef {
        Rc::new(RefCell::new(SelectStatement::default()))
    }

    /// Record a dependency on a symbol bound in an enclosing scope.
    pub fn add_outer_extent(&mut self, symbol: SymbolRef) {
        if !self.outer_extents.iter().any(|s| Rc::ptr_eq(s, &symbol)) {
            self.outer_extents.push(symbol);
        }
    }

    /// Clause serialization in fixed order. Mutates alias state (rename
    /// resolution); calling this twice on one statement is unsupported.
    pub fn write_sql(&mut self, w: &mut SqlWriter, naming: &mut NamingContext) {
        self.resolve_from_alias_renames(naming);

        w.write("SELECT ");
        if self.distinct {
            w.write("DISTINCT ");
        }
        if self.select.is_empty() {
            // No explicit projection narrowing has occurred.
            w.write("*");
        } else {
            for (i, column) in self.select.columns.iter().enumerate() {
                if i > 0 {
                    w.write(", ");
                }
                column.expr.write_sql(w, naming);
                resolve_column_rename(&column.target, naming);
                let target = column.target.borrow();
                let skip_alias = column.is_simple
                    && matches!(&column.expr, SqlFragment::ColumnRef { column: c, .. }
                        if c.borrow().new_name == target.new_name);
                if !skip_alias {
                    w.write(" AS ");
                    w.write(&quote_identifier(&target.new_name));
                }
                if target.new_name != target.name {
                    self.output_columns
                        .get_or_insert_with(HashMap::new)
                        .insert(target.name.clone(), column.target.clone());
                }
            }
        }

        w.new_line();
        w.write("FROM ");
        self.from.write_sql(w, naming);

        if !self.where_clause.is_empty() {
            w.new_line();
            w.write("WHERE ");
            self.where_clause.write_sql(w, naming);
        }
        if !self.group_by.is_empty() {
            w.new_line();
            w.write("GROUP BY ");
            self.group_by.write_sql(w, naming);
        }
        if !self.order_by.is_empty() && (self.is_top_most || !self.top.is_empty()) {
            w.new_line();
            w.write("ORDER BY ");
            self.order_by.write_sql(w, naming);
        }
        if !self.top.is_empty() {
            w.new_line();
            self.top.write_sql(w, naming);
        }
    }

    /// Rename any extent of this statement whose alias is already visible in
    /// an enclosing scope, or already taken by an earlier sibling in the
    /// same FROM clause (join flattening merges scopes). Runs before any
    /// clause text is written, so column references rendered later in this
    /// statement pick up the new names.
    fn resolve_from_alias_renames(&mut self, naming: &mut NamingContext) {
        let mut taken: HashSet<String> = HashSet::new();
        for symbol in flatten_extents(&self.outer_extents) {
            taken.insert(symbol.borrow().new_name.to_lowercase());
        }
        let extent_list = self
            .all_join_extents
            .clone()
            .unwrap_or_else(|| self.from_extents.clone());
        for extent in flatten_extents(&extent_list) {
            let collides = taken.contains(&extent.borrow().new_name.to_lowercase());
            if collides {
                let base = extent.borrow().name.clone();
                let renamed = naming.extents.allocate(&base);
                extent.borrow_mut().new_name = renamed;
            }
            taken.insert(extent.borrow().new_name.to_lowercase());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql_generator::symbols::Symbol;

    fn render(statement: &StatementRef, naming: &mut NamingContext) -> String {
        let mut w = SqlWriter::new();
        statement.borrow_mut().write_sql(&mut w, naming);
        w.into_string()
    }

    fn scan_statement(table: &str, alias: &str, naming: &mut NamingContext) -> StatementRef {
        let statement = SelectStatement::new();
        let symbol = Symbol::new(alias);
        naming.extents.declare(alias);
        {
            let mut s = statement.borrow_mut();
            s.from.append_str(format!("\"{}\" AS ", table));
            s.from.append(SqlFragment::Symbol(symbol.clone()));
            s.from_extents.push(symbol);
        }
        statement
    }

    #[test]
    fn test_empty_select_list_renders_star() {
        let mut naming = NamingContext::new();
        let statement = scan_statement("Customers", "C", &mut naming);
        let sql = render(&statement, &mut naming);
        assert_eq!(sql, "SELECT *\nFROM \"Customers\" AS \"C\"");
    }

    #[test]
    fn test_paging_with_skip_and_take() {
        let mut naming = NamingContext::new();
        let statement = scan_statement("Orders", "O", &mut naming);
        {
            let mut s = statement.borrow_mut();
            s.top.skip_count = Some(SqlFragment::lit("11"));
            s.top.top_count = Some(SqlFragment::lit("5"));
        }
        let sql = render(&statement, &mut naming);
        assert!(sql.ends_with("OFFSET 11 FETCH NEXT 5 ROWS ONLY"));
    }

    #[test]
    fn test_paging_take_only() {
        let mut naming = NamingContext::new();
        let statement = scan_statement("Orders", "O", &mut naming);
        statement.borrow_mut().top.top_count = Some(SqlFragment::lit("3"));
        let sql = render(&statement, &mut naming);
        assert!(sql.ends_with("FETCH FIRST 3 ROWS ONLY"));
        assert!(!sql.contains("OFFSET"));
    }

    #[test]
    fn test_order_by_suppressed_in_nested_unpaged_statement() {
        let mut naming = NamingContext::new();
        let statement = scan_statement("Orders", "O", &mut naming);
        statement.borrow_mut().order_by.append_str("\"O\".\"Id\" ASC");
        let sql = render(&statement, &mut naming);
        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn test_order_by_kept_on_top_most_statement() {
        let mut naming = NamingContext::new();
        let statement = scan_statement("Orders", "O", &mut naming);
        {
            let mut s = statement.borrow_mut();
            s.order_by.append_str("\"O\".\"Id\" ASC");
            s.is_top_most = true;
        }
        let sql = render(&statement, &mut naming);
        assert!(sql.contains("ORDER BY \"O\".\"Id\" ASC"));
    }

    #[test]
    fn test_order_by_kept_when_paged() {
        let mut naming = NamingContext::new();
        let statement = scan_statement("Orders", "O", &mut naming);
        {
            let mut s = statement.borrow_mut();
            s.order_by.append_str("\"O\".\"Id\" ASC");
            s.top.top_count = Some(SqlFragment::lit("3"));
        }
        let sql = render(&statement, &mut naming);
        assert!(sql.contains("ORDER BY"));
    }

    #[test]
    fn test_alias_collision_renames_inner_extent() {
        let mut naming = NamingContext::new();
        let outer = Symbol::new("C");
        naming.extents.declare("C");
        let statement = scan_statement("Customers", "C", &mut naming);
        statement.borrow_mut().add_outer_extent(outer.clone());

        let sql = render(&statement, &mut naming);
        assert!(sql.contains("AS \"C1\""), "got: {}", sql);
        assert_eq!(outer.borrow().new_name, "C");
    }
}
