//! The command-tree driver: a depth-first walk over the expression tree
//! that builds select statements and fragments.
//!
//! Two context stacks drive scope management. The select-statement stack
//! tracks which statement child expressions write into (and lets a variable
//! reference register itself as an outer-extent dependency). The
//! parent-is-join stack decides whether an extent or nested join is inlined
//! into an enclosing join's FROM clause or gets a statement of its own.

use std::rc::Rc;

use crate::command_tree::{
    AggregateCall, AggregateFunction, ArithmeticOp, Binding, ComparisonOp, DataType, Expr,
    JoinKind, Literal, SetOpKind, SortKey, TableRef,
};

use super::errors::SqlGenError;
use super::fragment::{quote_identifier, string_literal, SqlFragment, SqlWriter};
use super::function_registry::translate_function;
use super::select_statement::{SelectColumn, SelectStatement, StatementRef};
use super::symbols::{flatten_extents, JoinInfo, NamingContext, Symbol, SymbolRef, SymbolTable};
use super::DialectVersion;

/// What visiting a relational expression produced.
enum RelResult {
    /// A full statement and the symbol naming its rows.
    Statement {
        statement: StatementRef,
        symbol: SymbolRef,
    },
    /// Raw FROM-clause text (a table reference, table function, or set
    /// operation); the consumer aliases it.
    Fragment {
        sql: SqlFragment,
        columns: Vec<SymbolRef>,
        needs_parens: bool,
    },
    /// A nested join that was flattened into the enclosing join's FROM
    /// clause; nothing left to place, only a naming symbol.
    Inlined(SymbolRef),
}

/// Which operator wants to reuse a statement; see `is_compatible`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReuseKind {
    Filter,
    Project,
    GroupBy,
    Sort,
    Skip,
    Limit,
    Distinct,
}

/// One translation's driver. Owns the naming registries; never reused
/// across command trees.
pub struct SqlGenerator {
    version: DialectVersion,
    naming: NamingContext,
    symbol_table: SymbolTable,
    select_stack: Vec<StatementRef>,
    is_parent_a_join: Vec<bool>,
    /// Set when a bare variable reference is visited; the two legal parent
    /// node kinds (property access, function argument) clear it. If it is
    /// still set when the walk finishes, the tree was malformed.
    pending_var_ref: Option<String>,
}

impl SqlGenerator {
    pub fn new(version: DialectVersion) -> Self {
        SqlGenerator {
            version,
            naming: NamingContext::new(),
            symbol_table: SymbolTable::new(),
            select_stack: Vec::new(),
            is_parent_a_join: Vec::new(),
            pending_var_ref: None,
        }
    }

    /// Translate a query root to SQL text. Collection-typed roots produce a
    /// full statement marked top-most; scalar roots produce `SELECT <expr>`
    /// with no FROM clause.
    pub fn generate_query(&mut self, root: &Expr) -> Result<String, SqlGenError> {
        if root.is_relational() {
            let (statement, _) = self.ensure_statement(root)?;
            self.check_pending_var_ref()?;
            statement.borrow_mut().is_top_most = true;
            let mut w = SqlWriter::new();
            statement.borrow_mut().write_sql(&mut w, &mut self.naming);
            Ok(w.into_string())
        } else {
            let fragment = self.visit_expr(root)?;
            self.check_pending_var_ref()?;
            let mut w = SqlWriter::new();
            w.write("SELECT ");
            fragment.write_sql(&mut w, &mut self.naming);
            Ok(w.into_string())
        }
    }

    /// Render a finished fragment with this translation's naming state.
    pub fn render_fragment(&mut self, fragment: &SqlFragment) -> String {
        let mut w = SqlWriter::new();
        fragment.write_sql(&mut w, &mut self.naming);
        w.into_string()
    }

    fn check_pending_var_ref(&self) -> Result<(), SqlGenError> {
        match &self.pending_var_ref {
            Some(variable) => Err(SqlGenError::DanglingVariableReference(variable.clone())),
            None => Ok(()),
        }
    }

    fn parent_is_join(&self) -> bool {
        *self.is_parent_a_join.last().unwrap_or(&false)
    }

    fn new_extent_symbol(&mut self, name: &str) -> SymbolRef {
        self.naming.extents.declare(name);
        Symbol::new(name)
    }

    // ----- scalar expressions -----

    /// Visit a scalar expression to a fragment. Every node kind except
    /// function application has a fixed, context-free textual template.
    pub(crate) fn visit_expr(&mut self, e: &Expr) -> Result<SqlFragment, SqlGenError> {
        match e {
            Expr::Literal(literal) => Ok(SqlFragment::lit(literal_sql(literal)?)),
            Expr::Parameter(_) => Ok(SqlFragment::lit("?")),
            Expr::Variable(variable) => self.visit_variable(variable),
            Expr::Property { instance, name } => self.visit_property(instance, name),
            Expr::Not(inner) => {
                let inner = self.visit_expr(inner)?;
                Ok(SqlFragment::seq(vec![
                    SqlFragment::lit("NOT ("),
                    inner,
                    SqlFragment::lit(")"),
                ]))
            }
            Expr::And(left, right) => self.binary(left, right, "AND"),
            Expr::Or(left, right) => self.binary(left, right, "OR"),
            Expr::Comparison { op, left, right } => self.binary(left, right, comparison_sql(*op)),
            Expr::Arithmetic { op, left, right } => match op {
                ArithmeticOp::Add => self.binary(left, right, "+"),
                ArithmeticOp::Sub => self.binary(left, right, "-"),
                ArithmeticOp::Mul => self.binary(left, right, "*"),
                ArithmeticOp::Div => self.binary(left, right, "/"),
                ArithmeticOp::Mod => {
                    let left = self.visit_expr(left)?;
                    let right = self.visit_expr(right)?;
                    Ok(SqlFragment::seq(vec![
                        SqlFragment::lit("MOD("),
                        left,
                        SqlFragment::lit(", "),
                        right,
                        SqlFragment::lit(")"),
                    ]))
                }
            },
            Expr::Negate(inner) => {
                let inner = self.visit_expr(inner)?;
                Ok(SqlFragment::seq(vec![
                    SqlFragment::lit("-("),
                    inner,
                    SqlFragment::lit(")"),
                ]))
            }
            Expr::IsNull(inner) => {
                let inner = self.visit_expr(inner)?;
                Ok(SqlFragment::seq(vec![
                    SqlFragment::lit("("),
                    inner,
                    SqlFragment::lit(" IS NULL)"),
                ]))
            }
            Expr::Case {
                when_then,
                else_expr,
            } => {
                if when_then.is_empty() {
                    return Err(SqlGenError::MalformedTree(
                        "CASE requires at least one WHEN branch".to_string(),
                    ));
                }
                let mut parts = vec![SqlFragment::lit("CASE")];
                for (when, then) in when_then {
                    parts.push(SqlFragment::lit(" WHEN "));
                    parts.push(self.visit_expr(when)?);
                    parts.push(SqlFragment::lit(" THEN "));
                    parts.push(self.visit_expr(then)?);
                }
                if let Some(else_expr) = else_expr {
                    parts.push(SqlFragment::lit(" ELSE "));
                    parts.push(self.visit_expr(else_expr)?);
                }
                parts.push(SqlFragment::lit(" END"));
                Ok(SqlFragment::seq(parts))
            }
            Expr::Cast { expr, to } => {
                let inner = self.visit_expr(expr)?;
                Ok(SqlFragment::seq(vec![
                    SqlFragment::lit("CAST("),
                    inner,
                    SqlFragment::lit(format!(" AS {})", type_sql(to))),
                ]))
            }
            Expr::Function { function, args } => translate_function(self, function, args),
            _ => Err(SqlGenError::MalformedTree(
                "collection-typed expression in scalar position".to_string(),
            )),
        }
    }

    /// Function arguments are one of the two legal parents of a bare
    /// variable reference.
    pub(crate) fn visit_function_arg(&mut self, e: &Expr) -> Result<SqlFragment, SqlGenError> {
        let fragment = self.visit_expr(e)?;
        self.pending_var_ref = None;
        Ok(fragment)
    }

    fn binary(&mut self, left: &Expr, right: &Expr, token: &str) -> Result<SqlFragment, SqlGenError> {
        let left = self.visit_expr(left)?;
        let right = self.visit_expr(right)?;
        Ok(SqlFragment::seq(vec![
            SqlFragment::lit("("),
            left,
            SqlFragment::lit(format!(" {} ", token)),
            right,
            SqlFragment::lit(")"),
        ]))
    }

    fn visit_variable(&mut self, variable: &str) -> Result<SqlFragment, SqlGenError> {
        let symbol = self
            .symbol_table
            .lookup(variable)
            .ok_or_else(|| SqlGenError::UnknownVariable(variable.to_string()))?;

        if let Some(current) = self.select_stack.last() {
            let mut statement = current.borrow_mut();
            let mut in_scope_extents = statement.from_extents.clone();
            if let Some(all) = &statement.all_join_extents {
                in_scope_extents.extend(all.iter().cloned());
            }
            let in_scope_extents = flatten_extents(&in_scope_extents);
            // A join symbol is in scope when every leaf it names is.
            let leaves = flatten_extents(std::slice::from_ref(&symbol));
            let in_scope = !leaves.is_empty()
                && leaves.iter().all(|leaf| {
                    in_scope_extents
                        .iter()
                        .any(|s| Rc::ptr_eq(s, leaf) || Rc::ptr_eq(s, &symbol))
                });
            if !in_scope {
                statement.add_outer_extent(symbol.clone());
            }
        }

        self.pending_var_ref = Some(variable.to_string());
        Ok(SqlFragment::Symbol(symbol))
    }

    fn visit_property(&mut self, instance: &Expr, name: &str) -> Result<SqlFragment, SqlGenError> {
        let instance = self.visit_expr(instance)?;
        // Property access is the other legal parent of a variable reference.
        self.pending_var_ref = None;

        match instance {
            SqlFragment::Symbol(symbol) => {
                if symbol.borrow().is_join() {
                    let s = symbol.borrow();
                    let join = s.join.as_ref().unwrap();
                    if let Some(member) = join.name_to_extent.get(&name.to_lowercase()).cloned() {
                        // A record member of a join names an extent, not a
                        // column.
                        drop(s);
                        return Ok(SqlFragment::Symbol(member));
                    }
                    if join.extent_list.is_empty() && join.flattened_extent_list.is_empty() {
                        // The join was wrapped as a derived table: member
                        // navigation collapses onto the derived alias.
                        drop(s);
                        return Ok(SqlFragment::Symbol(symbol));
                    }
                    return Err(SqlGenError::ColumnNotFound {
                        extent: s.name.clone(),
                        column: name.to_string(),
                    });
                }
                let column = {
                    let s = symbol.borrow();
                    s.find_column(name)
                };
                let column = column.unwrap_or_else(|| Symbol::new(name));
                Ok(SqlFragment::ColumnRef {
                    table: symbol,
                    column,
                })
            }
            other => Ok(SqlFragment::seq(vec![
                other,
                SqlFragment::lit(format!(".{}", quote_identifier(name))),
            ])),
        }
    }

    // ----- relational expressions -----

    /// Visit a relational expression and guarantee a full statement,
    /// wrapping raw FROM fragments when needed. Used for query roots and
    /// set-operation operands.
    fn ensure_statement(&mut self, e: &Expr) -> Result<(StatementRef, SymbolRef), SqlGenError> {
        self.is_parent_a_join.push(false);
        let rel = self.visit_relational(e);
        self.is_parent_a_join.pop();
        let alias = default_alias(e);
        self.statement_from_rel(rel?, &alias)
    }

    fn visit_input(&mut self, input: &Binding) -> Result<(StatementRef, SymbolRef), SqlGenError> {
        self.is_parent_a_join.push(false);
        let rel = self.visit_relational(&input.expr);
        self.is_parent_a_join.pop();
        self.statement_from_rel(rel?, &input.variable)
    }

    fn statement_from_rel(
        &mut self,
        rel: RelResult,
        alias: &str,
    ) -> Result<(StatementRef, SymbolRef), SqlGenError> {
        match rel {
            RelResult::Statement { statement, symbol } => Ok((statement, symbol)),
            RelResult::Fragment {
                sql,
                columns,
                needs_parens,
            } => {
                let statement = SelectStatement::new();
                let symbol = self.new_extent_symbol(alias);
                for column in columns {
                    symbol.borrow_mut().add_column(column);
                }
                {
                    let mut s = statement.borrow_mut();
                    if needs_parens {
                        s.from.append_str("(");
                    }
                    s.from.append(sql);
                    if needs_parens {
                        s.from.append_str(")");
                    }
                    s.from.append_str(" AS ");
                    s.from.append(SqlFragment::Symbol(symbol.clone()));
                    s.from_extents.push(symbol.clone());
                }
                Ok((statement, symbol))
            }
            RelResult::Inlined(_) => Err(SqlGenError::MalformedTree(
                "flattened join fragment outside an enclosing join".to_string(),
            )),
        }
    }

    fn visit_relational(&mut self, e: &Expr) -> Result<RelResult, SqlGenError> {
        match e {
            Expr::Scan(table) => Ok(RelResult::Fragment {
                sql: SqlFragment::lit(table_sql(table)),
                columns: Vec::new(),
                needs_parens: false,
            }),
            Expr::Function { function, args } if !function.builtin => {
                // A composable store function used as a row source.
                let mut parts = vec![SqlFragment::lit("TABLE(")];
                let call = super::function_registry::translate_function(self, function, args)?;
                parts.push(call);
                parts.push(SqlFragment::lit(")"));
                Ok(RelResult::Fragment {
                    sql: SqlFragment::seq(parts),
                    columns: Vec::new(),
                    needs_parens: false,
                })
            }
            Expr::Filter { input, predicate } => self.visit_filter(input, predicate),
            Expr::Project { input, columns } => self.visit_project(input, columns),
            Expr::Join {
                kind,
                left,
                right,
                condition,
            } => self.visit_join(*kind, left, right, condition.as_deref()),
            Expr::GroupBy {
                input,
                keys,
                aggregates,
            } => self.visit_group_by(input, keys, aggregates),
            Expr::Sort { input, keys } => self.visit_sort(input, keys),
            Expr::Skip { input, keys, count } => self.visit_skip(input, keys, count),
            Expr::Limit { input, count } => self.visit_limit(input, count),
            Expr::Distinct { input } => self.visit_distinct(input),
            Expr::SetOp { op, left, right } => self.visit_set_op(*op, left, right),
            _ => Err(SqlGenError::MalformedTree(
                "scalar expression where a row collection was expected".to_string(),
            )),
        }
    }

    /// Reuse the statement produced by the input when the new operator can
    /// legally write into it; otherwise wrap it as a derived table.
    fn ensure_compatible(
        &mut self,
        statement: StatementRef,
        symbol: SymbolRef,
        variable: &str,
        kind: ReuseKind,
    ) -> (StatementRef, SymbolRef) {
        if is_compatible(&statement.borrow(), kind) {
            return (statement, symbol);
        }
        log::debug!("statement not reusable for {:?}, wrapping '{}'", kind, variable);
        self.wrap_statement(statement, variable)
    }

    /// `SELECT ... FROM ( <inner> ) AS <variable>`. The inner statement's
    /// select targets become the new symbol's columns, so renames flow
    /// through to every outer reference.
    fn wrap_statement(
        &mut self,
        inner: StatementRef,
        variable: &str,
    ) -> (StatementRef, SymbolRef) {
        let outer = SelectStatement::new();
        let symbol = self.new_extent_symbol(variable);
        for column in &inner.borrow().select.columns {
            symbol.borrow_mut().add_column(column.target.clone());
        }
        mark_wrapped_join(&symbol, &inner);
        {
            let mut o = outer.borrow_mut();
            o.from.append(SqlFragment::Select(inner));
            o.from.append_str(" AS ");
            o.from.append(SqlFragment::Symbol(symbol.clone()));
            o.from_extents.push(symbol.clone());
        }
        (outer, symbol)
    }

    fn visit_filter(&mut self, input: &Binding, predicate: &Expr) -> Result<RelResult, SqlGenError> {
        let (statement, symbol) = self.visit_input(input)?;
        let (statement, symbol) =
            self.ensure_compatible(statement, symbol, &input.variable, ReuseKind::Filter);

        self.select_stack.push(statement.clone());
        self.symbol_table.enter_scope();
        self.symbol_table.add(&input.variable, symbol.clone());

        let predicate = self.visit_expr(predicate)?;
        {
            let mut s = statement.borrow_mut();
            if !s.where_clause.is_empty() {
                s.where_clause.append_str(" AND ");
            }
            s.where_clause.append(predicate);
        }

        self.symbol_table.exit_scope();
        self.select_stack.pop();
        Ok(RelResult::Statement { statement, symbol })
    }

    fn visit_project(
        &mut self,
        input: &Binding,
        columns: &[crate::command_tree::ProjectColumn],
    ) -> Result<RelResult, SqlGenError> {
        let (statement, symbol) = self.visit_input(input)?;
        let (statement, symbol) =
            self.ensure_compatible(statement, symbol, &input.variable, ReuseKind::Project);

        self.select_stack.push(statement.clone());
        self.symbol_table.enter_scope();
        self.symbol_table.add(&input.variable, symbol.clone());

        for column in columns {
            let expr = self.visit_expr(&column.expr)?;
            self.push_select_column(&statement, &column.name, expr);
        }

        self.symbol_table.exit_scope();
        self.select_stack.pop();
        Ok(RelResult::Statement { statement, symbol })
    }

    /// Add one projected output, marking it for renaming when another column
    /// in the same statement already claimed the name.
    fn push_select_column(&mut self, statement: &StatementRef, name: &str, expr: SqlFragment) {
        let duplicate = statement
            .borrow()
            .select
            .columns
            .iter()
            .any(|c| c.target.borrow().name.eq_ignore_ascii_case(name));
        let target = Symbol::new(name);
        if duplicate {
            target.borrow_mut().needs_renaming = true;
        }
        self.naming.columns.declare(name);
        let is_simple = matches!(expr, SqlFragment::ColumnRef { .. });
        statement.borrow_mut().select.push(SelectColumn {
            target,
            expr,
            is_simple,
        });
    }

    fn visit_group_by(
        &mut self,
        input: &Binding,
        keys: &[crate::command_tree::ProjectColumn],
        aggregates: &[(String, AggregateCall)],
    ) -> Result<RelResult, SqlGenError> {
        let (statement, symbol) = self.visit_input(input)?;
        let (statement, symbol) =
            self.ensure_compatible(statement, symbol, &input.variable, ReuseKind::GroupBy);

        self.select_stack.push(statement.clone());
        self.symbol_table.enter_scope();
        self.symbol_table.add(&input.variable, symbol.clone());

        for (i, key) in keys.iter().enumerate() {
            let expr = self.visit_expr(&key.expr)?;
            {
                let mut s = statement.borrow_mut();
                if i > 0 {
                    s.group_by.append_str(", ");
                }
                s.group_by.append(expr.clone());
            }
            self.push_select_column(&statement, &key.name, expr);
        }
        for (name, aggregate) in aggregates {
            let expr = self.visit_aggregate(aggregate)?;
            self.push_select_column(&statement, name, expr);
        }

        self.symbol_table.exit_scope();
        self.select_stack.pop();
        Ok(RelResult::Statement { statement, symbol })
    }

    fn visit_aggregate(&mut self, aggregate: &AggregateCall) -> Result<SqlFragment, SqlGenError> {
        let token = match aggregate.function {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        };
        match &aggregate.arg {
            None => {
                if aggregate.function != AggregateFunction::Count {
                    return Err(SqlGenError::MalformedTree(format!(
                        "{} requires an argument",
                        token
                    )));
                }
                Ok(SqlFragment::lit("COUNT(*)"))
            }
            Some(arg) => {
                let arg = self.visit_function_arg(arg)?;
                let mut parts = vec![SqlFragment::lit(format!("{}(", token))];
                if aggregate.distinct {
                    parts.push(SqlFragment::lit("DISTINCT "));
                }
                parts.push(arg);
                parts.push(SqlFragment::lit(")"));
                Ok(SqlFragment::seq(parts))
            }
        }
    }

    fn visit_sort(&mut self, input: &Binding, keys: &[SortKey]) -> Result<RelResult, SqlGenError> {
        let (statement, symbol) = self.visit_input(input)?;
        let (statement, symbol) =
            self.ensure_compatible(statement, symbol, &input.variable, ReuseKind::Sort);

        self.select_stack.push(statement.clone());
        self.symbol_table.enter_scope();
        self.symbol_table.add(&input.variable, symbol.clone());
        self.append_sort_keys(&statement, keys)?;
        self.symbol_table.exit_scope();
        self.select_stack.pop();
        Ok(RelResult::Statement { statement, symbol })
    }

    fn append_sort_keys(
        &mut self,
        statement: &StatementRef,
        keys: &[SortKey],
    ) -> Result<(), SqlGenError> {
        for (i, key) in keys.iter().enumerate() {
            let expr = self.visit_expr(&key.expr)?;
            let mut s = statement.borrow_mut();
            if i > 0 {
                s.order_by.append_str(", ");
            }
            s.order_by.append(expr);
            s.order_by
                .append_str(if key.ascending { " ASC" } else { " DESC" });
        }
        Ok(())
    }

    fn visit_skip(
        &mut self,
        input: &Binding,
        keys: &[SortKey],
        count: &Expr,
    ) -> Result<RelResult, SqlGenError> {
        self.require_paging()?;
        let (statement, symbol) = self.visit_input(input)?;
        let (statement, symbol) =
            self.ensure_compatible(statement, symbol, &input.variable, ReuseKind::Skip);

        self.select_stack.push(statement.clone());
        self.symbol_table.enter_scope();
        self.symbol_table.add(&input.variable, symbol.clone());
        self.append_sort_keys(&statement, keys)?;
        let skip = self.adjusted_skip(count)?;
        statement.borrow_mut().top.skip_count = Some(skip);
        self.symbol_table.exit_scope();
        self.select_stack.pop();
        Ok(RelResult::Statement { statement, symbol })
    }

    /// The engine's paging is 1-based: the emitted offset is `skip + 1`.
    /// Constant skips fold at translation time; anything else emits the
    /// arithmetic.
    fn adjusted_skip(&mut self, count: &Expr) -> Result<SqlFragment, SqlGenError> {
        if let Expr::Literal(literal) = count {
            if let Some(n) = literal.as_integer() {
                return Ok(SqlFragment::lit((n + 1).to_string()));
            }
        }
        let fragment = self.visit_expr(count)?;
        Ok(SqlFragment::seq(vec![
            SqlFragment::lit("("),
            fragment,
            SqlFragment::lit(" + 1)"),
        ]))
    }

    fn visit_limit(&mut self, input: &Binding, count: &Expr) -> Result<RelResult, SqlGenError> {
        self.require_paging()?;
        let (statement, symbol) = self.visit_input(input)?;
        let (statement, symbol) =
            self.ensure_compatible(statement, symbol, &input.variable, ReuseKind::Limit);

        self.select_stack.push(statement.clone());
        self.symbol_table.enter_scope();
        self.symbol_table.add(&input.variable, symbol.clone());
        let count = self.visit_expr(count)?;
        statement.borrow_mut().top.top_count = Some(count);
        self.symbol_table.exit_scope();
        self.select_stack.pop();
        Ok(RelResult::Statement { statement, symbol })
    }

    fn visit_distinct(&mut self, input: &Binding) -> Result<RelResult, SqlGenError> {
        let (statement, symbol) = self.visit_input(input)?;
        let (statement, symbol) =
            self.ensure_compatible(statement, symbol, &input.variable, ReuseKind::Distinct);
        statement.borrow_mut().distinct = true;
        Ok(RelResult::Statement { statement, symbol })
    }

    fn visit_set_op(
        &mut self,
        op: SetOpKind,
        left: &Expr,
        right: &Expr,
    ) -> Result<RelResult, SqlGenError> {
        let token = match op {
            SetOpKind::UnionAll => " UNION ALL ",
            SetOpKind::Intersect => " INTERSECT ",
            SetOpKind::Except => " EXCEPT ",
        };
        let (left_statement, _) = self.ensure_statement(left)?;
        let (right_statement, _) = self.ensure_statement(right)?;
        // Output columns follow the left operand, positionally.
        let columns: Vec<SymbolRef> = left_statement
            .borrow()
            .select
            .columns
            .iter()
            .map(|c| c.target.clone())
            .collect();
        Ok(RelResult::Fragment {
            sql: SqlFragment::seq(vec![
                SqlFragment::Select(left_statement),
                SqlFragment::lit(token),
                SqlFragment::Select(right_statement),
            ]),
            columns,
            needs_parens: true,
        })
    }

    fn visit_join(
        &mut self,
        kind: JoinKind,
        left: &Binding,
        right: &Binding,
        condition: Option<&Expr>,
    ) -> Result<RelResult, SqlGenError> {
        let flatten_into_parent = self.parent_is_join();
        let statement = if flatten_into_parent {
            self.select_stack
                .last()
                .cloned()
                .ok_or_else(|| {
                    SqlGenError::MalformedTree("nested join without an enclosing statement".into())
                })?
        } else {
            let statement = SelectStatement::new();
            statement.borrow_mut().all_join_extents = Some(Vec::new());
            self.select_stack.push(statement.clone());
            statement
        };

        self.symbol_table.enter_scope();

        let join_token = match kind {
            JoinKind::Inner => " INNER JOIN ",
            JoinKind::LeftOuter => " LEFT OUTER JOIN ",
            JoinKind::FullOuter => " FULL OUTER JOIN ",
            JoinKind::Cross => " CROSS JOIN ",
        };

        let mut members: Vec<SymbolRef> = Vec::new();
        for (i, input) in [left, right].into_iter().enumerate() {
            if i > 0 {
                statement.borrow_mut().from.append_str(join_token);
            }
            // Inline a bare extent, and flatten nested inner/cross joins
            // into this FROM clause; outer joins nest as derived tables
            // because their grouping is not associative.
            let child_joinable = match input.expr.as_ref() {
                Expr::Scan(_) => true,
                Expr::Join { kind: child, .. } => {
                    matches!(kind, JoinKind::Inner | JoinKind::Cross)
                        && matches!(child, JoinKind::Inner | JoinKind::Cross)
                }
                _ => false,
            };
            self.is_parent_a_join.push(child_joinable);
            let child = self.visit_relational(&input.expr);
            self.is_parent_a_join.pop();

            let symbol = match child? {
                RelResult::Inlined(join_symbol) => {
                    // Its leaf extents were already placed (and registered
                    // with the shared statement) by the nested visit.
                    {
                        let mut s = join_symbol.borrow_mut();
                        s.name = input.variable.clone();
                        s.new_name = input.variable.clone();
                    }
                    join_symbol
                }
                RelResult::Statement {
                    statement: sub,
                    symbol: _,
                } => {
                    let symbol = self.new_extent_symbol(&input.variable);
                    for column in &sub.borrow().select.columns {
                        symbol.borrow_mut().add_column(column.target.clone());
                    }
                    mark_wrapped_join(&symbol, &sub);
                    {
                        let mut s = statement.borrow_mut();
                        s.from.append(SqlFragment::Select(sub.clone()));
                        s.from.append_str(" AS ");
                        s.from.append(SqlFragment::Symbol(symbol.clone()));
                        if let Some(all) = s.all_join_extents.as_mut() {
                            all.push(symbol.clone());
                        }
                    }
                    symbol
                }
                RelResult::Fragment {
                    sql,
                    columns,
                    needs_parens,
                } => {
                    let symbol = self.new_extent_symbol(&input.variable);
                    for column in columns {
                        symbol.borrow_mut().add_column(column);
                    }
                    {
                        let mut s = statement.borrow_mut();
                        if needs_parens {
                            s.from.append_str("(");
                        }
                        s.from.append(sql);
                        if needs_parens {
                            s.from.append_str(")");
                        }
                        s.from.append_str(" AS ");
                        s.from.append(SqlFragment::Symbol(symbol.clone()));
                        if let Some(all) = s.all_join_extents.as_mut() {
                            all.push(symbol.clone());
                        }
                    }
                    symbol
                }
            };

            self.symbol_table.add(&input.variable, symbol.clone());
            members.push(symbol);
        }

        if let Some(condition) = condition {
            let condition = self.visit_expr(condition)?;
            let mut s = statement.borrow_mut();
            s.from.append_str(" ON ");
            s.from.append(condition);
        }

        self.symbol_table.exit_scope();

        let mut name_to_extent = std::collections::HashMap::new();
        name_to_extent.insert(left.variable.to_lowercase(), members[0].clone());
        name_to_extent.insert(right.variable.to_lowercase(), members[1].clone());
        let flattened = flatten_extents(&members);

        if flatten_into_parent {
            // Naming construct only; the extents are already placed in the
            // enclosing join's FROM clause.
            let join_symbol = Symbol::new_join(
                String::new(),
                JoinInfo {
                    extent_list: members,
                    flattened_extent_list: flattened,
                    name_to_extent,
                    is_nested_join: false,
                },
            );
            Ok(RelResult::Inlined(join_symbol))
        } else {
            self.select_stack.pop();
            let join_symbol = Symbol::new_join(
                String::new(),
                JoinInfo {
                    extent_list: members,
                    flattened_extent_list: flattened,
                    name_to_extent,
                    is_nested_join: true,
                },
            );
            let mut s = statement.borrow_mut();
            s.from_extents = vec![join_symbol.clone()];
            drop(s);
            Ok(RelResult::Statement {
                statement,
                symbol: join_symbol,
            })
        }
    }

    fn require_paging(&self) -> Result<(), SqlGenError> {
        match self.version {
            DialectVersion::V12_10 => Ok(()),
            DialectVersion::V11_10 => Err(SqlGenError::PagingNotSupported {
                required: DialectVersion::V12_10.label(),
                actual: self.version.label(),
            }),
        }
    }
}

/// Statement reuse rules, per consuming operator. Conservative: wrapping is
/// always correct, reuse is an optimization.
fn is_compatible(statement: &SelectStatement, kind: ReuseKind) -> bool {
    match kind {
        ReuseKind::Filter => {
            statement.select.is_empty()
                && statement.group_by.is_empty()
                && statement.top.is_empty()
                && !statement.distinct
        }
        ReuseKind::Project => statement.select.is_empty() && !statement.distinct,
        ReuseKind::GroupBy => {
            statement.select.is_empty()
                && statement.group_by.is_empty()
                && statement.order_by.is_empty()
                && statement.top.is_empty()
                && !statement.distinct
        }
        ReuseKind::Sort => {
            statement.select.is_empty()
                && statement.group_by.is_empty()
                && statement.order_by.is_empty()
                && statement.top.is_empty()
        }
        ReuseKind::Skip => {
            statement.select.is_empty()
                && statement.group_by.is_empty()
                && statement.top.is_empty()
                && statement.order_by.is_empty()
                && !statement.distinct
        }
        ReuseKind::Limit => statement.top.top_count.is_none(),
        ReuseKind::Distinct => statement.top.is_empty() && statement.order_by.is_empty(),
    }
}

/// When a join statement is wrapped as a derived table exposing `*`, record
/// member navigation has nothing to land on but the derived alias itself.
/// Mark the wrapping symbol so property access collapses members onto it.
fn mark_wrapped_join(symbol: &SymbolRef, inner: &StatementRef) {
    let inner = inner.borrow();
    let inner_is_join = inner
        .from_extents
        .first()
        .map(|s| s.borrow().is_join())
        .unwrap_or(false);
    if inner_is_join && inner.select.is_empty() {
        symbol.borrow_mut().join = Some(JoinInfo {
            is_nested_join: true,
            ..JoinInfo::default()
        });
    }
}

fn default_alias(e: &Expr) -> String {
    match e {
        Expr::Scan(table) => table.name.clone(),
        _ => "X".to_string(),
    }
}

pub(crate) fn comparison_sql(op: ComparisonOp) -> &'static str {
    match op {
        ComparisonOp::Eq => "=",
        ComparisonOp::Ne => "<>",
        ComparisonOp::Lt => "<",
        ComparisonOp::Le => "<=",
        ComparisonOp::Gt => ">",
        ComparisonOp::Ge => ">=",
    }
}

pub(crate) fn table_sql(table: &TableRef) -> String {
    match &table.schema {
        Some(schema) => format!(
            "{}.{}",
            quote_identifier(schema),
            quote_identifier(&table.name)
        ),
        None => quote_identifier(&table.name),
    }
}

/// Literal rendering for query trees, where constants are inlined.
pub(crate) fn literal_sql(literal: &Literal) -> Result<String, SqlGenError> {
    match literal {
        Literal::Null => Ok("NULL".to_string()),
        // No boolean scalar type in the dialect.
        Literal::Bool(true) => Ok("1".to_string()),
        Literal::Bool(false) => Ok("0".to_string()),
        Literal::Int(i) => Ok(i.to_string()),
        Literal::Decimal(text) => {
            if text.is_empty()
                || !text
                    .chars()
                    .all(|c| c.is_ascii_digit() || c == '.' || c == '-' || c == '+')
            {
                return Err(SqlGenError::MalformedTree(format!(
                    "invalid decimal literal '{}'",
                    text
                )));
            }
            Ok(text.clone())
        }
        Literal::Double(d) => {
            if d.is_finite() {
                Ok(format!("{:?}", d))
            } else {
                Err(SqlGenError::MalformedTree(
                    "non-finite double literal".to_string(),
                ))
            }
        }
        Literal::String(s) => Ok(string_literal(s)),
        Literal::Date(d) => Ok(format!("DATETIME ({}) YEAR TO DAY", d.format("%Y-%m-%d"))),
        Literal::DateTime(dt) => {
            use chrono::Timelike;
            Ok(format!(
                "DATETIME ({}.{:05}) YEAR TO FRACTION(5)",
                dt.format("%Y-%m-%d %H:%M:%S"),
                dt.nanosecond() / 10_000
            ))
        }
        Literal::Time(t) => {
            use chrono::Timelike;
            Ok(format!(
                "DATETIME ({}.{:05}) HOUR TO FRACTION(5)",
                t.format("%H:%M:%S"),
                t.nanosecond() / 10_000
            ))
        }
    }
}

pub(crate) fn type_sql(data_type: &DataType) -> String {
    match data_type {
        DataType::SmallInt => "SMALLINT".to_string(),
        DataType::Int => "INTEGER".to_string(),
        DataType::BigInt => "BIGINT".to_string(),
        DataType::Decimal { precision, scale } => format!("DECIMAL({},{})", precision, scale),
        DataType::Float => "FLOAT".to_string(),
        DataType::Char(n) => format!("CHAR({})", n),
        DataType::Varchar(n) => format!("VARCHAR({})", n),
        DataType::Date => "DATE".to_string(),
        DataType::DateTime => "DATETIME YEAR TO FRACTION(5)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn scalar_sql(e: &Expr) -> Result<String, SqlGenError> {
        let mut gen = SqlGenerator::new(DialectVersion::V12_10);
        gen.generate_query(e)
    }

    #[test]
    fn test_scalar_root_renders_bare_select() {
        let e = Expr::Arithmetic {
            op: ArithmeticOp::Add,
            left: Box::new(Expr::Literal(Literal::Int(1))),
            right: Box::new(Expr::Literal(Literal::Int(2))),
        };
        assert_eq!(scalar_sql(&e).unwrap(), "SELECT (1 + 2)");
    }

    #[test]
    fn test_boolean_literals_coerce_to_integers() {
        assert_eq!(literal_sql(&Literal::Bool(true)).unwrap(), "1");
        assert_eq!(literal_sql(&Literal::Bool(false)).unwrap(), "0");
    }

    #[test]
    fn test_datetime_literal_format() {
        let dt: NaiveDateTime = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_milli_opt(3, 4, 5, 670)
            .unwrap();
        assert_eq!(
            literal_sql(&Literal::DateTime(dt)).unwrap(),
            "DATETIME (2024-01-02 03:04:05.67000) YEAR TO FRACTION(5)"
        );
    }

    #[test]
    fn test_string_literal_doubles_quotes() {
        assert_eq!(
            literal_sql(&Literal::String("O'Hare".into())).unwrap(),
            "'O''Hare'"
        );
    }

    #[test]
    fn test_case_expression() {
        let e = Expr::Case {
            when_then: vec![(
                Expr::Literal(Literal::Bool(true)),
                Expr::Literal(Literal::Int(1)),
            )],
            else_expr: Some(Box::new(Expr::Literal(Literal::Int(0)))),
        };
        assert_eq!(scalar_sql(&e).unwrap(), "SELECT CASE WHEN 1 THEN 1 ELSE 0 END");
    }

    #[test]
    fn test_cast_renders_type_name() {
        let e = Expr::Cast {
            expr: Box::new(Expr::Literal(Literal::Int(7))),
            to: DataType::Decimal {
                precision: 10,
                scale: 2,
            },
        };
        assert_eq!(scalar_sql(&e).unwrap(), "SELECT CAST(7 AS DECIMAL(10,2))");
    }

    #[test]
    fn test_mod_uses_function_form() {
        let e = Expr::Arithmetic {
            op: ArithmeticOp::Mod,
            left: Box::new(Expr::Literal(Literal::Int(7))),
            right: Box::new(Expr::Literal(Literal::Int(2))),
        };
        assert_eq!(scalar_sql(&e).unwrap(), "SELECT MOD(7, 2)");
    }

    #[test]
    fn test_unknown_variable_fails() {
        let e = Expr::Property {
            instance: Box::new(Expr::Variable("ghost".into())),
            name: "Id".into(),
        };
        assert!(matches!(
            scalar_sql(&e).unwrap_err(),
            SqlGenError::UnknownVariable(_)
        ));
    }
}
