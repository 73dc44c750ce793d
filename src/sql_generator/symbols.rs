//! Symbols: named, typed handles for extents, joins, and columns, plus the
//! name registries that keep rendered aliases collision-free.
//!
//! A symbol's rename is decided lazily, the first time the statement that
//! owns it renders its FROM list, and never revisited afterwards. The
//! registries are monotonic for one whole translation: once a suffix is
//! handed out for a base name it is never handed out again, so a name used
//! by an inner scope can never collide with one introduced later by a
//! sibling.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub type SymbolRef = Rc<RefCell<Symbol>>;

/// A named reference to a physical extent (table or derived subquery alias)
/// or to a join grouping.
#[derive(Debug)]
pub struct Symbol {
    /// Original alias, as introduced by the command tree.
    pub name: String,
    /// Render-time alias; defaults to `name` until a collision renames it.
    pub new_name: String,
    /// Set when a later-bound sibling collides with this symbol's output
    /// column name; resolved exactly once on first render.
    pub needs_renaming: bool,
    /// Output columns, keyed case-insensitively. Populated when the symbol
    /// denotes a statement whose output columns are explicitly named, so
    /// references through the symbol share the column's rename state.
    pub columns: HashMap<String, SymbolRef>,
    /// Join bookkeeping, present only on join symbols.
    pub join: Option<JoinInfo>,
}

/// Extra state carried by a symbol that names a join grouping.
#[derive(Debug, Default)]
pub struct JoinInfo {
    /// Immediate children of the join.
    pub extent_list: Vec<SymbolRef>,
    /// Fully flattened leaf extents; empty unless at least one level of
    /// nested joins was flattened into this one. When non-empty it takes
    /// precedence over `extent_list` for alias-collision resolution.
    pub flattened_extent_list: Vec<SymbolRef>,
    /// Case-insensitive lookup from member name to member symbol.
    pub name_to_extent: HashMap<String, SymbolRef>,
    /// True when this join has its own statement, as opposed to being a
    /// naming construct over extents already placed in an enclosing FROM.
    pub is_nested_join: bool,
}

impl Symbol {
    pub fn new(name: impl Into<String>) -> SymbolRef {
        let name = name.into();
        Rc::new(RefCell::new(Symbol {
            new_name: name.clone(),
            name,
            needs_renaming: false,
            columns: HashMap::new(),
            join: None,
        }))
    }

    pub fn new_join(name: impl Into<String>, join: JoinInfo) -> SymbolRef {
        let symbol = Symbol::new(name);
        symbol.borrow_mut().join = Some(join);
        symbol
    }

    pub fn is_join(&self) -> bool {
        self.join.is_some()
    }

    /// Register an output column under its case-insensitive key.
    pub fn add_column(&mut self, column: SymbolRef) {
        let key = column.borrow().name.to_lowercase();
        self.columns.insert(key, column);
    }

    pub fn find_column(&self, name: &str) -> Option<SymbolRef> {
        self.columns.get(&name.to_lowercase()).cloned()
    }
}

/// Expand join symbols into their leaf extents; plain symbols pass through.
pub fn flatten_extents(extents: &[SymbolRef]) -> Vec<SymbolRef> {
    let mut leaves = Vec::new();
    for extent in extents {
        let symbol = extent.borrow();
        match &symbol.join {
            Some(join) if !join.flattened_extent_list.is_empty() => {
                leaves.extend(join.flattened_extent_list.iter().cloned());
            }
            Some(join) if !join.extent_list.is_empty() => {
                leaves.extend(flatten_extents(&join.extent_list));
            }
            // A join marker with no members of its own (a wrapped join
            // statement) is a leaf extent.
            Some(_) | None => leaves.push(extent.clone()),
        }
    }
    leaves
}

/// Per-translation registry of used names and the next free suffix for each
/// base name. Case-insensitive, monotonic; allocation always terminates.
#[derive(Debug, Default)]
pub struct NamePool {
    /// Lowercased name -> last suffix handed out for that base (0 for names
    /// that were only declared).
    names: HashMap<String, i64>,
}

impl NamePool {
    pub fn new() -> Self {
        NamePool {
            names: HashMap::new(),
        }
    }

    /// Mark a base name as used without renaming anything.
    pub fn declare(&mut self, name: &str) {
        self.names.entry(name.to_lowercase()).or_insert(0);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(&name.to_lowercase())
    }

    /// Hand out `base<N>` for the smallest N past the last one used for this
    /// base that is itself unused, and register it.
    pub fn allocate(&mut self, base: &str) -> String {
        let key = base.to_lowercase();
        let mut suffix = *self.names.get(&key).unwrap_or(&0);
        loop {
            suffix += 1;
            let candidate = format!("{}{}", base, suffix);
            if !self.names.contains_key(&candidate.to_lowercase()) {
                self.names.insert(key, suffix);
                self.names.insert(candidate.to_lowercase(), 0);
                return candidate;
            }
        }
    }
}

/// The two registries one translation renders against: extent aliases and
/// projected column names. Owned by the driver, handed down by reference at
/// render time; never shared across translations.
#[derive(Debug, Default)]
pub struct NamingContext {
    pub extents: NamePool,
    pub columns: NamePool,
}

impl NamingContext {
    pub fn new() -> Self {
        NamingContext::default()
    }
}

/// Resolve a pending column rename exactly once; subsequent calls are no-ops.
pub fn resolve_column_rename(column: &SymbolRef, naming: &mut NamingContext) {
    if !column.borrow().needs_renaming {
        return;
    }
    let base = column.borrow().name.clone();
    let renamed = naming.columns.allocate(&base);
    let mut symbol = column.borrow_mut();
    symbol.new_name = renamed;
    symbol.needs_renaming = false;
}

/// Lexically scoped map from binding variable names to their symbols.
/// The driver enters a scope per relational input and exits it after the
/// children are visited.
#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<HashMap<String, SymbolRef>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable { scopes: Vec::new() }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn exit_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn add(&mut self, variable: &str, symbol: SymbolRef) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(variable.to_string(), symbol);
        }
    }

    /// Innermost binding wins.
    pub fn lookup(&self, variable: &str) -> Option<SymbolRef> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(variable).cloned())
    }
}
