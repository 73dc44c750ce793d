use thiserror::Error;

/// Translation failures. Every variant aborts the whole translation; there
/// is no partial SQL text and no retry at this level.
#[derive(Debug, Clone, Error)]
pub enum SqlGenError {
    #[error("'{0}' is not supported in the target dialect")]
    Unsupported(String),
    #[error("function '{function}' expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },
    #[error("niladic function '{0}' cannot be invoked with arguments")]
    NiladicWithArguments(String),
    #[error("variable reference '{0}' is only legal under a property access or as a function argument")]
    DanglingVariableReference(String),
    #[error("unknown variable '{0}' (no enclosing binding introduces it)")]
    UnknownVariable(String),
    #[error("malformed command tree: {0}")]
    MalformedTree(String),
    #[error("column '{column}' not found on extent '{extent}'")]
    ColumnNotFound { extent: String, column: String },
    #[error("paging clauses require dialect version {required} (translating for {actual})")]
    PagingNotSupported {
        required: &'static str,
        actual: &'static str,
    },
}
