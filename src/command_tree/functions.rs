use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// A resolved reference to a function, carrying the catalog metadata the
/// generator needs: whether the function is niladic (invoked with a bare
/// token, no parameter list) and any schema/name override for user-defined
/// store functions. The catalog itself is an external collaborator; by the
/// time a tree reaches the generator these fields are already populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRef {
    /// Abstract (canonical) function name, e.g. "AddDays" or "ToUpper".
    pub name: String,
    /// Schema for user-defined store functions.
    #[serde(default)]
    pub schema: Option<String>,
    /// Store-side name override; `name` is used when absent.
    #[serde(default)]
    pub store_name: Option<String>,
    /// Verbatim command text supplied by the caller for pass-through
    /// execution. Only meaningful on FunctionCall command trees.
    #[serde(default)]
    pub command_text: Option<String>,
    /// Niladic functions render as a bare token and reject arguments.
    #[serde(default)]
    pub niladic: bool,
    /// Builtin (canonical) functions dispatch through the translation
    /// table; non-builtins render schema-qualified.
    #[serde(default = "default_true")]
    pub builtin: bool,
}

impl FunctionRef {
    /// A canonical builtin function with no overrides.
    pub fn builtin(name: impl Into<String>) -> Self {
        FunctionRef {
            name: name.into(),
            schema: None,
            store_name: None,
            command_text: None,
            niladic: false,
            builtin: true,
        }
    }

    /// The name to emit on the store side.
    pub fn store_function_name(&self) -> &str {
        self.store_name.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_name_override() {
        let mut f = FunctionRef::builtin("Ceiling");
        assert_eq!(f.store_function_name(), "Ceiling");
        f.store_name = Some("CEIL".to_string());
        assert_eq!(f.store_function_name(), "CEIL");
    }

    #[test]
    fn test_builtin_defaults() {
        let f = FunctionRef::builtin("Abs");
        assert!(f.builtin);
        assert!(!f.niladic);
        assert!(f.schema.is_none());
    }
}
