//! End-to-end DML scenarios through the public translation entry point.

use ifxgen::command_tree::{
    CommandTree, ComparisonOp, Expr, FunctionRef, Literal, SetClause, TableRef,
};
use ifxgen::sql_generator::{translate, CommandKind, DialectVersion};

fn col(name: &str) -> Expr {
    Expr::Property {
        instance: Box::new(Expr::Variable("t".into())),
        name: name.into(),
    }
}

#[test]
fn insert_produces_positional_parameters() {
    let tree = CommandTree::Insert {
        target: TableRef {
            schema: Some("sales".into()),
            name: "Customers".into(),
        },
        values: vec![
            SetClause {
                column: "CompanyName".into(),
                value: Expr::Literal(Literal::String("Bacchus Cellars".into())),
            },
            SetClause {
                column: "Rank".into(),
                value: Expr::Literal(Literal::Int(1)),
            },
        ],
    };
    let result = translate(&tree, DialectVersion::V12_10).unwrap();
    assert_eq!(result.kind, CommandKind::Text);
    assert_eq!(
        result.sql,
        "INSERT INTO \"sales\".\"Customers\" (\"CompanyName\", \"Rank\")\nVALUES (?, ?)"
    );
    let parameters = result.parameters.unwrap();
    assert_eq!(parameters.len(), 2);
    assert_eq!(parameters[0].value, Literal::String("Bacchus Cellars".into()));
    assert_eq!(parameters[1].value, Literal::Int(1));
}

#[test]
fn update_with_predicate() {
    let tree = CommandTree::Update {
        target: TableRef::new("Customers"),
        set: vec![SetClause {
            column: "Rank".into(),
            value: Expr::Literal(Literal::Int(2)),
        }],
        predicate: Some(Expr::Comparison {
            op: ComparisonOp::Eq,
            left: Box::new(col("Id")),
            right: Box::new(Expr::Literal(Literal::Int(42))),
        }),
    };
    let result = translate(&tree, DialectVersion::V12_10).unwrap();
    assert_eq!(
        result.sql,
        "UPDATE \"Customers\"\nSET \"Rank\" = ?\nWHERE (\"Id\" = ?)"
    );
    let parameters = result.parameters.unwrap();
    assert_eq!(parameters[0].value, Literal::Int(2));
    assert_eq!(parameters[1].value, Literal::Int(42));
}

#[test]
fn delete_all_rows_has_empty_parameter_list() {
    let tree = CommandTree::Delete {
        target: TableRef::new("Staging"),
        predicate: None,
    };
    let result = translate(&tree, DialectVersion::V12_10).unwrap();
    assert_eq!(result.sql, "DELETE FROM \"Staging\"");
    assert_eq!(result.parameters, Some(vec![]));
}

#[test]
fn stored_procedure_call_selects_command_kind() {
    let mut function = FunctionRef::builtin("cleanup_stale_sessions");
    function.builtin = false;
    function.schema = Some("admin".into());
    let tree = CommandTree::FunctionCall { function };
    let result = translate(&tree, DialectVersion::V12_10).unwrap();
    assert_eq!(result.kind, CommandKind::StoredProcedure);
    assert_eq!(result.sql, "\"admin\".\"cleanup_stale_sessions\"");
}
