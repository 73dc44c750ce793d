//! End-to-end SELECT pipeline scenarios: whole command trees in, SQL text
//! out, asserted against the exact dialect wire form.

use ifxgen::command_tree::{
    Binding, CommandTree, ComparisonOp, Expr, FunctionRef, JoinKind, Literal, ProjectColumn,
    SetOpKind, SortKey, TableRef,
};
use ifxgen::sql_generator::{translate, CommandKind, DialectVersion, SqlGenError};

fn query(root: Expr) -> CommandTree {
    CommandTree::Query { root }
}

fn sql(tree: &CommandTree) -> String {
    let result = translate(tree, DialectVersion::V12_10).expect("translation failed");
    assert_eq!(result.kind, CommandKind::Text);
    assert!(result.parameters.is_none());
    result.sql
}

fn prop(variable: &str, name: &str) -> Expr {
    Expr::Property {
        instance: Box::new(Expr::Variable(variable.into())),
        name: name.into(),
    }
}

fn scan(table: &str) -> Expr {
    Expr::Scan(TableRef::new(table))
}

fn int(i: i64) -> Expr {
    Expr::Literal(Literal::Int(i))
}

#[test]
fn like_scenario_with_prescaped_pattern() {
    // SELECT CompanyName FROM Customers WHERE CompanyName LIKE '%Bacchus%Cellars%'
    let tree = query(Expr::Project {
        input: Binding::new(
            "c",
            Expr::Filter {
                input: Binding::new("c", scan("Customers")),
                predicate: Box::new(Expr::Function {
                    function: FunctionRef::builtin("Like"),
                    args: vec![
                        prop("c", "CompanyName"),
                        Expr::Literal(Literal::String("%Bacchus%Cellars%".into())),
                    ],
                }),
            },
        ),
        columns: vec![ProjectColumn {
            name: "CompanyName".into(),
            expr: prop("c", "CompanyName"),
        }],
    });
    let sql = sql(&tree);
    assert_eq!(
        sql,
        "SELECT \"c\".\"CompanyName\"\n\
         FROM \"Customers\" AS \"c\"\n\
         WHERE \"c\".\"CompanyName\" LIKE '%Bacchus%Cellars%' ESCAPE '\\'"
    );
    assert!(!sql.contains("GROUP BY"));
    assert!(!sql.contains("ORDER BY"));
    assert!(!sql.contains("FETCH"));
}

#[test]
fn paging_skip_and_take() {
    let tree = query(Expr::Limit {
        input: Binding::new(
            "o",
            Expr::Skip {
                input: Binding::new("o", scan("Orders")),
                keys: vec![SortKey {
                    expr: prop("o", "Id"),
                    ascending: true,
                }],
                count: Box::new(int(10)),
            },
        ),
        count: Box::new(int(5)),
    });
    assert_eq!(
        sql(&tree),
        "SELECT *\n\
         FROM \"Orders\" AS \"o\"\n\
         ORDER BY \"o\".\"Id\" ASC\n\
         OFFSET 11 FETCH NEXT 5 ROWS ONLY"
    );
}

#[test]
fn paging_take_only_uses_fetch_first() {
    let tree = query(Expr::Limit {
        input: Binding::new("o", scan("Orders")),
        count: Box::new(int(3)),
    });
    let sql = sql(&tree);
    assert!(sql.ends_with("FETCH FIRST 3 ROWS ONLY"));
    assert!(!sql.contains("OFFSET"));
}

#[test]
fn paging_requires_v12() {
    let tree = query(Expr::Limit {
        input: Binding::new("o", scan("Orders")),
        count: Box::new(int(3)),
    });
    let err = translate(&tree, DialectVersion::V11_10).unwrap_err();
    assert!(matches!(err, SqlGenError::PagingNotSupported { .. }));
}

#[test]
fn nested_order_by_is_suppressed() {
    let tree = query(Expr::Distinct {
        input: Binding::new(
            "d",
            Expr::Sort {
                input: Binding::new("o", scan("Orders")),
                keys: vec![SortKey {
                    expr: prop("o", "Id"),
                    ascending: false,
                }],
            },
        ),
    });
    let sql = sql(&tree);
    assert_eq!(
        sql,
        "SELECT DISTINCT *\n\
         FROM (\n\
         \x20   SELECT *\n\
         \x20   FROM \"Orders\" AS \"o\"\n\
         ) AS \"d\""
    );
    assert!(!sql.contains("ORDER BY"));
}

#[test]
fn top_most_order_by_is_kept() {
    let tree = query(Expr::Sort {
        input: Binding::new("o", scan("Orders")),
        keys: vec![SortKey {
            expr: prop("o", "Id"),
            ascending: false,
        }],
    });
    assert!(sql(&tree).contains("ORDER BY \"o\".\"Id\" DESC"));
}

#[test]
fn cross_join_renames_colliding_sibling_aliases() {
    let tree = query(Expr::Join {
        kind: JoinKind::Cross,
        left: Binding::new("c", scan("Customers")),
        right: Binding::new("c", scan("Customers")),
        condition: None,
    });
    assert_eq!(
        sql(&tree),
        "SELECT *\nFROM \"Customers\" AS \"c\" CROSS JOIN \"Customers\" AS \"c1\""
    );
}

#[test]
fn correlated_subquery_renames_inner_alias() {
    // The inner statement references the outer extent "C" while binding its
    // own extent under the case-colliding name "c"; the inner alias must be
    // renamed so both stay addressable.
    let inner = Expr::Filter {
        input: Binding::new("c", scan("Orders")),
        predicate: Box::new(Expr::Comparison {
            op: ComparisonOp::Eq,
            left: Box::new(prop("C", "Id")),
            right: Box::new(prop("c", "CustomerId")),
        }),
    };
    let tree = query(Expr::Join {
        kind: JoinKind::Inner,
        left: Binding::new("C", scan("Customers")),
        right: Binding::new("x", inner),
        condition: Some(Box::new(Expr::Comparison {
            op: ComparisonOp::Eq,
            left: Box::new(prop("C", "Id")),
            right: Box::new(prop("x", "CustomerId")),
        })),
    });
    assert_eq!(
        sql(&tree),
        "SELECT *\n\
         FROM \"Customers\" AS \"C\" INNER JOIN (\n\
         \x20   SELECT *\n\
         \x20   FROM \"Orders\" AS \"c1\"\n\
         \x20   WHERE (\"C\".\"Id\" = \"c1\".\"CustomerId\")\n\
         ) AS \"x\" ON (\"C\".\"Id\" = \"x\".\"CustomerId\")"
    );
}

#[test]
fn group_by_with_aggregates() {
    let tree = query(Expr::GroupBy {
        input: Binding::new("o", scan("Orders")),
        keys: vec![ProjectColumn {
            name: "Country".into(),
            expr: prop("o", "Country"),
        }],
        aggregates: vec![(
            "Total".into(),
            ifxgen::command_tree::AggregateCall {
                function: ifxgen::command_tree::AggregateFunction::Count,
                distinct: false,
                arg: None,
            },
        )],
    });
    assert_eq!(
        sql(&tree),
        "SELECT \"o\".\"Country\", COUNT(*) AS \"Total\"\n\
         FROM \"Orders\" AS \"o\"\n\
         GROUP BY \"o\".\"Country\""
    );
}

#[test]
fn union_all_composes_wrapped_operands() {
    let side = |table: &str, variable: &str| Expr::Project {
        input: Binding::new(variable, scan(table)),
        columns: vec![ProjectColumn {
            name: "Name".into(),
            expr: prop(variable, "CompanyName"),
        }],
    };
    let tree = query(Expr::SetOp {
        op: SetOpKind::UnionAll,
        left: Box::new(side("Customers", "c")),
        right: Box::new(side("Suppliers", "s")),
    });
    assert_eq!(
        sql(&tree),
        "SELECT *\n\
         FROM ((\n\
         \x20   SELECT \"c\".\"CompanyName\" AS \"Name\"\n\
         \x20   FROM \"Customers\" AS \"c\"\n\
         ) UNION ALL (\n\
         \x20   SELECT \"s\".\"CompanyName\" AS \"Name\"\n\
         \x20   FROM \"Suppliers\" AS \"s\"\n\
         )) AS \"X\""
    );
}

#[test]
fn projection_over_projection_wraps_and_tracks_columns() {
    let tree = query(Expr::Project {
        input: Binding::new(
            "p",
            Expr::Project {
                input: Binding::new("c", scan("Customers")),
                columns: vec![ProjectColumn {
                    name: "n".into(),
                    expr: prop("c", "Name"),
                }],
            },
        ),
        columns: vec![ProjectColumn {
            name: "n2".into(),
            expr: Expr::Function {
                function: FunctionRef::builtin("ToUpper"),
                args: vec![prop("p", "n")],
            },
        }],
    });
    assert_eq!(
        sql(&tree),
        "SELECT UPPER(\"p\".\"n\") AS \"n2\"\n\
         FROM (\n\
         \x20   SELECT \"c\".\"Name\" AS \"n\"\n\
         \x20   FROM \"Customers\" AS \"c\"\n\
         ) AS \"p\""
    );
}

#[test]
fn duplicate_output_names_get_suffixed() {
    let tree = query(Expr::Project {
        input: Binding::new("c", scan("Customers")),
        columns: vec![
            ProjectColumn {
                name: "Id".into(),
                expr: prop("c", "Id"),
            },
            ProjectColumn {
                name: "Id".into(),
                expr: prop("c", "OtherId"),
            },
        ],
    });
    assert_eq!(
        sql(&tree),
        "SELECT \"c\".\"Id\", \"c\".\"OtherId\" AS \"Id1\"\n\
         FROM \"Customers\" AS \"c\""
    );
}

#[test]
fn scalar_root_renders_without_from() {
    let tree = query(Expr::Function {
        function: FunctionRef::builtin("CurrentDateTime"),
        args: vec![],
    });
    assert_eq!(sql(&tree), "SELECT CURRENT");
}

#[test]
fn unsupported_function_aborts_translation() {
    let tree = query(Expr::Project {
        input: Binding::new("c", scan("Customers")),
        columns: vec![ProjectColumn {
            name: "g".into(),
            expr: Expr::Function {
                function: FunctionRef::builtin("NewGuid"),
                args: vec![],
            },
        }],
    });
    match translate(&tree, DialectVersion::V12_10).unwrap_err() {
        SqlGenError::Unsupported(name) => assert_eq!(name, "NewGuid"),
        other => panic!("expected Unsupported, got {:?}", other),
    }
}

#[test]
fn bare_variable_reference_is_rejected() {
    let tree = query(Expr::Project {
        input: Binding::new("c", scan("Customers")),
        columns: vec![ProjectColumn {
            name: "row".into(),
            expr: Expr::Variable("c".into()),
        }],
    });
    assert!(matches!(
        translate(&tree, DialectVersion::V12_10).unwrap_err(),
        SqlGenError::DanglingVariableReference(_)
    ));
}

#[test]
fn boolean_comparison_function_coerces_through_case() {
    let tree = query(Expr::Project {
        input: Binding::new("o", scan("Orders")),
        columns: vec![ProjectColumn {
            name: "IsSmall".into(),
            expr: Expr::Function {
                function: FunctionRef::builtin("LessThan"),
                args: vec![prop("o", "Qty"), int(10)],
            },
        }],
    });
    assert!(sql(&tree)
        .contains("CASE WHEN (\"o\".\"Qty\" < 10) THEN 1 ELSE 0 END AS \"IsSmall\""));
}

#[test]
fn date_add_synthesizes_interval() {
    let tree = query(Expr::Project {
        input: Binding::new("o", scan("Orders")),
        columns: vec![ProjectColumn {
            name: "Due".into(),
            expr: Expr::Function {
                function: FunctionRef::builtin("AddDays"),
                args: vec![prop("o", "Placed"), int(-3)],
            },
        }],
    });
    let sql = sql(&tree);
    assert!(sql.contains("(\"o\".\"Placed\" + CAST(CASE WHEN (-3) < 0 THEN '-' ELSE '' END"));
    assert!(sql.contains("AS INTERVAL DAY(9) TO SECOND)"));
}

#[test]
fn filters_merge_into_one_where_clause() {
    let tree = query(Expr::Filter {
        input: Binding::new(
            "c",
            Expr::Filter {
                input: Binding::new("c", scan("Customers")),
                predicate: Box::new(Expr::Comparison {
                    op: ComparisonOp::Gt,
                    left: Box::new(prop("c", "Rank")),
                    right: Box::new(int(1)),
                }),
            },
        ),
        predicate: Box::new(Expr::IsNull(Box::new(prop("c", "DeletedAt")))),
    });
    assert_eq!(
        sql(&tree),
        "SELECT *\n\
         FROM \"Customers\" AS \"c\"\n\
         WHERE (\"c\".\"Rank\" > 1) AND (\"c\".\"DeletedAt\" IS NULL)"
    );
}

#[test]
fn nested_inner_joins_flatten_into_one_from_clause() {
    let inner = Expr::Join {
        kind: JoinKind::Inner,
        left: Binding::new("o", scan("Orders")),
        right: Binding::new("l", scan("Lines")),
        condition: Some(Box::new(Expr::Comparison {
            op: ComparisonOp::Eq,
            left: Box::new(prop("o", "Id")),
            right: Box::new(prop("l", "OrderId")),
        })),
    };
    // The flattened join's row is a record of records: the left side is
    // addressed through the join binding, member by member.
    let left_member = Expr::Property {
        instance: Box::new(Expr::Property {
            instance: Box::new(Expr::Variable("j".into())),
            name: "o".into(),
        }),
        name: "CustomerId".into(),
    };
    let tree = query(Expr::Join {
        kind: JoinKind::Inner,
        left: Binding::new("j", inner),
        right: Binding::new("c", scan("Customers")),
        condition: Some(Box::new(Expr::Comparison {
            op: ComparisonOp::Eq,
            left: Box::new(left_member),
            right: Box::new(prop("c", "Id")),
        })),
    });
    let sql = sql(&tree);
    // One flat FROM clause, no derived table.
    assert_eq!(
        sql,
        "SELECT *\n\
         FROM \"Orders\" AS \"o\" INNER JOIN \"Lines\" AS \"l\" \
         ON (\"o\".\"Id\" = \"l\".\"OrderId\") INNER JOIN \"Customers\" AS \"c\" \
         ON (\"o\".\"CustomerId\" = \"c\".\"Id\")"
    );
}
