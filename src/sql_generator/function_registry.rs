//! Abstract-function to dialect-SQL translation table.
//!
//! Maps canonical function names from the command-tree model to emission
//! strategies. Some are plain renames, some reassemble arguments, and some
//! synthesize operations the dialect has no native form for (boolean-valued
//! comparisons, date arithmetic, LIKE patterns). The table is built once per
//! process and read-only afterwards; handlers carry only the small
//! configuration fixed at registration time.

use std::collections::HashMap;

use crate::command_tree::{Expr, FunctionRef, Literal};

use super::errors::SqlGenError;
use super::fragment::{quote_identifier, string_literal, SqlFragment};
use super::interval::{date_add_fragment, date_diff_fragment, IntervalUnit};
use super::patterns::{add_wildcards, escape_clause, escape_like_pattern};
use super::visitor::SqlGenerator;

/// Emission strategy for one canonical function.
#[derive(Debug, Clone)]
enum Handler {
    /// Fixed token, unchanged argument list.
    Rename { token: &'static str, arity: usize },
    /// Bare dialect token, no parameter list.
    NiladicToken(&'static str),
    /// Operator synthesis: `(arg0 OP arg1)`, or `(OP arg0)` when unary.
    Operator { token: &'static str, arity: usize },
    /// Boolean coercion: `CASE WHEN (arg0 OP arg1) THEN 1 ELSE 0 END`.
    /// The dialect has no boolean scalar type.
    CompareOp(&'static str),
    /// Contains/StartsWith/EndsWith/Like. Constant patterns are escaped and
    /// wildcarded; non-constant patterns fall back to LOCATE/RIGHT forms.
    PatternMatch {
        leading: bool,
        trailing: bool,
        auto_escape: bool,
    },
    /// `SUBSTR(str, start, length)` reassembly.
    Substring,
    /// ROUND/TRUNC with the digits argument defaulted to 0.
    RoundFamily(&'static str),
    /// Datetime field truncation via `EXTEND(arg, <qualifier>)`.
    Extend(&'static str),
    /// Date arithmetic through interval synthesis.
    DateAdd { unit: IntervalUnit, divisor: i64 },
    DateDiff { unit: IntervalUnit, scale: i64 },
    /// No valid translation exists; fails with the function's name.
    Unsupported,
}

lazy_static::lazy_static! {
    static ref HANDLERS: HashMap<&'static str, Handler> = {
        let mut m = HashMap::new();

        // ===== STRING FUNCTIONS =====
        m.insert("Concat", Handler::Operator { token: "||", arity: 2 });
        m.insert("Contains", Handler::PatternMatch { leading: true, trailing: true, auto_escape: true });
        m.insert("StartsWith", Handler::PatternMatch { leading: false, trailing: true, auto_escape: true });
        m.insert("EndsWith", Handler::PatternMatch { leading: true, trailing: false, auto_escape: true });
        // Like takes a caller-authored pattern as-is; no auto-escaping.
        m.insert("Like", Handler::PatternMatch { leading: false, trailing: false, auto_escape: false });
        m.insert("IndexOf", Handler::Rename { token: "LOCATE", arity: 2 });
        m.insert("Left", Handler::Rename { token: "LEFT", arity: 2 });
        m.insert("Right", Handler::Rename { token: "RIGHT", arity: 2 });
        m.insert("Length", Handler::Rename { token: "LENGTH", arity: 1 });
        m.insert("LTrim", Handler::Rename { token: "LTRIM", arity: 1 });
        m.insert("RTrim", Handler::Rename { token: "RTRIM", arity: 1 });
        m.insert("Trim", Handler::Rename { token: "TRIM", arity: 1 });
        m.insert("Replace", Handler::Rename { token: "REPLACE", arity: 3 });
        m.insert("Reverse", Handler::Unsupported);
        m.insert("Substring", Handler::Substring);
        m.insert("ToLower", Handler::Rename { token: "LOWER", arity: 1 });
        m.insert("ToUpper", Handler::Rename { token: "UPPER", arity: 1 });

        // ===== MATH FUNCTIONS =====
        m.insert("Abs", Handler::Rename { token: "ABS", arity: 1 });
        m.insert("Ceiling", Handler::Rename { token: "CEIL", arity: 1 });
        m.insert("Floor", Handler::Rename { token: "FLOOR", arity: 1 });
        m.insert("Round", Handler::RoundFamily("ROUND"));
        m.insert("Truncate", Handler::RoundFamily("TRUNC"));
        m.insert("Power", Handler::Rename { token: "POW", arity: 2 });

        // ===== BITWISE FUNCTIONS =====
        m.insert("BitwiseAnd", Handler::Rename { token: "BITAND", arity: 2 });
        m.insert("BitwiseOr", Handler::Rename { token: "BITOR", arity: 2 });
        m.insert("BitwiseXor", Handler::Rename { token: "BITXOR", arity: 2 });
        m.insert("BitwiseNot", Handler::Rename { token: "BITNOT", arity: 1 });

        // ===== BOOLEAN-VALUED COMPARISONS =====
        m.insert("Equals", Handler::CompareOp("="));
        m.insert("NotEquals", Handler::CompareOp("<>"));
        m.insert("LessThan", Handler::CompareOp("<"));
        m.insert("LessThanOrEqual", Handler::CompareOp("<="));
        m.insert("GreaterThan", Handler::CompareOp(">"));
        m.insert("GreaterThanOrEqual", Handler::CompareOp(">="));

        // ===== DATETIME FUNCTIONS =====
        m.insert("Year", Handler::Rename { token: "YEAR", arity: 1 });
        m.insert("Month", Handler::Rename { token: "MONTH", arity: 1 });
        m.insert("Day", Handler::Rename { token: "DAY", arity: 1 });
        m.insert("Hour", Handler::Rename { token: "HOUR", arity: 1 });
        m.insert("Minute", Handler::Rename { token: "MINUTE", arity: 1 });
        m.insert("Second", Handler::Rename { token: "SECOND", arity: 1 });
        // No primitive recovers sub-second fields from a datetime value.
        m.insert("Millisecond", Handler::Unsupported);
        m.insert("TruncateTime", Handler::Extend("YEAR TO DAY"));
        m.insert("CurrentDateTime", Handler::NiladicToken("CURRENT"));
        m.insert("CurrentUtcDateTime", Handler::Unsupported);
        m.insert("GetTotalOffsetMinutes", Handler::Unsupported);
        m.insert("NewGuid", Handler::Unsupported);

        // ===== DATE ARITHMETIC =====
        m.insert("AddYears", Handler::DateAdd { unit: IntervalUnit::Year, divisor: 1 });
        m.insert("AddMonths", Handler::DateAdd { unit: IntervalUnit::Month, divisor: 1 });
        m.insert("AddDays", Handler::DateAdd { unit: IntervalUnit::Day, divisor: 1 });
        m.insert("AddHours", Handler::DateAdd { unit: IntervalUnit::Hour, divisor: 1 });
        m.insert("AddMinutes", Handler::DateAdd { unit: IntervalUnit::Minute, divisor: 1 });
        m.insert("AddSeconds", Handler::DateAdd { unit: IntervalUnit::Second, divisor: 1 });
        m.insert("AddMilliseconds", Handler::DateAdd { unit: IntervalUnit::Second, divisor: 1_000 });
        m.insert("AddMicroseconds", Handler::DateAdd { unit: IntervalUnit::Second, divisor: 1_000_000 });
        m.insert("AddNanoseconds", Handler::DateAdd { unit: IntervalUnit::Second, divisor: 1_000_000_000 });

        m.insert("DiffYears", Handler::DateDiff { unit: IntervalUnit::Year, scale: 1 });
        m.insert("DiffMonths", Handler::DateDiff { unit: IntervalUnit::Month, scale: 1 });
        m.insert("DiffDays", Handler::DateDiff { unit: IntervalUnit::Day, scale: 1 });
        m.insert("DiffHours", Handler::DateDiff { unit: IntervalUnit::Hour, scale: 1 });
        m.insert("DiffMinutes", Handler::DateDiff { unit: IntervalUnit::Minute, scale: 1 });
        m.insert("DiffSeconds", Handler::DateDiff { unit: IntervalUnit::Second, scale: 1 });
        m.insert("DiffMilliseconds", Handler::DateDiff { unit: IntervalUnit::Second, scale: 1_000 });
        m.insert("DiffMicroseconds", Handler::DateDiff { unit: IntervalUnit::Second, scale: 1_000_000 });
        m.insert("DiffNanoseconds", Handler::DateDiff { unit: IntervalUnit::Second, scale: 1_000_000_000 });

        m
    };
}

/// Translate one function application. Builtins dispatch through the handler
/// table; anything unlisted (and every non-builtin store function) goes
/// through the default call-shaped emission.
pub fn translate_function(
    gen: &mut SqlGenerator,
    function: &FunctionRef,
    args: &[Expr],
) -> Result<SqlFragment, SqlGenError> {
    if function.builtin {
        if let Some(handler) = HANDLERS.get(function.name.as_str()) {
            return apply_handler(gen, handler, function, args);
        }
        log::warn!(
            "builtin function '{}' has no registered handler, emitting a direct call",
            function.name
        );
    }
    default_function_sql(gen, function, args)
}

fn expect_args(
    function: &FunctionRef,
    args: &[Expr],
    min: usize,
    max: usize,
) -> Result<(), SqlGenError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{}..{}", min, max)
        };
        return Err(SqlGenError::ArgumentCount {
            function: function.name.clone(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

fn apply_handler(
    gen: &mut SqlGenerator,
    handler: &Handler,
    function: &FunctionRef,
    args: &[Expr],
) -> Result<SqlFragment, SqlGenError> {
    match handler {
        Handler::Rename { token, arity } => {
            expect_args(function, args, *arity, *arity)?;
            let mut parts = vec![SqlFragment::lit(format!("{}(", token))];
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    parts.push(SqlFragment::lit(", "));
                }
                parts.push(gen.visit_function_arg(arg)?);
            }
            parts.push(SqlFragment::lit(")"));
            Ok(SqlFragment::seq(parts))
        }
        Handler::NiladicToken(token) => {
            if !args.is_empty() {
                return Err(SqlGenError::NiladicWithArguments(function.name.clone()));
            }
            Ok(SqlFragment::lit(*token))
        }
        Handler::Operator { token, arity } => {
            expect_args(function, args, *arity, *arity)?;
            if *arity == 1 {
                let operand = gen.visit_function_arg(&args[0])?;
                return Ok(SqlFragment::seq(vec![
                    SqlFragment::lit(format!("({} ", token)),
                    operand,
                    SqlFragment::lit(")"),
                ]));
            }
            let left = gen.visit_function_arg(&args[0])?;
            let right = gen.visit_function_arg(&args[1])?;
            Ok(SqlFragment::seq(vec![
                SqlFragment::lit("("),
                left,
                SqlFragment::lit(format!(" {} ", token)),
                right,
                SqlFragment::lit(")"),
            ]))
        }
        Handler::CompareOp(token) => {
            expect_args(function, args, 2, 2)?;
            let left = gen.visit_function_arg(&args[0])?;
            let right = gen.visit_function_arg(&args[1])?;
            Ok(SqlFragment::seq(vec![
                SqlFragment::lit("CASE WHEN ("),
                left,
                SqlFragment::lit(format!(" {} ", token)),
                right,
                SqlFragment::lit(") THEN 1 ELSE 0 END"),
            ]))
        }
        Handler::PatternMatch {
            leading,
            trailing,
            auto_escape,
        } => pattern_match(gen, function, args, *leading, *trailing, *auto_escape),
        Handler::Substring => {
            expect_args(function, args, 3, 3)?;
            let value = gen.visit_function_arg(&args[0])?;
            let start = gen.visit_function_arg(&args[1])?;
            let length = gen.visit_function_arg(&args[2])?;
            Ok(SqlFragment::seq(vec![
                SqlFragment::lit("SUBSTR("),
                value,
                SqlFragment::lit(", "),
                start,
                SqlFragment::lit(", "),
                length,
                SqlFragment::lit(")"),
            ]))
        }
        Handler::RoundFamily(token) => {
            expect_args(function, args, 1, 2)?;
            let value = gen.visit_function_arg(&args[0])?;
            let digits = match args.get(1) {
                Some(arg) => gen.visit_function_arg(arg)?,
                None => SqlFragment::lit("0"),
            };
            Ok(SqlFragment::seq(vec![
                SqlFragment::lit(format!("{}(", token)),
                value,
                SqlFragment::lit(", "),
                digits,
                SqlFragment::lit(")"),
            ]))
        }
        Handler::Extend(qualifier) => {
            expect_args(function, args, 1, 1)?;
            let value = gen.visit_function_arg(&args[0])?;
            Ok(SqlFragment::seq(vec![
                SqlFragment::lit("EXTEND("),
                value,
                SqlFragment::lit(format!(", {})", qualifier)),
            ]))
        }
        Handler::DateAdd { unit, divisor } => {
            expect_args(function, args, 2, 2)?;
            let base = gen.visit_function_arg(&args[0])?;
            let amount = gen.visit_function_arg(&args[1])?;
            Ok(date_add_fragment(base, amount, *unit, *divisor))
        }
        Handler::DateDiff { unit, scale } => {
            expect_args(function, args, 2, 2)?;
            let start = gen.visit_function_arg(&args[0])?;
            let end = gen.visit_function_arg(&args[1])?;
            Ok(date_diff_fragment(start, end, *unit, *scale))
        }
        Handler::Unsupported => Err(SqlGenError::Unsupported(function.name.clone())),
    }
}

/// The LIKE family. Constant patterns render as a native LIKE with an
/// explicit ESCAPE clause; non-constant patterns cannot be escaped, so they
/// fall back to LOCATE/RIGHT equivalents. The optional trailing boolean
/// argument requests a case-insensitive match, which lowercases both
/// operands.
fn pattern_match(
    gen: &mut SqlGenerator,
    function: &FunctionRef,
    args: &[Expr],
    leading: bool,
    trailing: bool,
    auto_escape: bool,
) -> Result<SqlFragment, SqlGenError> {
    expect_args(function, args, 2, 3)?;
    let ignore_case = match args.get(2) {
        None => false,
        Some(Expr::Literal(Literal::Bool(flag))) => *flag,
        Some(_) => {
            return Err(SqlGenError::MalformedTree(format!(
                "the ignore-case argument of '{}' must be a boolean constant",
                function.name
            )))
        }
    };

    let input = gen.visit_function_arg(&args[0])?;
    let input = if ignore_case {
        SqlFragment::seq(vec![
            SqlFragment::lit("LOWER("),
            input,
            SqlFragment::lit(")"),
        ])
    } else {
        input
    };

    if let Expr::Literal(Literal::String(pattern)) = &args[1] {
        // Compile-time-constant pattern: escape, wildcard, inline.
        let escaped = if auto_escape {
            escape_like_pattern(pattern)
        } else {
            pattern.clone()
        };
        let pattern = add_wildcards(escaped, leading, trailing);
        let pattern = if ignore_case {
            pattern.to_lowercase()
        } else {
            pattern
        };
        return Ok(SqlFragment::seq(vec![
            input,
            SqlFragment::lit(" LIKE "),
            SqlFragment::lit(string_literal(&pattern)),
            SqlFragment::lit(format!(" {}", escape_clause())),
        ]));
    }

    let pattern = gen.visit_function_arg(&args[1])?;
    let pattern = if ignore_case {
        SqlFragment::seq(vec![
            SqlFragment::lit("LOWER("),
            pattern,
            SqlFragment::lit(")"),
        ])
    } else {
        pattern
    };
    match (leading, trailing) {
        // Contains: any position.
        (true, true) => Ok(SqlFragment::seq(vec![
            SqlFragment::lit("(LOCATE("),
            pattern,
            SqlFragment::lit(", "),
            input,
            SqlFragment::lit(") > 0)"),
        ])),
        // StartsWith: position one.
        (false, true) => Ok(SqlFragment::seq(vec![
            SqlFragment::lit("(LOCATE("),
            pattern,
            SqlFragment::lit(", "),
            input,
            SqlFragment::lit(") = 1)"),
        ])),
        // EndsWith: compare the right-hand slice.
        (true, false) => Ok(SqlFragment::seq(vec![
            SqlFragment::lit("(RIGHT("),
            input,
            SqlFragment::lit(", LENGTH("),
            pattern.clone(),
            SqlFragment::lit(")) = "),
            pattern,
            SqlFragment::lit(")"),
        ])),
        // Like with a runtime pattern: trust the caller's pattern text.
        (false, false) => Ok(SqlFragment::seq(vec![
            input,
            SqlFragment::lit(" LIKE "),
            pattern,
            SqlFragment::lit(format!(" {}", escape_clause())),
        ])),
    }
}

/// Default emission for functions with no dedicated handler: niladic check,
/// then `name(arg, ...)` - quoted and schema-qualified for non-builtin store
/// functions.
fn default_function_sql(
    gen: &mut SqlGenerator,
    function: &FunctionRef,
    args: &[Expr],
) -> Result<SqlFragment, SqlGenError> {
    if function.niladic {
        if !args.is_empty() {
            return Err(SqlGenError::NiladicWithArguments(function.name.clone()));
        }
        return Ok(SqlFragment::lit(function.store_function_name()));
    }

    let name = if function.builtin {
        function.store_function_name().to_string()
    } else {
        match &function.schema {
            Some(schema) => format!(
                "{}.{}",
                quote_identifier(schema),
                quote_identifier(function.store_function_name())
            ),
            None => quote_identifier(function.store_function_name()),
        }
    };

    let mut parts = vec![SqlFragment::lit(format!("{}(", name))];
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            parts.push(SqlFragment::lit(", "));
        }
        parts.push(gen.visit_function_arg(arg)?);
    }
    parts.push(SqlFragment::lit(")"));
    Ok(SqlFragment::seq(parts))
}
