//! INTERVAL synthesis for date arithmetic. The dialect has no native
//! date-plus-number operators, so "add N units" is emitted as
//! `base + CAST(<sign> || <magnitude> AS INTERVAL <qualifier>)` where the
//! sign is a CASE expression over the amount and the magnitude is a
//! zero-padded field string using the qualifier's separators. "Diff"
//! operations subtract the operands, cast the resulting interval to
//! character form, and recover a signed count from that text.

use super::fragment::SqlFragment;
use super::symbols::NamingContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl IntervalUnit {
    /// Qualifier for an interval whose leading (and only populated) field is
    /// this unit, with any finer fields zeroed. Precision 9 so every
    /// representable amount fits without carry arithmetic between fields.
    fn add_qualifier(self, fractional: bool) -> &'static str {
        match self {
            IntervalUnit::Year => "YEAR(9) TO MONTH",
            IntervalUnit::Month => "MONTH(9) TO MONTH",
            IntervalUnit::Day => "DAY(9) TO SECOND",
            IntervalUnit::Hour => "HOUR(9) TO SECOND",
            IntervalUnit::Minute => "MINUTE(9) TO SECOND",
            IntervalUnit::Second => {
                if fractional {
                    "SECOND(9) TO FRACTION(5)"
                } else {
                    "SECOND(9) TO SECOND"
                }
            }
        }
    }

    /// Single-field qualifier used when decomposing a difference.
    fn single_qualifier(self, fractional: bool) -> &'static str {
        match self {
            IntervalUnit::Year => "YEAR(9) TO YEAR",
            IntervalUnit::Month => "MONTH(9) TO MONTH",
            IntervalUnit::Day => "DAY(9) TO DAY",
            IntervalUnit::Hour => "HOUR(9) TO HOUR",
            IntervalUnit::Minute => "MINUTE(9) TO MINUTE",
            IntervalUnit::Second => {
                if fractional {
                    "SECOND(9) TO FRACTION(5)"
                } else {
                    "SECOND(9) TO SECOND"
                }
            }
        }
    }

    /// Zeroed trailing fields, with the separators the interval literal
    /// syntax requires: space/colon for day-to-second, dash for
    /// year-to-month.
    fn zero_tail(self) -> &'static str {
        match self {
            IntervalUnit::Year => "-00",
            IntervalUnit::Month => "",
            IntervalUnit::Day => " 00:00:00",
            IntervalUnit::Hour => ":00:00",
            IntervalUnit::Minute => ":00",
            IntervalUnit::Second => "",
        }
    }
}

/// A synthesized interval: sign expression concatenated with a zero-padded
/// magnitude, cast to the qualifier's interval type.
#[derive(Clone)]
pub struct IntervalExpr {
    pub sign: Box<SqlFragment>,
    pub magnitude: Box<SqlFragment>,
    pub qualifier: &'static str,
}

impl IntervalExpr {
    pub fn write_sql(&self, w: &mut super::fragment::SqlWriter, naming: &mut NamingContext) {
        w.write("CAST(");
        self.sign.write_sql(w, naming);
        w.write(" || ");
        self.magnitude.write_sql(w, naming);
        w.write(" AS INTERVAL ");
        w.write(self.qualifier);
        w.write(")");
    }
}

/// `base + interval(amount)` for the given unit. Sub-second units pass a
/// divisor that normalizes the amount to decimal seconds before the interval
/// text is built.
pub fn date_add_fragment(
    base: SqlFragment,
    amount: SqlFragment,
    unit: IntervalUnit,
    divisor: i64,
) -> SqlFragment {
    let fractional = divisor != 1;
    let value = if fractional {
        SqlFragment::seq(vec![
            SqlFragment::lit("(("),
            amount,
            SqlFragment::lit(format!(") / {})", divisor)),
        ])
    } else {
        SqlFragment::seq(vec![SqlFragment::lit("("), amount, SqlFragment::lit(")")])
    };

    let sign = SqlFragment::seq(vec![
        SqlFragment::lit("CASE WHEN "),
        value.clone(),
        SqlFragment::lit(" < 0 THEN '-' ELSE '' END"),
    ]);
    let mut magnitude_parts = vec![
        SqlFragment::lit("LPAD(ABS("),
        value,
        SqlFragment::lit("), 9, '0')"),
    ];
    let tail = unit.zero_tail();
    if !tail.is_empty() {
        magnitude_parts.push(SqlFragment::lit(format!(" || '{}'", tail)));
    }

    SqlFragment::seq(vec![
        SqlFragment::lit("("),
        base,
        SqlFragment::lit(" + "),
        SqlFragment::Interval(IntervalExpr {
            sign: Box::new(sign),
            magnitude: Box::new(SqlFragment::seq(magnitude_parts)),
            qualifier: unit.add_qualifier(fractional),
        }),
        SqlFragment::lit(")"),
    ])
}

/// Signed `end - start` count in the given unit. The sign is recovered from
/// the first character of the rendered interval text and the magnitude from
/// a CHAR -> DECIMAL cast of the same text; sub-second units scale the
/// decimal-seconds result back up and truncate to a whole count.
pub fn date_diff_fragment(
    start: SqlFragment,
    end: SqlFragment,
    unit: IntervalUnit,
    scale: i64,
) -> SqlFragment {
    let fractional = scale != 1;
    let qualifier = unit.single_qualifier(fractional);

    let rendered = SqlFragment::seq(vec![
        SqlFragment::lit("TRIM(CAST(CAST((("),
        end,
        SqlFragment::lit(") - ("),
        start,
        SqlFragment::lit(format!(")) AS INTERVAL {}) AS CHAR(25)))", qualifier)),
    ]);

    let sign = SqlFragment::seq(vec![
        SqlFragment::lit("CASE WHEN SUBSTR("),
        rendered.clone(),
        SqlFragment::lit(", 1, 1) = '-' THEN -1 ELSE 1 END"),
    ]);
    let magnitude = SqlFragment::seq(vec![
        SqlFragment::lit("CAST(TRIM(LEADING '-' FROM "),
        rendered,
        SqlFragment::lit(") AS DECIMAL(18,5))"),
    ]);

    let product = SqlFragment::seq(vec![
        SqlFragment::lit("("),
        sign,
        SqlFragment::lit(" * "),
        magnitude,
        SqlFragment::lit(")"),
    ]);
    if fractional {
        SqlFragment::seq(vec![
            SqlFragment::lit("TRUNC("),
            product,
            SqlFragment::lit(format!(" * {}, 0)", scale)),
        ])
    } else {
        product
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql_generator::fragment::SqlWriter;

    fn render(fragment: &SqlFragment) -> String {
        let mut w = SqlWriter::new();
        let mut naming = NamingContext::new();
        fragment.write_sql(&mut w, &mut naming);
        w.into_string()
    }

    #[test]
    fn test_add_days_shape() {
        let sql = render(&date_add_fragment(
            SqlFragment::lit("d"),
            SqlFragment::lit("-3"),
            IntervalUnit::Day,
            1,
        ));
        assert_eq!(
            sql,
            "(d + CAST(CASE WHEN (-3) < 0 THEN '-' ELSE '' END || \
             LPAD(ABS((-3)), 9, '0') || ' 00:00:00' AS INTERVAL DAY(9) TO SECOND))"
        );
    }

    #[test]
    fn test_add_zero_takes_non_negative_branch() {
        let sql = render(&date_add_fragment(
            SqlFragment::lit("d"),
            SqlFragment::lit("0"),
            IntervalUnit::Day,
            1,
        ));
        // The CASE guard is strict less-than: zero lands in the '' branch.
        assert!(sql.contains("CASE WHEN (0) < 0 THEN '-' ELSE '' END"));
    }

    #[test]
    fn test_add_months_uses_year_month_syntax() {
        let sql = render(&date_add_fragment(
            SqlFragment::lit("d"),
            SqlFragment::lit("2"),
            IntervalUnit::Year,
            1,
        ));
        assert!(sql.contains("|| '-00'"));
        assert!(sql.contains("INTERVAL YEAR(9) TO MONTH"));
    }

    #[test]
    fn test_sub_second_add_normalizes_via_divisor() {
        let sql = render(&date_add_fragment(
            SqlFragment::lit("d"),
            SqlFragment::lit("1500"),
            IntervalUnit::Second,
            1_000,
        ));
        assert!(sql.contains("((1500) / 1000)"));
        assert!(sql.contains("INTERVAL SECOND(9) TO FRACTION(5)"));
    }

    #[test]
    fn test_diff_days_sign_from_rendered_text() {
        let sql = render(&date_diff_fragment(
            SqlFragment::lit("a"),
            SqlFragment::lit("b"),
            IntervalUnit::Day,
            1,
        ));
        assert!(sql.contains("CASE WHEN SUBSTR("));
        assert!(sql.contains(", 1, 1) = '-' THEN -1 ELSE 1 END"));
        assert!(sql.contains("AS INTERVAL DAY(9) TO DAY"));
        assert!(sql.contains("TRIM(LEADING '-' FROM"));
    }

    #[test]
    fn test_diff_milliseconds_scales_and_truncates() {
        let sql = render(&date_diff_fragment(
            SqlFragment::lit("a"),
            SqlFragment::lit("b"),
            IntervalUnit::Second,
            1_000,
        ));
        assert!(sql.starts_with("TRUNC("));
        assert!(sql.ends_with(" * 1000, 0)"));
        assert!(sql.contains("SECOND(9) TO FRACTION(5)"));
    }
}
