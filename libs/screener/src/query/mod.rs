//! Filter expressions over snapshot rows.
//!
//! Expressions are parsed into a typed tree over the known field catalog
//! (see [`crate::fields`]); nothing is ever evaluated by a host interpreter.
//! Rows that cannot be evaluated (missing optional field, text compared with a
//! number) are left out of the result instead of failing the query.

mod expr;
mod lexer;

use std::{fmt, str::FromStr};

pub use expr::{EvalError, Expr, Operand};
pub use lexer::CmpOp;

use crate::{
    error::QueryError,
    row::{Row, Snapshot},
};

/// A parsed expression together with the text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    source: String,
    expr: Expr,
}

impl Filter {
    pub fn parse(source: &str) -> Result<Self, QueryError> {
        let source = source.trim();
        Ok(Self {
            source: source.to_string(),
            expr: Expr::parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.expr.eval(row).unwrap_or(false)
    }

    /// Matching rows in snapshot order.
    pub fn apply(&self, snapshot: &Snapshot) -> Vec<Row> {
        snapshot
            .rows
            .iter()
            .filter(|row| self.matches(row))
            .cloned()
            .collect()
    }
}

impl FromStr for Filter {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::parse(s)
    }
}

/// Parse `expression` and run it against `snapshot`.
///
/// A syntax error returns no rows at all.
pub fn query(snapshot: &Snapshot, expression: &str) -> Result<Vec<Row>, QueryError> {
    Ok(Filter::parse(expression)?.apply(snapshot))
}

/// Pre-built screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Oversold,
    Overbought,
    StrongTrend,
}

impl Signal {
    pub const ALL: [Signal; 3] = [Signal::Oversold, Signal::Overbought, Signal::StrongTrend];

    pub fn expression(&self) -> &'static str {
        match self {
            Signal::Oversold => "rsi <= 30",
            Signal::Overbought => "rsi >= 70",
            Signal::StrongTrend => "adx > 45",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Oversold => "oversold",
            Signal::Overbought => "overbought",
            Signal::StrongTrend => "strong_trend",
        }
    }

    pub fn filter(&self) -> Filter {
        // the built-in expressions are covered by tests
        Filter::parse(self.expression()).unwrap_or_else(|e| {
            unreachable!("built-in signal `{}` does not parse: {e}", self.as_str())
        })
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace([' ', '-'], "_");
        Signal::ALL
            .into_iter()
            .find(|sig| sig.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| format!("unknown signal `{s}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        interval::Interval,
        testing::{rsi_rows, snapshot_of},
    };

    fn rsi_of(rows: &[Row]) -> Vec<f64> {
        rows.iter().filter_map(|r| r.number("rsi")).collect()
    }

    #[test]
    fn keeps_snapshot_order() {
        let snap = snapshot_of(Interval::Minute15, rsi_rows(&[10.0, 35.0, 30.0, 71.0, 29.0]));

        let rows = query(&snap, "rsi <= 30").unwrap();

        assert_eq!(rsi_of(&rows), [10.0, 30.0, 29.0]);
        assert_eq!(rows[1].symbol, "SYM2");
    }

    #[test]
    fn repeated_queries_are_identical() {
        let snap = snapshot_of(Interval::Hour1, rsi_rows(&[50.0, 20.0, 80.0, 25.0]));
        let first = query(&snap, "rsi < 30 or rsi > 70").unwrap();
        let second = query(&snap, "rsi < 30 or rsi > 70").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rows_that_cannot_be_evaluated_are_excluded() {
        let mut rows = rsi_rows(&[10.0, 20.0, 30.0]);
        rows[1].values.insert("ema200".into(), 5.0);
        let snap = snapshot_of(Interval::Hour4, rows);

        let got = query(&snap, "ema200 > 1").unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].symbol, "SYM1");

        assert!(query(&snap, "symbol > 1").unwrap().is_empty());
    }

    #[test]
    fn syntax_error_returns_no_partial_result() {
        let snap = snapshot_of(Interval::Hour4, rsi_rows(&[10.0]));
        assert!(matches!(
            query(&snap, "rsi <= 30 and"),
            Err(QueryError::Expected { .. })
        ));
        assert!(matches!(
            query(&snap, "bogus <= 30"),
            Err(QueryError::UnknownField { .. })
        ));
    }

    #[test]
    fn empty_snapshot_gives_empty_result() {
        let snap = snapshot_of(Interval::Day1, vec![]);
        assert!(query(&snap, "rsi < 30").unwrap().is_empty());
    }

    #[test]
    fn signals_match_their_thresholds() {
        let mut rows = rsi_rows(&[30.0, 30.1, 69.9, 70.0]);
        rows[0].values.insert("adx".into(), 45.0);
        rows[3].values.insert("adx".into(), 45.5);
        let snap = snapshot_of(Interval::Minute5, rows);

        assert_eq!(rsi_of(&Signal::Oversold.filter().apply(&snap)), [30.0]);
        assert_eq!(rsi_of(&Signal::Overbought.filter().apply(&snap)), [70.0]);
        assert_eq!(rsi_of(&Signal::StrongTrend.filter().apply(&snap)), [70.0]);
    }

    #[test]
    fn signal_names_parse() {
        assert_eq!("strong trend".parse::<Signal>(), Ok(Signal::StrongTrend));
        assert_eq!("Oversold".parse::<Signal>(), Ok(Signal::Oversold));
        assert!("sideways".parse::<Signal>().is_err());
    }

    #[test]
    fn filter_echoes_trimmed_source() {
        let f: Filter = "  rsi < 30 ".parse().unwrap();
        assert_eq!(f.source(), "rsi < 30");
    }
}
