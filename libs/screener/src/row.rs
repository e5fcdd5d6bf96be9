use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{fields::FieldRef, interval::Interval};

/// One instrument's indicator values within a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub symbol: String,
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Number(f64),
    Text(&'a str),
}

impl Row {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn value(&self, field: FieldRef) -> Option<Value<'_>> {
        match field {
            FieldRef::Symbol => Some(Value::Text(&self.symbol)),
            FieldRef::Indicator(f) => self.number(f.name).map(Value::Number),
        }
    }
}

/// The complete table for one interval as of its last successful refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub interval: Interval,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Symbols the cycle tried to fetch, including the ones that were skipped.
    pub attempted: usize,
    pub rows: Vec<Row>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.attempted.saturating_sub(self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;

    #[test]
    fn symbol_is_a_text_value() {
        let row = Row::new("BTCUSDT").with("rsi", 42.0);
        let symbol = fields::resolve("symbol").unwrap();
        let rsi = fields::resolve("rsi").unwrap();
        let adx = fields::resolve("adx").unwrap();

        assert_eq!(row.value(symbol), Some(Value::Text("BTCUSDT")));
        assert_eq!(row.value(rsi), Some(Value::Number(42.0)));
        assert_eq!(row.value(adx), None);
    }

    #[test]
    fn skipped_counts_dropped_symbols() {
        let now = Utc::now();
        let snapshot = Snapshot {
            interval: Interval::Hour1,
            started_at: now,
            completed_at: now,
            attempted: 50,
            rows: vec![Row::new("ETHUSDT"); 49],
        };
        assert_eq!(snapshot.skipped(), 1);
        assert_eq!(snapshot.len(), 49);
    }
}
