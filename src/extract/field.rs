//! Extracted cell values and the charge/discharge indicator.

use std::fmt;

use serde_json::Value;

/// A single extracted cell.
///
/// Tuples render as `(a, b, ...)` with JSON-encoded components so that
/// [`FieldValue::parse_cell`] can read them back. Reading a cell back
/// normalizes its type: text that looks like a number, boolean or tuple comes
/// back as that variant, and surrounding whitespace is trimmed.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Missing,
    Number(f64),
    Bool(bool),
    Text(String),
    Tuple(Vec<Value>),
}

impl FieldValue {
    /// Converts a JSON scalar; nested objects and arrays become their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Missing,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(Self::Missing, Self::Number),
            Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    /// Reads back a cell written by [`fmt::Display`].
    pub fn parse_cell(cell: &str) -> Self {
        let cell = cell.trim();
        if cell.is_empty() {
            return Self::Missing;
        }
        if let Some(inner) = cell.strip_prefix('(').and_then(|c| c.strip_suffix(')')) {
            let array = format!("[{}]", inner.trim_end_matches(','));
            if let Ok(items) = serde_json::from_str::<Vec<Value>>(&array) {
                return Self::Tuple(items);
            }
        }
        match cell {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        match cell.parse::<f64>() {
            Ok(n) if n.is_finite() => Self::Number(n),
            _ => Self::Text(cell.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Numeric view used for charts and comparisons; booleans count as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Bool(b) => Some(f64::from(u8::from(*b))),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Missing | Self::Tuple(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => Ok(()),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
            Self::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn component(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Charge/discharge indicator from a `ChargeDischargeCounter` tuple.
///
/// Both leading components zero gives `0`, a first component of `1` gives
/// `+1` (charging), anything else `-1` (discharging). Returns `None` when the
/// cell is not a tuple or its first component is not numeric.
pub fn charge_discharge_sign(value: &FieldValue) -> Option<i8> {
    let FieldValue::Tuple(items) = value else {
        return None;
    };
    let first = items.first().and_then(component)?;
    let second = items.get(1).and_then(component);
    if first == 0.0 && second == Some(0.0) {
        Some(0)
    } else if first == 1.0 {
        Some(1)
    } else {
        Some(-1)
    }
}
