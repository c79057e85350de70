// ============================================================
// TABULAR REPRESENTATION
// ============================================================
// Typed, column-oriented data produced from a CSV file

use chrono::NaiveDate;
use std::collections::HashMap;

use super::error::{AppError, Result};

/// Semantic type of a column; the closed set the loader understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
}

impl ColumnType {
    /// Whether values inferred as `self` can be stored in a column declared as `target`
    pub fn fits_into(&self, target: ColumnType) -> bool {
        match (self, target) {
            (a, b) if *a == b => true,
            (_, ColumnType::Text) => true,
            (ColumnType::Integer, ColumnType::Float) => true,
            (ColumnType::Boolean, ColumnType::Integer) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Text => write!(f, "text"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Float => write!(f, "float"),
            ColumnType::Boolean => write!(f, "boolean"),
            ColumnType::Date => write!(f, "date"),
        }
    }
}

/// A single typed cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert to a value of `target`. Callers check `ColumnType::fits_into` first;
    /// combinations outside that relation fall back to text.
    pub fn coerce_to(&self, target: ColumnType) -> Value {
        match (self, target) {
            (Value::Null, _) => Value::Null,
            (Value::Integer(n), ColumnType::Float) => Value::Float(*n as f64),
            (Value::Boolean(b), ColumnType::Integer) => Value::Integer(i64::from(*b)),
            (Value::Text(_), ColumnType::Text)
            | (Value::Integer(_), ColumnType::Integer)
            | (Value::Float(_), ColumnType::Float)
            | (Value::Boolean(_), ColumnType::Boolean)
            | (Value::Date(_), ColumnType::Date) => self.clone(),
            (other, _) => Value::Text(other.render()),
        }
    }

    /// Textual form used when a value lands in a text column
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            Value::Integer(n) => n.to_string(),
            Value::Float(x) => x.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// A named, homogeneously typed column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            column_type,
            values,
        }
    }

    /// True when the column carries no data at all
    pub fn is_all_null(&self) -> bool {
        self.values.iter().all(Value::is_null)
    }
}

/// Ordered columns of equal length
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Build a table, rejecting duplicate names and ragged columns.
    ///
    /// Names are compared case-insensitively: SQLite and MySQL treat `id` and
    /// `ID` as the same column.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut seen: HashMap<String, &str> = HashMap::new();
        for column in &columns {
            if let Some(first) = seen.insert(column.name.to_lowercase(), &column.name) {
                return Err(AppError::ParseError(format!(
                    "Duplicate column name '{}' (clashes with '{}')",
                    column.name, first
                )));
            }
        }

        let row_count = columns.first().map(|c| c.values.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.values.len() != row_count) {
            return Err(AppError::ParseError(format!(
                "Column '{}' has {} values, expected {}",
                bad.name,
                bad.values.len(),
                row_count
            )));
        }

        Ok(Self { columns, row_count })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }
}
