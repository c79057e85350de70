// ============================================================
// SCHEMA INFERENCE
// ============================================================
// Fix one semantic type per column, then coerce every cell to it

use chrono::NaiveDate;
use tracing::debug;

use super::csv_parser::RawCsv;
use crate::domain::error::Result;
use crate::domain::table::{Column, ColumnType, Table, Value};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Cell spellings read as a missing value, the markers spreadsheet and
/// dataframe exports write for NULL. Matched case-sensitively.
const MISSING_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_missing(value: &str) -> bool {
    value.is_empty() || MISSING_MARKERS.contains(&value)
}

/// Per-column match counters over non-empty cells
#[derive(Debug, Clone, Default)]
struct TypeCandidate {
    non_empty: usize,
    integer_matches: usize,
    float_matches: usize,
    boolean_matches: usize,
    date_matches: usize,
}

impl TypeCandidate {
    fn update(&mut self, value: &str) {
        if is_missing(value) {
            return;
        }
        self.non_empty += 1;

        if value.parse::<i64>().is_ok() {
            self.integer_matches += 1;
            self.float_matches += 1;
        } else if parse_float(value).is_some() {
            self.float_matches += 1;
        } else if parse_bool(value).is_some() {
            self.boolean_matches += 1;
        } else if NaiveDate::parse_from_str(value, DATE_FORMAT).is_ok() {
            self.date_matches += 1;
        }
    }

    fn decide(&self) -> ColumnType {
        if self.non_empty == 0 {
            ColumnType::Text
        } else if self.integer_matches == self.non_empty {
            ColumnType::Integer
        } else if self.float_matches == self.non_empty {
            ColumnType::Float
        } else if self.boolean_matches == self.non_empty {
            ColumnType::Boolean
        } else if self.date_matches == self.non_empty {
            ColumnType::Date
        } else {
            ColumnType::Text
        }
    }
}

/// Finite floats only; "inf"/"NaN" stay text
fn parse_float(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|x| x.is_finite())
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Convert a raw cell into a value of `column_type`. Only called after
/// `TypeCandidate::decide` picked a type every non-empty cell satisfies.
fn coerce_cell(raw: &str, column_type: ColumnType) -> Value {
    if is_missing(raw) {
        return Value::Null;
    }
    let parsed = match column_type {
        ColumnType::Integer => raw.parse::<i64>().ok().map(Value::Integer),
        ColumnType::Float => parse_float(raw).map(Value::Float),
        ColumnType::Boolean => parse_bool(raw).map(Value::Boolean),
        ColumnType::Date => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .ok()
            .map(Value::Date),
        ColumnType::Text => None,
    };
    parsed.unwrap_or_else(|| Value::Text(raw.to_string()))
}

/// Infer the column types of a parsed CSV
pub fn infer_column_types(csv: &RawCsv) -> Vec<ColumnType> {
    let mut candidates = vec![TypeCandidate::default(); csv.headers.len()];
    for record in &csv.records {
        for (candidate, value) in candidates.iter_mut().zip(record) {
            candidate.update(value);
        }
    }
    candidates.iter().map(TypeCandidate::decide).collect()
}

/// Build the typed table for a parsed CSV
pub fn build_table(csv: RawCsv) -> Result<Table> {
    let types = infer_column_types(&csv);
    let mut values: Vec<Vec<Value>> = (0..csv.headers.len())
        .map(|_| Vec::with_capacity(csv.records.len()))
        .collect();

    for record in &csv.records {
        for (idx, raw) in record.iter().enumerate() {
            values[idx].push(coerce_cell(raw, types[idx]));
        }
    }

    let columns: Vec<Column> = csv
        .headers
        .into_iter()
        .zip(types)
        .zip(values)
        .map(|((name, column_type), values)| Column::new(name, column_type, values))
        .collect();

    for column in &columns {
        debug!(column = %column.name, column_type = %column.column_type, "Inferred column type");
    }

    Table::new(columns)
}
