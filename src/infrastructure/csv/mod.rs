// ============================================================
// CSV INFRASTRUCTURE LAYER
// ============================================================
// CSV parsing, encoding detection, and schema inference

mod csv_parser;
mod type_inference;

pub use csv_parser::{CsvParser, RawCsv};
pub use type_inference::{build_table, infer_column_types};
