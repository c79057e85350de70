pub mod use_cases;

pub use use_cases::csv_ingestion::{CsvIngestionUseCase, IngestionReport};
