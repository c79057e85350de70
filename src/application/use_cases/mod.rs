pub mod csv_ingestion;
