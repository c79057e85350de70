use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::domain::error::{AppError, Result};
use crate::domain::load_config::{DbConfig, LoadConfig};
use crate::domain::table::Table;
use crate::infrastructure::csv::{build_table, CsvParser};
use crate::infrastructure::db::{DbConnection, DbConnectionManager, TableWriter, WriteSummary};

/// Result of a run over one file or a whole directory
#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub loaded: Vec<WriteSummary>,
    pub elapsed: Duration,
}

impl IngestionReport {
    pub fn total_rows(&self) -> usize {
        self.loaded.iter().map(|s| s.rows_inserted).sum()
    }
}

/// Reads CSV sources and loads each into its table over one connection
pub struct CsvIngestionUseCase {
    connections: DbConnectionManager,
    writer: TableWriter,
    load: LoadConfig,
}

impl CsvIngestionUseCase {
    pub fn new(db: DbConfig, load: LoadConfig) -> Self {
        Self {
            connections: DbConnectionManager::new(db),
            writer: TableWriter::new(load.batch_size),
            load,
        }
    }

    /// Load the configured source, a single CSV file or every `*.csv` in a directory
    pub async fn run(&self) -> Result<IngestionReport> {
        let start = Instant::now();
        let source = self.load.source.as_path();

        if !source.exists() {
            error!(source = %source.display(), "Data source not found");
            return Err(AppError::FileNotFound(source.display().to_string()));
        }

        let loaded = if source.is_dir() {
            self.load_directory(source).await?
        } else {
            vec![self.load_file(source).await?]
        };

        let report = IngestionReport {
            loaded,
            elapsed: start.elapsed(),
        };
        info!(
            files = report.loaded.len(),
            rows = report.total_rows(),
            elapsed_secs = report.elapsed.as_secs_f64(),
            "Ingestion complete"
        );
        Ok(report)
    }

    /// Single file: the table is fully read and typed before connecting
    async fn load_file(&self, path: &Path) -> Result<WriteSummary> {
        let table_name = match &self.load.table_name {
            Some(name) => name.trim().to_string(),
            None => table_name_for(path)?,
        };
        info!(file = %path.display(), table = %table_name, "Processing file");

        let table = self.read_table(path)?;

        let mut conn = self.connections.connect().await?;
        let result = self.write(&mut conn, &table, &table_name).await;
        self.connections.close(conn).await;
        result
    }

    /// Directory: one connection for all files; a failing file does not stop the rest
    async fn load_directory(&self, dir: &Path) -> Result<Vec<WriteSummary>> {
        let files = list_csv_files(dir)?;
        if files.is_empty() {
            warn!(dir = %dir.display(), "No CSV files found");
            return Ok(Vec::new());
        }
        if self.load.table_name.is_some() {
            warn!("table_name is ignored when source is a directory; using file names");
        }

        let mut conn = self.connections.connect().await?;
        let mut loaded = Vec::new();
        let mut failures: Vec<(PathBuf, AppError)> = Vec::new();

        for file in &files {
            match self.load_into(&mut conn, file).await {
                Ok(summary) => loaded.push(summary),
                Err(err) => {
                    error!(file = %file.display(), error = %err, "Error processing file");
                    let fatal = matches!(err, AppError::ConnectionError(_));
                    failures.push((file.clone(), err));
                    if fatal {
                        break;
                    }
                }
            }
        }

        self.connections.close(conn).await;

        if failures.is_empty() {
            return Ok(loaded);
        }

        let names = failures
            .iter()
            .map(|(path, _)| path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let failed = failures.len();
        let (first_path, first_err) = failures.swap_remove(0);
        Err(first_err.context(&format!(
            "{} of {} files failed ({}); first failure {}",
            failed,
            files.len(),
            names,
            first_path.display()
        )))
    }

    async fn load_into(&self, conn: &mut DbConnection, path: &Path) -> Result<WriteSummary> {
        let table_name = table_name_for(path)?;
        info!(file = %path.display(), table = %table_name, "Processing file");
        let table = self.read_table(path)?;
        self.write(conn, &table, &table_name).await
    }

    async fn write(
        &self,
        conn: &mut DbConnection,
        table: &Table,
        table_name: &str,
    ) -> Result<WriteSummary> {
        let summary = self
            .writer
            .write(conn, table, table_name, self.load.write_mode)
            .await?;
        info!(
            table = %summary.table,
            rows = summary.rows_inserted,
            created = summary.created,
            mode = %summary.mode,
            "Ingested rows"
        );
        Ok(summary)
    }

    /// Source Reader and Schema Inferencer for one file
    pub fn read_table(&self, path: &Path) -> Result<Table> {
        let parser = CsvParser::new().with_trim(self.load.trim);
        let raw = match self.load.delimiter_byte()? {
            Some(delimiter) => parser.with_delimiter(delimiter).parse_file(path)?,
            None => parser.parse_file_auto_detect(path)?,
        };
        build_table(raw)
    }
}

/// `*.csv` files directly inside `dir`, in name order
fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Table name from a file stem: lowercase, with runs of other characters collapsed to `_`
pub fn table_name_for(path: &Path) -> Result<String> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let name = stem
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    if name.is_empty() {
        return Err(AppError::ParseError(format!(
            "Cannot derive a table name from {}",
            path.display()
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::load_config::WriteMode;
    use sqlx::Row;
    use std::fs;

    fn db_config(dir: &Path) -> DbConfig {
        DbConfig {
            driver: "sqlite".to_string(),
            database: dir.join("load.db").to_string_lossy().to_string(),
            ..DbConfig::default()
        }
    }

    fn load_config(source: PathBuf, mode: WriteMode) -> LoadConfig {
        LoadConfig {
            source,
            write_mode: mode,
            ..LoadConfig::default()
        }
    }

    async fn count(db: &DbConfig, table: &str) -> i64 {
        let manager = DbConnectionManager::new(db.clone());
        let mut conn = manager.connect().await.unwrap();
        let n = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM \"{}\"", table))
            .fetch_one(conn.raw())
            .await
            .unwrap();
        manager.close(conn).await;
        n
    }

    #[test]
    fn test_table_name_for() {
        assert_eq!(
            table_name_for(Path::new("data/Sales Report 2024.csv")).unwrap(),
            "sales_report_2024"
        );
        assert_eq!(table_name_for(Path::new("x/-begin_inventory-.csv")).unwrap(), "begin_inventory");
        assert!(table_name_for(Path::new("x/---.csv")).is_err());
    }

    #[tokio::test]
    async fn test_single_file_row_count_matches() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("Purchase Prices.csv");
        fs::write(&csv, "brand,price,in_stock\nA,1.5,true\nB,2,false\nC,,true\n").unwrap();
        let db = db_config(dir.path());

        let report = CsvIngestionUseCase::new(db.clone(), load_config(csv, WriteMode::FailIfExists))
            .run()
            .await
            .unwrap();

        assert_eq!(report.loaded.len(), 1);
        assert_eq!(report.loaded[0].table, "purchase_prices");
        assert_eq!(report.total_rows(), 3);
        assert_eq!(count(&db, "purchase_prices").await, 3);
    }

    #[tokio::test]
    async fn test_configured_table_name_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("input.csv");
        fs::write(&csv, "id;label\n7;seven\n8;eight\n").unwrap();
        let db = db_config(dir.path());
        let load = LoadConfig {
            table_name: Some("numbers".to_string()),
            delimiter: ";".to_string(),
            ..load_config(csv, WriteMode::Replace)
        };

        CsvIngestionUseCase::new(db.clone(), load).run().await.unwrap();

        let manager = DbConnectionManager::new(db);
        let mut conn = manager.connect().await.unwrap();
        let rows = sqlx::query("SELECT id, label FROM \"numbers\" ORDER BY rowid")
            .fetch_all(conn.raw())
            .await
            .unwrap();
        let values: Vec<(i64, String)> = rows
            .iter()
            .map(|r| (r.try_get(0).unwrap(), r.try_get(1).unwrap()))
            .collect();
        assert_eq!(values, vec![(7, "seven".to_string()), (8, "eight".to_string())]);
        manager.close(conn).await;
    }

    #[tokio::test]
    async fn test_missing_file_makes_no_connection() {
        let dir = tempfile::tempdir().unwrap();
        let db = db_config(dir.path());
        let load = load_config(dir.path().join("absent.csv"), WriteMode::Append);

        let result = CsvIngestionUseCase::new(db, load).run().await;

        assert!(matches!(result, Err(AppError::FileNotFound(_))));
        assert!(!dir.path().join("load.db").exists());
    }

    #[tokio::test]
    async fn test_malformed_file_makes_no_connection() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("bad.csv");
        fs::write(&csv, "a,b\n1,2\n3\n").unwrap();
        let db = db_config(dir.path());

        let result = CsvIngestionUseCase::new(db, load_config(csv, WriteMode::Append))
            .run()
            .await;

        assert!(matches!(result, Err(AppError::ParseError(_))));
        assert!(!dir.path().join("load.db").exists());
    }

    #[tokio::test]
    async fn test_fail_if_exists_on_second_run() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("items.csv");
        fs::write(&csv, "id\n1\n2\n").unwrap();
        let db = db_config(dir.path());

        let use_case =
            CsvIngestionUseCase::new(db.clone(), load_config(csv, WriteMode::FailIfExists));
        use_case.run().await.unwrap();
        let second = use_case.run().await;

        assert!(matches!(second, Err(AppError::TableExists(_))));
        assert_eq!(count(&db, "items").await, 2);
    }

    #[tokio::test]
    async fn test_directory_continues_past_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir(&data).unwrap();
        fs::write(data.join("a_sales.csv"), "id,qty\n1,5\n2,6\n").unwrap();
        fs::write(data.join("b_broken.csv"), "id,qty\n1\n").unwrap();
        fs::write(data.join("c_vendors.CSV"), "vendor\nacme\n").unwrap();
        fs::write(data.join("notes.txt"), "not a csv").unwrap();
        let db = db_config(dir.path());

        let result = CsvIngestionUseCase::new(db.clone(), load_config(data, WriteMode::Append))
            .run()
            .await;

        match result {
            Err(AppError::ParseError(msg)) => assert!(msg.contains("1 of 3 files failed")),
            other => panic!("expected parse error, got {:?}", other),
        }
        assert_eq!(count(&db, "a_sales").await, 2);
        assert_eq!(count(&db, "c_vendors").await, 1);
    }

    #[tokio::test]
    async fn test_directory_append_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir(&data).unwrap();
        fs::write(data.join("stock.csv"), "sku,qty\nx1,3\n").unwrap();
        let db = db_config(dir.path());
        let use_case = CsvIngestionUseCase::new(db.clone(), load_config(data, WriteMode::Append));

        use_case.run().await.unwrap();
        let report = use_case.run().await.unwrap();

        assert_eq!(report.total_rows(), 1);
        assert_eq!(count(&db, "stock").await, 2);
    }

    #[tokio::test]
    async fn test_empty_directory_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("empty");
        fs::create_dir(&data).unwrap();

        let report = CsvIngestionUseCase::new(db_config(dir.path()), load_config(data, WriteMode::Append))
            .run()
            .await
            .unwrap();
        assert!(report.loaded.is_empty());
    }
}
