use std::collections::HashMap;

use sqlx::any::{Any, AnyArguments};
use sqlx::query::Query;
use sqlx::Row;
use tracing::{debug, info};

use super::connection::DbConnection;
use crate::domain::error::{AppError, Result};
use crate::domain::load_config::WriteMode;
use crate::domain::table::{ColumnType, Table, Value};

/// Outcome of one table write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub table: String,
    pub mode: WriteMode,
    pub created: bool,
    pub rows_inserted: usize,
}

/// A column as declared in the database catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingColumn {
    pub name: String,
    pub declared_type: String,
    /// `None` for server types the loader cannot write
    pub column_type: Option<ColumnType>,
}

pub struct TableWriter {
    batch_size: usize,
}

impl TableWriter {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Columns of `table_name` in declaration order; empty when the table does not exist
    pub async fn describe(
        &self,
        conn: &mut DbConnection,
        table_name: &str,
    ) -> Result<Vec<ExistingColumn>> {
        let dialect = conn.dialect();
        let sql = dialect.describe_table_sql();
        let rows = sqlx::query(sql)
            .bind(table_name)
            .fetch_all(conn.raw())
            .await
            .map_err(|e| AppError::from_sqlx("Failed to inspect table", e))?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get(0).map_err(|e| {
                AppError::DatabaseError(format!("Failed to parse column name: {}", e))
            })?;
            let declared_type: String = row.try_get(1).map_err(|e| {
                AppError::DatabaseError(format!("Failed to parse column type: {}", e))
            })?;
            let column_type = dialect.column_type_from_declared(&declared_type);
            columns.push(ExistingColumn {
                name,
                declared_type,
                column_type,
            });
        }
        Ok(columns)
    }

    /// Write `table` into `table_name` under `mode`
    pub async fn write(
        &self,
        conn: &mut DbConnection,
        table: &Table,
        table_name: &str,
        mode: WriteMode,
    ) -> Result<WriteSummary> {
        let existing = self.describe(conn, table_name).await?;
        let exists = !existing.is_empty();
        let inferred: Vec<ColumnType> = table.columns().iter().map(|c| c.column_type).collect();

        let (target_types, created) = match (mode, exists) {
            (WriteMode::FailIfExists, true) => {
                return Err(AppError::TableExists(format!(
                    "'{}' already exists and write_mode is fail-if-exists",
                    table_name
                )));
            }
            (WriteMode::Append, true) => (check_compatible(table, table_name, &existing)?, false),
            (WriteMode::Replace, true) => {
                self.drop_table(conn, table_name).await?;
                self.create_table(conn, table, table_name).await?;
                (inferred, true)
            }
            (_, false) => {
                self.create_table(conn, table, table_name).await?;
                (inferred, true)
            }
        };

        let rows_inserted = self
            .insert_rows(conn, table, table_name, &target_types)
            .await?;

        Ok(WriteSummary {
            table: table_name.to_string(),
            mode,
            created,
            rows_inserted,
        })
    }

    async fn drop_table(&self, conn: &mut DbConnection, table_name: &str) -> Result<()> {
        let sql = conn.dialect().drop_table_sql(table_name);
        sqlx::query(&sql)
            .execute(conn.raw())
            .await
            .map_err(|e| AppError::from_sqlx("Failed to drop table", e))?;
        info!(table = %table_name, "Dropped existing table");
        Ok(())
    }

    async fn create_table(
        &self,
        conn: &mut DbConnection,
        table: &Table,
        table_name: &str,
    ) -> Result<()> {
        let columns: Vec<(&str, ColumnType)> = table
            .columns()
            .iter()
            .map(|c| (c.name.as_str(), c.column_type))
            .collect();
        let sql = conn.dialect().create_table_sql(table_name, &columns);
        sqlx::query(&sql)
            .execute(conn.raw())
            .await
            .map_err(|e| AppError::from_sqlx("Failed to create table", e))?;
        info!(table = %table_name, columns = columns.len(), "Created table");
        Ok(())
    }

    /// Insert every row in source order with multi-row INSERT statements
    async fn insert_rows(
        &self,
        conn: &mut DbConnection,
        table: &Table,
        table_name: &str,
        target_types: &[ColumnType],
    ) -> Result<usize> {
        let dialect = conn.dialect();
        let columns: Vec<(&str, ColumnType)> = table
            .columns()
            .iter()
            .zip(target_types)
            .map(|(c, ty)| (c.name.as_str(), *ty))
            .collect();

        let per_statement = (dialect.max_bind_params() / columns.len().max(1)).max(1);
        let rows_per_batch = self.batch_size.min(per_statement);
        let total = table.row_count();

        let mut inserted = 0;
        let mut full_batch_sql: Option<String> = None;
        while inserted < total {
            let batch_rows = rows_per_batch.min(total - inserted);
            let sql = if batch_rows == rows_per_batch {
                full_batch_sql
                    .get_or_insert_with(|| dialect.insert_sql(table_name, &columns, batch_rows))
                    .clone()
            } else {
                dialect.insert_sql(table_name, &columns, batch_rows)
            };

            let mut query = sqlx::query(&sql);
            for row in inserted..inserted + batch_rows {
                for (column, ty) in table.columns().iter().zip(target_types) {
                    query = bind_value(query, column.values[row].coerce_to(*ty), *ty);
                }
            }

            query.execute(conn.raw()).await.map_err(|e| {
                AppError::from_sqlx(
                    &format!(
                        "Insert into '{}' failed after {} of {} rows",
                        table_name, inserted, total
                    ),
                    e,
                )
            })?;

            inserted += batch_rows;
            debug!(table = %table_name, inserted, total, "Inserted batch");
        }

        Ok(inserted)
    }
}

/// Append policy: every CSV column must exist in the table and its values must
/// be storable in the declared type. Returns the table's types in CSV column order.
fn check_compatible(
    table: &Table,
    table_name: &str,
    existing: &[ExistingColumn],
) -> Result<Vec<ColumnType>> {
    let by_name: HashMap<&str, &ExistingColumn> =
        existing.iter().map(|c| (c.name.as_str(), c)).collect();

    let mut problems = Vec::new();
    let mut target_types = Vec::with_capacity(table.columns().len());

    for column in table.columns() {
        match by_name.get(column.name.as_str()) {
            None => problems.push(format!("column '{}' does not exist", column.name)),
            Some(ExistingColumn {
                declared_type,
                column_type: None,
                ..
            }) => problems.push(format!(
                "column '{}' is declared {}, which the loader cannot write",
                column.name, declared_type
            )),
            Some(ExistingColumn {
                declared_type,
                column_type: Some(target),
                ..
            }) => {
                if !column.is_all_null() && !column.column_type.fits_into(*target) {
                    problems.push(format!(
                        "column '{}' holds {} values but is declared {}",
                        column.name, column.column_type, declared_type
                    ));
                }
                target_types.push(*target);
            }
        }
    }

    if problems.is_empty() {
        Ok(target_types)
    } else {
        Err(AppError::SchemaMismatch(format!(
            "cannot append to '{}': {}",
            table_name,
            problems.join("; ")
        )))
    }
}

/// Bind one cell. NULLs carry the column's type so typed servers accept them.
fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: Value,
    column_type: ColumnType,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        Value::Integer(n) => query.bind(n),
        Value::Float(x) => query.bind(x),
        Value::Boolean(b) => query.bind(b),
        Value::Text(s) => query.bind(s),
        Value::Date(d) => query.bind(d.format("%Y-%m-%d").to_string()),
        Value::Null => match column_type {
            ColumnType::Integer => query.bind(None::<i64>),
            ColumnType::Float => query.bind(None::<f64>),
            ColumnType::Boolean => query.bind(None::<bool>),
            ColumnType::Text | ColumnType::Date => query.bind(None::<String>),
        },
    }
}
