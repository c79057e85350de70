//! SQL text differences between the supported backends.
//!
//! All statements go through the `Any` driver, which forwards SQL verbatim, so
//! placeholders, identifier quoting and type names must match the backend.

use crate::domain::load_config::DbDriver;
use crate::domain::table::ColumnType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    driver: DbDriver,
}

impl Dialect {
    pub fn new(driver: DbDriver) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> DbDriver {
        self.driver
    }

    /// Quote an identifier, doubling any embedded quote character
    pub fn quote_ident(&self, ident: &str) -> String {
        match self.driver {
            DbDriver::MySql => format!("`{}`", ident.replace('`', "``")),
            DbDriver::Sqlite | DbDriver::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Column type used when creating a table
    pub fn sql_type(&self, column_type: ColumnType) -> &'static str {
        match (self.driver, column_type) {
            (_, ColumnType::Text) => "TEXT",
            (_, ColumnType::Boolean) => "BOOLEAN",
            (_, ColumnType::Date) => "DATE",
            (DbDriver::Sqlite, ColumnType::Integer) => "INTEGER",
            (_, ColumnType::Integer) => "BIGINT",
            (DbDriver::Sqlite, ColumnType::Float) => "REAL",
            (DbDriver::Postgres, ColumnType::Float) => "DOUBLE PRECISION",
            (DbDriver::MySql, ColumnType::Float) => "DOUBLE",
        }
    }

    /// Placeholder for the `index`-th (1-based) bound parameter of a `column_type` value.
    ///
    /// Dates travel as ISO strings, so servers with a real DATE type get an explicit cast.
    pub fn placeholder(&self, index: usize, column_type: ColumnType) -> String {
        let base = match self.driver {
            DbDriver::Postgres => format!("${}", index),
            DbDriver::Sqlite | DbDriver::MySql => "?".to_string(),
        };
        match (self.driver, column_type) {
            (DbDriver::Postgres | DbDriver::MySql, ColumnType::Date) => {
                format!("CAST({} AS DATE)", base)
            }
            _ => base,
        }
    }

    /// Upper bound on bind parameters in one statement
    pub fn max_bind_params(&self) -> usize {
        match self.driver {
            DbDriver::Sqlite => 999,
            DbDriver::Postgres | DbDriver::MySql => 65_535,
        }
    }

    /// Catalog query returning `(column_name, declared_type)` rows in column order.
    /// Takes the table name as its single bound parameter.
    pub fn describe_table_sql(&self) -> &'static str {
        match self.driver {
            DbDriver::Sqlite => "SELECT name, type FROM pragma_table_info(?) ORDER BY cid",
            DbDriver::Postgres => {
                "SELECT column_name::text, data_type::text
                 FROM information_schema.columns
                 WHERE table_schema = current_schema() AND table_name = $1
                 ORDER BY ordinal_position"
            }
            DbDriver::MySql => {
                "SELECT CAST(column_name AS CHAR), CAST(data_type AS CHAR)
                 FROM information_schema.columns
                 WHERE table_schema = DATABASE() AND table_name = ?
                 ORDER BY ordinal_position"
            }
        }
    }

    pub fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote_ident(table))
    }

    pub fn create_table_sql(&self, table: &str, columns: &[(&str, ColumnType)]) -> String {
        let defs = columns
            .iter()
            .map(|(name, ty)| format!("{} {}", self.quote_ident(name), self.sql_type(*ty)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({})", self.quote_ident(table), defs)
    }

    /// Multi-row INSERT with one placeholder per cell
    pub fn insert_sql(&self, table: &str, columns: &[(&str, ColumnType)], rows: usize) -> String {
        let names = columns
            .iter()
            .map(|(name, _)| self.quote_ident(name))
            .collect::<Vec<_>>()
            .join(", ");

        let mut index = 0;
        let tuples = (0..rows)
            .map(|_| {
                let cells = columns
                    .iter()
                    .map(|(_, ty)| {
                        index += 1;
                        self.placeholder(index, *ty)
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({})", cells)
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.quote_ident(table),
            names,
            tuples
        )
    }

    /// Map a declared column type from the catalog onto the loader's types.
    ///
    /// `None` means the loader has no value it can bind into that column.
    /// SQLite stores any value in any column, so it follows the affinity rules
    /// and always yields a type. Postgres and MySQL report `data_type` spellings,
    /// which are matched exactly.
    pub fn column_type_from_declared(&self, declared: &str) -> Option<ColumnType> {
        let lower = declared.trim().to_ascii_lowercase();
        match self.driver {
            DbDriver::Sqlite => Some(sqlite_affinity(&lower)),
            DbDriver::Postgres => match lower.as_str() {
                "smallint" | "integer" | "bigint" => Some(ColumnType::Integer),
                "real" | "double precision" | "numeric" => Some(ColumnType::Float),
                "boolean" => Some(ColumnType::Boolean),
                "date" | "timestamp without time zone" | "timestamp with time zone" => {
                    Some(ColumnType::Date)
                }
                "text" | "character varying" | "character" => Some(ColumnType::Text),
                _ => None,
            },
            DbDriver::MySql => match lower.as_str() {
                "tinyint" | "smallint" | "mediumint" | "int" | "bigint" => {
                    Some(ColumnType::Integer)
                }
                "float" | "double" | "decimal" => Some(ColumnType::Float),
                "date" | "datetime" | "timestamp" => Some(ColumnType::Date),
                "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" => {
                    Some(ColumnType::Text)
                }
                _ => None,
            },
        }
    }
}

/// SQLite column affinity, with BOOLEAN and DATE split out of NUMERIC
fn sqlite_affinity(declared: &str) -> ColumnType {
    if declared.contains("bool") {
        ColumnType::Boolean
    } else if declared.contains("int") {
        ColumnType::Integer
    } else if declared.contains("char") || declared.contains("clob") || declared.contains("text") {
        ColumnType::Text
    } else if declared.contains("date") || declared.contains("time") {
        ColumnType::Date
    } else if ["real", "floa", "doub", "numeric", "decimal"]
        .iter()
        .any(|k| declared.contains(k))
    {
        ColumnType::Float
    } else {
        // BLOB or untyped columns; text is the one representation every cell has
        ColumnType::Text
    }
}
