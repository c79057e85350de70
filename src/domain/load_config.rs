use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use super::error::AppError;

/// Database target. Either `url` or the explicit parameters are used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Full connection string; wins over the explicit parameters when set
    #[serde(deserialize_with = "lenient_opt_string")]
    pub url: Option<String>,
    /// `sqlite`, `postgres` or `mysql`
    pub driver: String,
    #[serde(deserialize_with = "lenient_string")]
    pub host: String,
    pub port: Option<u16>,
    /// Database name, or the file path for SQLite
    #[serde(deserialize_with = "lenient_string")]
    pub database: String,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub user: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub password: Option<String>,
    pub connect_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            driver: "sqlite".to_string(),
            host: "localhost".to_string(),
            port: None,
            database: "inventory.db".to_string(),
            user: None,
            password: None,
            connect_timeout_secs: 10,
        }
    }
}

/// What to read and how to write it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// A CSV file or a directory of CSV files
    pub source: PathBuf,
    /// Target table for a single file; derived from the file name when unset
    #[serde(deserialize_with = "lenient_opt_string")]
    pub table_name: Option<String>,
    pub write_mode: WriteMode,
    /// Single delimiter character, or `auto` to sniff it
    pub delimiter: String,
    /// Trim surrounding whitespace from every value
    pub trim: bool,
    /// Maximum rows per INSERT statement
    pub batch_size: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("data"),
            table_name: None,
            write_mode: WriteMode::Append,
            delimiter: ",".to_string(),
            trim: true,
            batch_size: 1000,
        }
    }
}

impl LoadConfig {
    /// Resolve the delimiter setting: `Some(byte)` for a fixed delimiter, `None` for auto-detection
    pub fn delimiter_byte(&self) -> Result<Option<u8>, AppError> {
        if self.delimiter.eq_ignore_ascii_case("auto") {
            return Ok(None);
        }
        let delimiter = match self.delimiter.as_str() {
            "\\t" | "tab" => "\t",
            other => other,
        };
        match delimiter.as_bytes() {
            [byte] if byte.is_ascii() => Ok(Some(*byte)),
            _ => Err(AppError::ConfigError(format!(
                "delimiter must be a single ASCII character or 'auto', got '{}'",
                self.delimiter
            ))),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.delimiter_byte()?;
        if self.batch_size == 0 {
            return Err(AppError::ConfigError(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if let Some(name) = &self.table_name {
            if name.trim().is_empty() {
                return Err(AppError::ConfigError("table_name must not be empty".to_string()));
            }
        }
        Ok(())
    }
}

/// Scalar that environment variables may surface as a number or bool
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Str(s) => s,
            Scalar::Int(n) => n.to_string(),
            Scalar::Uint(n) => n.to_string(),
            Scalar::Float(x) => x.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

// `CSV_LOADER_PASSWORD=12345` arrives as an integer; text fields take it verbatim
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Scalar::deserialize(deserializer).map(Scalar::into_string)
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(Scalar::into_string))
}

/// Policy for a destination table that already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    #[serde(alias = "fail")]
    FailIfExists,
    Replace,
    Append,
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteMode::FailIfExists => write!(f, "fail-if-exists"),
            WriteMode::Replace => write!(f, "replace"),
            WriteMode::Append => write!(f, "append"),
        }
    }
}

/// Supported database backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbDriver {
    Sqlite,
    Postgres,
    MySql,
}

impl DbDriver {
    pub fn default_port(&self) -> Option<u16> {
        match self {
            DbDriver::Sqlite => None,
            DbDriver::Postgres => Some(5432),
            DbDriver::MySql => Some(3306),
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            DbDriver::Sqlite => "sqlite",
            DbDriver::Postgres => "postgres",
            DbDriver::MySql => "mysql",
        }
    }

    /// Driver named by a connection string's scheme
    pub fn from_url(url: &str) -> Result<Self, AppError> {
        let scheme = url.split(':').next().unwrap_or_default();
        scheme.parse()
    }
}

impl FromStr for DbDriver {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(DbDriver::Sqlite),
            "postgres" | "postgresql" => Ok(DbDriver::Postgres),
            "mysql" | "mariadb" => Ok(DbDriver::MySql),
            other => Err(AppError::ConnectionError(format!(
                "Unsupported database driver '{}'. Choose sqlite, postgres or mysql.",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_parsing() {
        assert_eq!("PostgreSQL".parse::<DbDriver>().unwrap(), DbDriver::Postgres);
        assert_eq!("mariadb".parse::<DbDriver>().unwrap(), DbDriver::MySql);
        assert!(matches!(
            "oracle".parse::<DbDriver>(),
            Err(AppError::ConnectionError(_))
        ));
        assert_eq!(
            DbDriver::from_url("postgresql://u:p@h/db").unwrap(),
            DbDriver::Postgres
        );
    }

    #[test]
    fn test_delimiter_byte() {
        let mut config = LoadConfig::default();
        assert_eq!(config.delimiter_byte().unwrap(), Some(b','));

        config.delimiter = "auto".to_string();
        assert_eq!(config.delimiter_byte().unwrap(), None);

        config.delimiter = "tab".to_string();
        assert_eq!(config.delimiter_byte().unwrap(), Some(b'\t'));

        config.delimiter = ";;".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = LoadConfig {
            batch_size: 0,
            ..LoadConfig::default()
        };
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
    }
}
