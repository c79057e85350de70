use std::fmt;

#[derive(Debug)]
pub enum AppError {
    ConfigError(String),
    FileNotFound(String),
    ParseError(String),
    ConnectionError(String),
    TableExists(String),
    SchemaMismatch(String),
    DatabaseError(String),
    IoError(String),
}

impl AppError {
    /// Pipeline stage the error surfaced in, used for the final exit message.
    pub fn stage(&self) -> &'static str {
        match self {
            AppError::ConfigError(_) => "config",
            AppError::FileNotFound(_) | AppError::ParseError(_) | AppError::IoError(_) => "read",
            AppError::ConnectionError(_) => "connect",
            AppError::TableExists(_) | AppError::SchemaMismatch(_) | AppError::DatabaseError(_) => {
                "write"
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::FileNotFound(msg) => write!(f, "File not found: {}", msg),
            AppError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            AppError::ConnectionError(msg) => write!(f, "Connection error: {}", msg),
            AppError::TableExists(msg) => write!(f, "Table already exists: {}", msg),
            AppError::SchemaMismatch(msg) => write!(f, "Schema mismatch: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(err: figment::Error) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl AppError {
    /// Classify a driver error raised while talking to an open connection.
    ///
    /// Transport failures mean the session is gone; everything else is a
    /// statement the database rejected.
    pub fn from_sqlx(context: &str, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => {
                AppError::ConnectionError(format!("{}: {}", context, err))
            }
            other => AppError::DatabaseError(format!("{}: {}", context, other)),
        }
    }

    /// Prefix the message while keeping the variant, and with it the stage
    pub fn context(self, ctx: &str) -> Self {
        match self {
            AppError::ConfigError(msg) => AppError::ConfigError(format!("{}: {}", ctx, msg)),
            AppError::FileNotFound(msg) => AppError::FileNotFound(format!("{}: {}", ctx, msg)),
            AppError::ParseError(msg) => AppError::ParseError(format!("{}: {}", ctx, msg)),
            AppError::ConnectionError(msg) => {
                AppError::ConnectionError(format!("{}: {}", ctx, msg))
            }
            AppError::TableExists(msg) => AppError::TableExists(format!("{}: {}", ctx, msg)),
            AppError::SchemaMismatch(msg) => AppError::SchemaMismatch(format!("{}: {}", ctx, msg)),
            AppError::DatabaseError(msg) => AppError::DatabaseError(format!("{}: {}", ctx, msg)),
            AppError::IoError(msg) => AppError::IoError(format!("{}: {}", ctx, msg)),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(AppError::FileNotFound("x".into()).stage(), "read");
        assert_eq!(AppError::ConnectionError("x".into()).stage(), "connect");
        assert_eq!(AppError::TableExists("x".into()).stage(), "write");
        assert_eq!(AppError::ConfigError("x".into()).stage(), "config");
    }

    #[test]
    fn test_io_error_is_connection_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = AppError::from_sqlx("Insert failed", sqlx::Error::Io(io));
        assert!(matches!(err, AppError::ConnectionError(_)));

        let err = AppError::from_sqlx("Insert failed", sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::DatabaseError(_)));
    }

    #[test]
    fn test_context_keeps_variant() {
        let err = AppError::SchemaMismatch("bad column".into()).context("sales.csv");
        assert_eq!(err.to_string(), "Schema mismatch: sales.csv: bad column");
        assert_eq!(err.stage(), "write");
    }
}
