use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use tracing::{debug, info};

use crate::domain::error::Result;
use crate::domain::load_config::{DbConfig, LoadConfig};

/// Env var naming an alternative TOML config file
pub const CONFIG_PATH_ENV: &str = "CSV_LOADER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "csv-loader.toml";
pub const ENV_PREFIX: &str = "CSV_LOADER_";

/// Everything a run needs, resolved once at startup
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub db: DbConfig,
    pub load: LoadConfig,
}

/// Layers defaults, an optional TOML file and `CSV_LOADER_*` variables
pub struct ConfigService {
    config_file: PathBuf,
    dotenv_file: Option<PathBuf>,
}

impl ConfigService {
    /// Standard sources: `.env` first, then the file named by `CSV_LOADER_CONFIG`
    /// (or `csv-loader.toml`), then the environment.
    ///
    /// Runs before logging is set up so `.env` can carry `RUST_LOG`.
    pub fn from_environment() -> Self {
        let dotenv_file = dotenvy::dotenv().ok();
        let config_file = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self {
            config_file,
            dotenv_file,
        }
    }

    pub fn with_file(config_file: impl Into<PathBuf>) -> Self {
        Self {
            config_file: config_file.into(),
            dotenv_file: None,
        }
    }

    fn figment(&self) -> Figment {
        Figment::from(Serialized::defaults(DbConfig::default()))
            .merge(Serialized::defaults(LoadConfig::default()))
            .merge(Toml::file(&self.config_file))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Extract and validate the settings
    pub fn load(&self) -> Result<LoaderSettings> {
        if let Some(path) = &self.dotenv_file {
            debug!(path = %path.display(), "Loaded .env file");
        }

        let figment = self.figment();
        let db: DbConfig = figment.extract()?;
        let load: LoadConfig = figment.extract()?;
        load.validate()?;

        info!(
            config_file = %self.config_file.display(),
            file_present = self.config_file.exists(),
            driver = %db.url.as_deref().map(|_| "url").unwrap_or(db.driver.as_str()),
            source = %load.source.display(),
            write_mode = %load.write_mode,
            "Configuration loaded"
        );

        Ok(LoaderSettings { db, load })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::AppError;
    use crate::domain::load_config::WriteMode;
    use figment::Jail;

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let settings = ConfigService::with_file("missing.toml")
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(settings.db.driver, "sqlite");
            assert_eq!(settings.db.database, "inventory.db");
            assert_eq!(settings.load.write_mode, WriteMode::Append);
            assert_eq!(settings.load.delimiter, ",");
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "csv-loader.toml",
                r#"
                    driver = "postgres"
                    host = "db.internal"
                    port = 5433
                    database = "inventory"
                    user = "loader"
                    source = "exports/sales.csv"
                    table_name = "sales"
                    write_mode = "replace"
                "#,
            )?;
            jail.set_env("CSV_LOADER_PASSWORD", "12345");
            jail.set_env("CSV_LOADER_WRITE_MODE", "fail-if-exists");
            jail.set_env("CSV_LOADER_DELIMITER", ";");

            let settings = ConfigService::with_file("csv-loader.toml")
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(settings.db.driver, "postgres");
            assert_eq!(settings.db.host, "db.internal");
            assert_eq!(settings.db.port, Some(5433));
            assert_eq!(settings.db.password.as_deref(), Some("12345"));
            assert_eq!(settings.load.table_name.as_deref(), Some("sales"));
            assert_eq!(settings.load.write_mode, WriteMode::FailIfExists);
            assert_eq!(settings.load.delimiter, ";");
            Ok(())
        });
    }

    #[test]
    fn test_fail_alias() {
        Jail::expect_with(|jail| {
            jail.set_env("CSV_LOADER_WRITE_MODE", "fail");
            let settings = ConfigService::with_file("none.toml")
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(settings.load.write_mode, WriteMode::FailIfExists);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        Jail::expect_with(|jail| {
            jail.set_env("CSV_LOADER_WRITE_MODE", "overwrite");
            let result = ConfigService::with_file("none.toml").load();
            assert!(matches!(result, Err(AppError::ConfigError(_))));
            Ok(())
        });

        Jail::expect_with(|jail| {
            jail.set_env("CSV_LOADER_BATCH_SIZE", "0");
            let result = ConfigService::with_file("none.toml").load();
            assert!(matches!(result, Err(AppError::ConfigError(_))));
            Ok(())
        });
    }
}
