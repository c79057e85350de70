pub mod error;
pub mod load_config;
pub mod table;
