pub mod connection;
pub mod dialect;
pub mod table_writer;

pub use connection::{DbConnection, DbConnectionManager};
pub use dialect::Dialect;
pub use table_writer::{TableWriter, WriteSummary};
