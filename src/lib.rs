pub mod application;
pub mod domain;
pub mod infrastructure;

mod app;

pub use app::run;
