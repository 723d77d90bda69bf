pub mod config;
pub mod options;
pub mod schema;
