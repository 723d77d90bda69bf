pub mod core;
pub mod datasource;
pub mod error;
pub mod migration;
pub mod records;
