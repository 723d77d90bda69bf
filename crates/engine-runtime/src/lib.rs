pub mod error;
pub mod execution;
pub mod service;
pub mod settings;
