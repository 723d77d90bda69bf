pub mod endpoints;
pub mod executor;
