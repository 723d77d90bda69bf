pub mod error;
pub mod retry;
pub mod table;
pub mod writer;
