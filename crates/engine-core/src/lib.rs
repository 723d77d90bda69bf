pub mod error;
pub mod progress;
pub mod registry;
pub mod retry;
pub mod state;
