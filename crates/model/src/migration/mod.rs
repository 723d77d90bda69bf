pub mod compare;
pub mod progress;
pub mod task;
