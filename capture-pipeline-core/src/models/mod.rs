pub mod config;
pub mod diagnostics;
pub mod error;
pub mod lane;
pub mod queue_item;
pub mod session;
