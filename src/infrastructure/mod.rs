//! Infrastructure layer module
//!
//! - Configuration management
//! - Logging infrastructure
//! - Task file loading

pub mod config;
pub mod logging;
pub mod task_loader;

pub use task_loader::TaskLoader;
