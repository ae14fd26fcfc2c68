//! Agent pool — multi-agent task scheduler.

pub mod config;
pub mod error;
pub mod pool;
