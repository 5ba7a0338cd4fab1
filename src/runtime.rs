//! Configuration, logging and progress plumbing around the bootstrap runner.

pub mod config;
pub mod fatal;
pub mod logger;
pub mod progress;
pub mod reporter;
pub mod runner;
pub mod telemetry;
