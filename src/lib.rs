//! Library crate for fastscan-rs: a parallel full-connect TCP scanner for one host.
pub mod config;
pub mod entropy;
pub mod error;
pub mod logging;
pub mod ports;
pub mod probe;
pub mod progress;
pub mod retry;
pub mod scanner;
pub mod sink;
pub mod types;
