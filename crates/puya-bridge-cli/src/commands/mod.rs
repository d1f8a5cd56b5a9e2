//! Command implementations

pub mod config;
pub mod resolve;
pub mod serve;
