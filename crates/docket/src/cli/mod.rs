//! Command handlers for the Docket CLI.

pub mod agent;
pub mod config;
pub mod process;
pub mod theme;
