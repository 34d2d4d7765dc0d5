//! CLI subcommands.

pub mod batch;
pub mod config;
pub mod models;
pub mod points;
pub mod scan;
