//! Outbound adapters (driven side).

pub mod dataset;
pub mod discovery;
mod fs;
pub mod parser;
pub mod sqlite;
pub mod state_file;
