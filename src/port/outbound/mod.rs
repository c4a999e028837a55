//! Outbound ports: storage, parsing and analytics reads.

pub mod analytics;
pub mod parser;
pub mod store;
