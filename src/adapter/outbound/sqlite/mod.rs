//! SQLite persistence adapters.
//!
//! Provides the destination-table store used by the loader and the read
//! side used by the analytics stages, both on a Diesel connection pool.

pub mod database;
pub mod table;
