//! Domain types for the ETL core.
//!
//! - [`source`] - The four ingested data sources and their defaults
//! - [`value`] - Dynamically typed cell values used at the storage boundary
//! - [`record`] - Fixed-shape normalized records per source
//! - [`key`] - Resolved natural-key and recency column specs
//! - [`fingerprint`] - File fingerprints and per-source processing state
//! - [`analytics`] - Derived pair and monitor records

pub mod analytics;
pub mod fingerprint;
pub mod key;
pub mod record;
pub mod source;
pub mod value;
