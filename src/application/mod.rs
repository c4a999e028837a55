//! Application services (use cases).
//!
//! These services hold the ingestion and analytics logic and drive the
//! outbound ports. They never touch files or the database directly.

pub mod change_set;
pub mod dedup;
pub mod load;
pub mod merge;
pub mod monitor;
pub mod pairwise;
pub mod parallel;
pub mod pipeline;
pub mod stage;
pub mod summary;
