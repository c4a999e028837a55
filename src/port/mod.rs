//! Port definitions.
//!
//! Ports are the seams between the pipeline core and the outside world.
//! The application layer depends only on these traits; adapters implement them.

pub mod outbound;
