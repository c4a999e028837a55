//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`config`] - A complete configuration rooted in a scratch directory.
//! - [`fixture`] - Raw CSV exports written in the shapes the parsers accept.
//! - [`store`] - In-memory [`StateStore`](crate::port::outbound::store::StateStore) and a
//!   table store wrapper with switchable write failures.

pub mod config;
pub mod fixture;
pub mod store;
