//! Bondlake - incremental ETL for fixed-income desk exports.
//!
//! Ingests four raw sources (bond universe, portfolio holdings, dealer runs
//! and G-spread histories) from directories of CSV exports into SQLite,
//! processing only new or modified files, then refreshes two analytics
//! tables from the loaded data.
//!
//! # Architecture
//!
//! The crate follows a hexagonal layout:
//!
//! - **`domain`** - Records, values, natural keys, file fingerprints and
//!   analytics row types. No I/O.
//! - **`application`** - Change detection, partition-aware merge,
//!   deduplication, batched loading, the pairwise and runs-monitor
//!   analytics, and the stage graph that orders a run.
//! - **`port`** - Traits the application drives: table and state stores,
//!   file sources, parsers and analytics inputs.
//! - **`adapter`** - SQLite (diesel), CSV parsers, JSON state files,
//!   snapshot files and the `bondlake` CLI.
//! - **`infrastructure`** - TOML configuration, logging setup and the
//!   composition root that wires a run together.
//!
//! # Example
//!
//! ```no_run
//! use bondlake::application::load::CancelFlag;
//! use bondlake::infrastructure::bootstrap::{self, RunRequest};
//! use bondlake::infrastructure::config::settings::Config;
//!
//! # async fn example() -> bondlake::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let summary = bootstrap::run(&config, &RunRequest::default(), &CancelFlag::new()).await?;
//! assert!(!summary.has_failures());
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
