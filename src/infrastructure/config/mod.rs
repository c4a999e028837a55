//! Infrastructure configuration modules.

pub mod analytics;
pub mod logging;
pub mod pipeline;
pub mod settings;
pub mod source;
