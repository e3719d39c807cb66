//! A viewer for very large line-oriented files.
//!
//! Lines are never loaded all at once. The viewport decides which indices are
//! visible, the prefetch controller asks the scheduler for whatever is missing
//! around them, and completed fetches land in a sparse cache that is thrown
//! away whenever the underlying source changes.

pub mod app;
pub mod backend;
pub mod cache;
pub mod classifier;
pub mod commands;
pub mod config;
pub mod error;
pub mod file_loader;
pub mod file_source;
pub mod format;
pub mod inflight;
pub mod prefetch;
pub mod query;
pub mod recent;
pub mod remote_loader;
pub mod scheduler;
pub mod search;
pub mod selection;
pub mod server;
pub mod viewer;
pub mod viewport;

pub use error::{LensError, Result};
