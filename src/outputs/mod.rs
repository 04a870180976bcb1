//! Persistence: the record store and the table writers.
//!
//! # Submodules
//!
//! - [`store`]: Buffered JSON-lines store of annotated bookmarks
//! - [`json`]: Writes the articles and links tables plus a run summary
//!
//! Everything lands in the one data directory given on the command line.

pub mod json;
pub mod store;
