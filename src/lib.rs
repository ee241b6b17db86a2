//! photodedup - tiered duplicate detection for photo and video collections.
//!
//! Files are grouped by size and by a name key with copy suffixes removed,
//! scored on metadata, and verified by sampled then full content hashes.
//! Hard links are never reported as duplicates, and nothing is removed
//! unless the run is in apply mode.

pub mod actions;
pub mod app;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

pub use app::run_app;
