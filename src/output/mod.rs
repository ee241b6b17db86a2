//! Report formatters.
//!
//! - [`TextOutput`] for the terminal
//! - [`JsonOutput`] for automation and scripting
//! - [`CsvOutput`] for spreadsheet import
//!
//! # Example
//!
//! ```no_run
//! use photodedup::duplicates::{DuplicateEngine, EngineConfig};
//! use photodedup::error::ExitCode;
//! use photodedup::output::JsonOutput;
//!
//! let engine = DuplicateEngine::new(EngineConfig::new("/photos"))?;
//! let report = engine.run()?;
//! println!("{}", JsonOutput::new(&report, ExitCode::Success).to_json_pretty()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod csv;
pub mod json;
pub mod text;

pub use csv::CsvOutput;
pub use json::JsonOutput;
pub use text::TextOutput;
