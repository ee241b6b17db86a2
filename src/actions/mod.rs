//! File actions module.
//!
//! Apply mode removes redundant copies through a [`FileRemover`]:
//! - Permanent deletion (default)
//! - Move to system trash (recoverable)
//! - TOCTOU verification to skip files changed since the scan
//!
//! ```no_run
//! use photodedup::actions::{DeleteMethod, FileRemover};
//! use std::path::Path;
//!
//! let remover = DeleteMethod::Trash.remover();
//! remover.remove(Path::new("/photos/IMG_001_1.jpg"))?;
//! # Ok::<(), photodedup::actions::DeleteError>(())
//! ```

pub mod delete;

pub use delete::{
    ensure_original_present, remove_redundant, validate_keeps_original, DeleteError, DeleteMethod,
    FileRemover, FileSnapshot, PermanentRemover, TrashRemover,
};
