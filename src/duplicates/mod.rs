//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Candidate grouping by size and derived name key
//! - Metadata-only confidence scoring
//! - The [`DuplicateEngine`] pipeline that verifies and acts on groups

pub mod confidence;
pub mod engine;
pub mod groups;

pub use confidence::{ConfidencePolicy, ConfidenceScore, ConfidenceScorer, Signals};
pub use engine::{
    DuplicateEngine, EngineConfig, EngineError, ErrorStage, ExecutionMode, GroupState,
    ResolvedGroup, RunError, RunReport,
};
pub use groups::{
    group_by_size, group_candidates, CandidateGroup, DuplicateVerdict, GroupingStats, Resolution,
};
