//! Error Types
//!
//! This module defines the error types used throughout the bake pipeline.
//!
//! # Overview
//!
//! The main error type [`SkelBakeError`] covers the failure modes of the
//! per-sample kernels and query setup:
//! - Malformed joint influences or blend shape data
//! - Array size mismatches when remapping between orders
//! - Missing authored values a computation depends on
//! - Invalid bake configuration
//!
//! # Usage
//!
//! Kernels return [`Result<T>`], an alias for
//! `std::result::Result<T, SkelBakeError>`. Per-sample failures are logged
//! and degrade to "no sample" inside the orchestrator; only
//! [`BakeConfig::validate`](crate::config::BakeConfig::validate) surfaces an
//! error to the caller.
//!
//! ```rust,ignore
//! use skel_bake::errors::{SkelBakeError, Result};
//!
//! fn check(len: usize) -> Result<()> {
//!     if len == 0 {
//!         return Err(SkelBakeError::MissingValue("points"));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the bake pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkelBakeError {
    // ========================================================================
    // Query Setup Errors
    // ========================================================================
    /// A binding referenced a prim with no skeleton definition.
    #[error("Skeleton not found: {0}")]
    SkeletonNotFound(String),

    /// Joint topology is not ordered parent-before-child.
    #[error("Invalid joint topology: joint {joint} has parent {parent}")]
    InvalidTopology {
        /// Index of the offending joint
        joint: usize,
        /// Index of its parent
        parent: usize,
    },

    // ========================================================================
    // Data Shape Errors
    // ========================================================================
    /// An array did not have the expected length.
    #[error("Size mismatch for {context}: expected {expected}, got {actual}")]
    SizeMismatch {
        /// What was being checked
        context: &'static str,
        /// Expected element count
        expected: usize,
        /// Actual element count
        actual: usize,
    },

    /// A joint index referenced a transform outside the skinning set.
    #[error("Joint index {index} out of range ({count} transforms)")]
    JointIndexOutOfRange {
        /// The invalid index
        index: i32,
        /// Number of available transforms
        count: usize,
    },

    /// A blend shape point index referenced a point outside the buffer.
    #[error("Point index {index} out of range ({count} points)")]
    PointIndexOutOfRange {
        /// The invalid index
        index: u32,
        /// Number of points in the buffer
        count: usize,
    },

    /// Joint influences are not laid out in whole components.
    #[error("Malformed joint influences: {0}")]
    MalformedInfluences(String),

    // ========================================================================
    // Value Errors
    // ========================================================================
    /// A required authored value was absent at the requested time.
    #[error("Missing value: {0}")]
    MissingValue(&'static str),

    /// The bake configuration was rejected.
    #[error("Invalid bake configuration: {0}")]
    InvalidConfig(String),
}

/// Alias for `Result<T, SkelBakeError>`.
pub type Result<T> = std::result::Result<T, SkelBakeError>;
