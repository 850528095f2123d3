//! Utility functions and helpers for platecache.
//!
//! This module provides cross-cutting concerns like structured logging,
//! key redaction, and bounded retry for caller-supplied fetchers.
//!
//! # Submodules
//!
//! - `logging`: Tracing initialization and cache key redaction.
//! - `retry`: Bounded retry with exponential backoff.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod logging;
pub mod retry;
