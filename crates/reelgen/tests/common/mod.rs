//! Shared test utilities for reelgen integration tests.
//!
//! This module provides:
//! - `TestHarness` for running pipelines against a temp workspace and an
//!   in-memory job store
//! - `ScriptedServices`, collaborators whose failures and latency are set
//!   per test
//! - Builders for inputs, transcripts and pipeline settings

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{Call, ScriptedServices, TestHarness};
