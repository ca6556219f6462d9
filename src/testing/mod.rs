//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for testing the topic session
//! without a streaming backend.

pub mod mocks;

pub use mocks::*;
