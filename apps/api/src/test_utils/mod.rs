//! Test utilities for integration testing.
//!
//! This module provides:
//! - Test data factories and fixed signing credentials
//! - `TestAppStateBuilder` for HTTP-level tests against the real router

mod app_state_builder;
mod factories;

pub use app_state_builder::*;
pub use factories::*;
