//! Disposable containers for integration tests.
//!
//! Everything here needs a running Docker daemon.

pub mod error;
pub mod redis;

pub use error::{Result, TestInfraError};
