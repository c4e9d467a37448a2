//! Test doubles and fixtures shared by unit and integration tests.

pub mod fixtures;
mod mock_executor;

pub use mock_executor::{MockExecutor, RecordedInvocation};
