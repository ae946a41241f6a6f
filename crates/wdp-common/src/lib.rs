//! WDP Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the WDP workspace.
//!
//! # Overview
//!
//! - **Error Handling**: `WdpError` and the workspace `Result` alias
//! - **Logging**: tracing subscriber setup driven by `LOG_*` environment
//!   variables

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{Result, WdpError};
