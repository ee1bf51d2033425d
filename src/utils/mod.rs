//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `relaymesh` application.
//!
//! It holds the error types shared by the codec, the broker and the server,
//! and the logging bootstrap used by the binary and by tests.

pub mod error;
pub mod logging;
