//! Common utilities for rust-ypmeteo
//!
//! This crate provides functionality shared by the driver library and the
//! `ypmeteo` binary: error handling, logging setup and test helpers for
//! synthesizing device packets.

pub mod error;
pub mod logging;
pub mod test_utils;

pub use error::{Error, Result};
pub use logging::{log_filter, setup_logging};
