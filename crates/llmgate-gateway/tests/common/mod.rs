//! Common test utilities.
//!
//! This module provides a gateway running on an ephemeral port and helpers
//! for byte-level inspection of raw HTTP responses.

pub mod gateway;
pub mod raw;
