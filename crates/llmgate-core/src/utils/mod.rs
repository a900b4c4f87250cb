//! Shared utility helpers.

pub mod json;
