//! Utility modules.
//!
//! Contains validation and formatting helpers.

pub mod parsing;
