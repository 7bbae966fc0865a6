//! mailproof CLI
//!
//! Command-line interface for generating localized emails and running
//! browser verification scenarios.

pub mod commands;
pub mod output;
