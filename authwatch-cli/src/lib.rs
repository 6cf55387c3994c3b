//! Authwatch CLI library.
//!
//! This library exposes the argument parser, command handlers, and output
//! rendering for integration testing. In production, `authwatch-cli` is
//! used as a binary (main.rs).

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
