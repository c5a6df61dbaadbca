//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration from the
//! platform-appropriate directory, falls back to the protocol defaults on
//! first run, and writes the defaults out so the user has a file to edit.

pub mod config;
