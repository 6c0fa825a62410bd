//! # npc-cli
//!
//! Command-line interface for the NPC inference backend.
//!
//! ## Commands
//!
//! - `npcd serve` starts the HTTP API
//! - `npcd config` prints the effective configuration
//! - `npcd version` prints build info

pub mod commands;

pub use commands::Cli;
