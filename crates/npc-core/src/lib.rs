//! # npc-core
//!
//! Core types, traits, and primitives for the NPC inference backend.
//! This crate defines the shared vocabulary used by every other crate in the workspace:
//! tool declarations and invocations, tick inputs, and the unified error type.

pub mod error;
pub mod knowledge;
pub mod tool;
pub mod types;

pub use error::{NpcError, Result};
pub use knowledge::{Edge, KnowledgeGraph, Node};
pub use tool::{
    CONTINUE_THINKING, ParameterType, ToolArgs, ToolDeclaration, ToolInvocation, ToolOutcome,
    ToolParameter, ToolProvider,
};
pub use types::*;
