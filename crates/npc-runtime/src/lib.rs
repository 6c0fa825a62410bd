//! # npc-runtime
//!
//! Everything one NPC tick needs between the transport layer and the LLM:
//!
//! ```text
//!   Perception ──► Orchestrator ──► LlmProvider
//!                      │
//!                      ▼
//!               ToolProvider ◄── CombinedRegistry ◄── SessionManager
//!                      │
//!                      ▼
//!                ToolRegistry (continue_thinking, scratchpad)
//! ```

pub mod combined;
pub mod npc_store;
pub mod orchestrator;
pub mod prompt;
pub mod registry;
pub mod scratchpad;
pub mod session;

pub use combined::CombinedRegistry;
pub use npc_store::NpcStore;
pub use orchestrator::{InferenceRound, Orchestrator, TickInput, TickResult, ToolReport};
pub use registry::{ToolHandler, ToolRegistry};
pub use scratchpad::ScratchpadStorage;
pub use session::{Session, SessionManager};
