use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::knowledge::KnowledgeGraph;

/// Unique identifier for a registered NPC.
pub type NpcId = String;

/// Unique identifier for a game session.
pub type SessionId = String;

/// Generate a fresh NPC identifier.
pub fn new_npc_id() -> NpcId {
    Uuid::new_v4().to_string()
}

/// Identity of a non-player character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Npc {
    pub name: String,
    pub background_story: String,
}

impl Npc {
    pub fn new(name: impl Into<String>, background_story: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            background_story: background_story.into(),
        }
    }
}

/// Something the NPC can currently perceive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surrounding {
    pub name: String,
    pub description: String,
}

impl Surrounding {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Something that happened since the previous tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvent {
    pub event_type: String,
    pub event_description: String,
}

impl TickEvent {
    pub fn new(event_type: impl Into<String>, event_description: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            event_description: event_description.into(),
        }
    }
}

/// Perceptual snapshot for one tick, as decoded from the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Perception {
    #[serde(default)]
    pub surroundings: Vec<Surrounding>,
    #[serde(default)]
    pub events: Vec<TickEvent>,
    #[serde(default)]
    pub knowledge_graph: KnowledgeGraph,
    /// How much of the knowledge graph to render; 0 renders an empty section.
    #[serde(default)]
    pub knowledge_graph_depth: u32,
}
