use std::collections::BTreeMap;

use npc_core::{Npc, NpcError, NpcId, Result, new_npc_id};
use parking_lot::RwLock;

/// In-memory NPC identities, keyed by generated id.
#[derive(Default)]
pub struct NpcStore {
    npcs: RwLock<BTreeMap<NpcId, Npc>>,
}

impl NpcStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new NPC and return its id.
    pub fn register(&self, name: impl Into<String>, background_story: impl Into<String>) -> NpcId {
        let id = new_npc_id();
        self.npcs
            .write()
            .insert(id.clone(), Npc::new(name, background_story));
        id
    }

    pub fn get(&self, id: &str) -> Result<Npc> {
        self.npcs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| NpcError::NpcNotFound(id.to_string()))
    }

    /// Copy of every registered NPC.
    pub fn list(&self) -> BTreeMap<NpcId, Npc> {
        self.npcs.read().clone()
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.npcs
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| NpcError::NpcNotFound(id.to_string()))
    }

    pub fn count(&self) -> usize {
        self.npcs.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_get_delete() {
        let store = NpcStore::new();
        let id = store.register("Elara", "A wandering herbalist.");

        let npc = store.get(&id).unwrap();
        assert_eq!(npc.name, "Elara");
        assert_eq!(store.count(), 1);

        store.delete(&id).unwrap();
        assert_eq!(store.count(), 0);
        let err = store.get(&id).unwrap_err();
        assert_eq!(err.to_string(), format!("NPC with ID {id} not found"));
        assert!(store.delete(&id).is_err());
    }

    #[test]
    fn test_list_is_a_copy() {
        let store = NpcStore::new();
        let a = store.register("A", "");
        let b = store.register("B", "");
        assert_ne!(a, b);

        let listed = store.list();
        store.delete(&a).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[&b].name, "B");
    }
}
