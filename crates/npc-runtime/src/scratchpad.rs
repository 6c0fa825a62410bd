//! Per-NPC key/value memory exposed to the model as global tools.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use npc_core::{NpcError, ParameterType, Result, ToolArgs, ToolDeclaration, ToolOutcome};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;

use crate::registry::ToolRegistry;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    timestamp: DateTime<Utc>,
}

type Pad = Arc<RwLock<BTreeMap<String, Entry>>>;

/// Memory for every NPC. The outer lock only guards pad lookup, so NPCs
/// working on their own pads never contend.
#[derive(Default)]
pub struct ScratchpadStorage {
    pads: RwLock<HashMap<String, Pad>>,
}

/// One entry as exposed on the debug console.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySnapshot {
    pub key: String,
    pub value: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PadSnapshot {
    pub entries: Vec<EntrySnapshot>,
    pub count: usize,
}

fn rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn string_arg<'a>(tool: &str, args: &'a ToolArgs, name: &str) -> Result<&'a str> {
    match args.get(name).and_then(|v| v.as_str()) {
        Some(s) => Ok(s),
        None => Err(NpcError::invalid_arguments(tool, format!("{name} must be a string"))),
    }
}

fn key_arg<'a>(tool: &str, args: &'a ToolArgs) -> Result<&'a str> {
    match args.get("key").and_then(|v| v.as_str()) {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(NpcError::invalid_arguments(
            tool,
            "key must be a non-empty string",
        )),
    }
}

fn not_found(key: &str) -> ToolOutcome {
    ToolOutcome::failure(format!("No memory found with key: {key}"))
}

impl ScratchpadStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `write_scratchpad`, `read_scratchpad`, `list_scratchpad` and
    /// `delete_scratchpad` into `registry`.
    pub fn register_tools(self: &Arc<Self>, registry: &mut ToolRegistry) -> Result<()> {
        let storage = Arc::clone(self);
        registry.register(
            ToolDeclaration::new(
                "write_scratchpad",
                "Store a memory with a key and value in your persistent scratchpad",
            )
            .with_parameter("key", ParameterType::String, "The key to store the memory under", true)
            .with_parameter("value", ParameterType::String, "The value to store", true),
            move |npc: &str, args: &ToolArgs| storage.write(npc, args),
        )?;

        let storage = Arc::clone(self);
        registry.register(
            ToolDeclaration::new(
                "read_scratchpad",
                "Retrieve a specific memory by its key from your scratchpad",
            )
            .with_parameter("key", ParameterType::String, "The key of the memory to retrieve", true),
            move |npc: &str, args: &ToolArgs| storage.read(npc, args),
        )?;

        let storage = Arc::clone(self);
        registry.register(
            ToolDeclaration::new("list_scratchpad", "List all memories stored in your scratchpad"),
            move |npc: &str, _args: &ToolArgs| Ok(storage.list(npc)),
        )?;

        let storage = Arc::clone(self);
        registry.register(
            ToolDeclaration::new(
                "delete_scratchpad",
                "Delete a specific memory by its key from your scratchpad",
            )
            .with_parameter("key", ParameterType::String, "The key of the memory to delete", true),
            move |npc: &str, args: &ToolArgs| storage.delete(npc, args),
        )?;

        Ok(())
    }

    fn pad(&self, npc_id: &str) -> Option<Pad> {
        self.pads.read().get(npc_id).cloned()
    }

    fn pad_or_create(&self, npc_id: &str) -> Pad {
        Arc::clone(self.pads.write().entry(npc_id.to_string()).or_default())
    }

    pub fn write(&self, npc_id: &str, args: &ToolArgs) -> Result<ToolOutcome> {
        let key = key_arg("write_scratchpad", args)?;
        let value = string_arg("write_scratchpad", args, "value")?;

        let pad = self.pad_or_create(npc_id);
        pad.write().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                timestamp: Utc::now(),
            },
        );

        Ok(ToolOutcome::ok(format!("Stored memory: {key} = {value}"))
            .with_data(json!({ "key": key, "value": value })))
    }

    pub fn read(&self, npc_id: &str, args: &ToolArgs) -> Result<ToolOutcome> {
        let key = key_arg("read_scratchpad", args)?;
        let Some(pad) = self.pad(npc_id) else {
            return Ok(not_found(key));
        };
        let pad = pad.read();
        let Some(entry) = pad.get(key) else {
            return Ok(not_found(key));
        };

        Ok(ToolOutcome::ok(format!("{key}: {}", entry.value)).with_data(json!({
            "key": key,
            "value": entry.value,
            "timestamp": rfc3339(&entry.timestamp),
        })))
    }

    pub fn list(&self, npc_id: &str) -> ToolOutcome {
        let Some(pad) = self.pad(npc_id) else {
            return ToolOutcome::ok("No memories stored");
        };
        let pad = pad.read();
        if pad.is_empty() {
            return ToolOutcome::ok("No memories stored");
        }

        let mut message = String::from("Stored memories:\n");
        let mut memories = Vec::with_capacity(pad.len());
        for (key, entry) in pad.iter() {
            message.push_str(&format!("- {key}: {}\n", entry.value));
            memories.push(json!({
                "key": key,
                "value": entry.value,
                "timestamp": rfc3339(&entry.timestamp),
            }));
        }

        let count = memories.len();
        ToolOutcome::ok(message).with_data(json!({
            "memories": memories,
            "count": count,
        }))
    }

    pub fn delete(&self, npc_id: &str, args: &ToolArgs) -> Result<ToolOutcome> {
        let key = key_arg("delete_scratchpad", args)?;
        let Some(pad) = self.pad(npc_id) else {
            return Ok(not_found(key));
        };
        if pad.write().remove(key).is_none() {
            return Ok(not_found(key));
        }

        Ok(ToolOutcome::ok(format!("Deleted memory with key: {key}"))
            .with_data(json!({ "key": key })))
    }

    /// Drop everything `npc_id` remembered. Returns whether it had a pad.
    pub fn remove(&self, npc_id: &str) -> bool {
        self.pads.write().remove(npc_id).is_some()
    }

    /// Every NPC's pad, for the debug console.
    pub fn snapshot(&self) -> BTreeMap<String, PadSnapshot> {
        let pads = self.pads.read();
        pads.iter()
            .map(|(npc_id, pad)| {
                let entries: Vec<EntrySnapshot> = pad
                    .read()
                    .iter()
                    .map(|(key, entry)| EntrySnapshot {
                        key: key.clone(),
                        value: entry.value.clone(),
                        timestamp: rfc3339(&entry.timestamp),
                    })
                    .collect();
                let count = entries.len();
                (npc_id.clone(), PadSnapshot { entries, count })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use npc_core::ToolInvocation;

    fn args(value: serde_json::Value) -> ToolArgs {
        match value {
            serde_json::Value::Object(map) => map,
            _ => ToolArgs::new(),
        }
    }

    #[test]
    fn test_write_then_read() {
        let storage = ScratchpadStorage::new();
        let out = storage
            .write("npc-1", &args(json!({"key": "mood", "value": "grumpy"})))
            .unwrap();
        assert!(out.success);
        assert_eq!(out.message, "Stored memory: mood = grumpy");

        let out = storage.read("npc-1", &args(json!({"key": "mood"}))).unwrap();
        assert!(out.success);
        assert_eq!(out.message, "mood: grumpy");
        assert_eq!(out.data.unwrap()["value"], "grumpy");
    }

    #[test]
    fn test_pads_are_per_npc() {
        let storage = ScratchpadStorage::new();
        storage
            .write("npc-1", &args(json!({"key": "secret", "value": "x"})))
            .unwrap();
        let out = storage.read("npc-2", &args(json!({"key": "secret"}))).unwrap();
        assert!(!out.success);
        assert_eq!(out.message, "No memory found with key: secret");
    }

    #[test]
    fn test_missing_key_is_failed_outcome() {
        let storage = ScratchpadStorage::new();
        storage
            .write("npc-1", &args(json!({"key": "a", "value": "1"})))
            .unwrap();
        let out = storage.read("npc-1", &args(json!({"key": "b"}))).unwrap();
        assert!(!out.success);
        let out = storage.delete("npc-1", &args(json!({"key": "b"}))).unwrap();
        assert!(!out.success);
    }

    #[test]
    fn test_invalid_key_is_error() {
        let storage = ScratchpadStorage::new();
        let err = storage
            .write("npc-1", &args(json!({"key": "", "value": "v"})))
            .unwrap_err();
        assert!(err.to_string().contains("key must be a non-empty string"));
        assert!(storage.read("npc-1", &args(json!({"key": 7}))).is_err());
        assert!(
            storage
                .write("npc-1", &args(json!({"key": "k", "value": 3})))
                .is_err()
        );
    }

    #[test]
    fn test_list_and_delete() {
        let storage = ScratchpadStorage::new();
        assert_eq!(storage.list("npc-1").message, "No memories stored");

        storage
            .write("npc-1", &args(json!({"key": "b", "value": "2"})))
            .unwrap();
        storage
            .write("npc-1", &args(json!({"key": "a", "value": "1"})))
            .unwrap();

        let out = storage.list("npc-1");
        assert_eq!(out.message, "Stored memories:\n- a: 1\n- b: 2\n");
        assert_eq!(out.data.unwrap()["count"], 2);

        let out = storage.delete("npc-1", &args(json!({"key": "a"}))).unwrap();
        assert_eq!(out.message, "Deleted memory with key: a");
        assert_eq!(storage.list("npc-1").data.unwrap()["count"], 1);
    }

    #[test]
    fn test_remove_drops_only_that_pad() {
        let storage = ScratchpadStorage::new();
        storage
            .write("npc-1", &args(json!({"key": "mood", "value": "grumpy"})))
            .unwrap();
        storage
            .write("npc-2", &args(json!({"key": "mood", "value": "cheerful"})))
            .unwrap();

        assert!(storage.remove("npc-1"));
        assert!(!storage.remove("npc-1"));

        let snapshot = storage.snapshot();
        assert!(!snapshot.contains_key("npc-1"));
        assert_eq!(snapshot["npc-2"].count, 1);
        assert!(!storage.read("npc-1", &args(json!({"key": "mood"}))).unwrap().success);
    }

    #[test]
    fn test_snapshot() {
        let storage = ScratchpadStorage::new();
        storage
            .write("npc-1", &args(json!({"key": "k", "value": "v"})))
            .unwrap();
        let snapshot = storage.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["npc-1"].count, 1);
        assert_eq!(snapshot["npc-1"].entries[0].key, "k");
    }

    #[tokio::test]
    async fn test_registered_tools_run_through_registry() {
        let storage = Arc::new(ScratchpadStorage::new());
        let mut registry = ToolRegistry::new();
        storage.register_tools(&mut registry).unwrap();
        assert_eq!(registry.len(), 5);

        let write = ToolInvocation::new("write_scratchpad", args(json!({"key": "k", "value": "v"})));
        assert!(registry.execute("npc-1", &write).await.unwrap().success);

        let list = ToolInvocation::new("list_scratchpad", ToolArgs::new());
        let out = registry.execute("npc-1", &list).await.unwrap();
        assert_eq!(out.data.unwrap()["count"], 1);

        // Registering twice collides on names.
        assert!(storage.register_tools(&mut registry).is_err());
    }
}
