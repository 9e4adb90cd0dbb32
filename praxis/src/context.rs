//! Execution context: a tree of nodes recording everything a run did.
//!
//! Every agent call, iteration, tool dispatch, and plan step gets a node
//! with its input, output, error, and timings. A per-node data ledger and
//! an execution-wide ledger record key/value state as append-only entries,
//! so "what was the value of K at node N" stays answerable after the fact.
//!
//! The context is shared-readable: clones are cheap handles onto the same
//! tree, mutations take a write lock. It also carries the cancellation
//! signal observed at every suspension point.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use crate::error::AgentError;

/// Kind of an execution node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// The root of the execution tree.
    Root,
    /// An agent invocation.
    Agent,
    /// One reasoning iteration within an agent run.
    Iteration,
    /// A tool dispatch.
    Tool,
    /// A plan step execution.
    Step,
}

/// Operation recorded by a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOp {
    /// The key was set to the entry's value.
    Set,
    /// The key was deleted.
    Delete,
}

/// One append-only ledger entry.
///
/// The current value for a key is the most recent `Set` entry, or nothing
/// if the most recent entry is a `Delete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    /// The key this entry concerns.
    pub key: String,
    /// The value written; `Null` on deletes.
    pub value: Value,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
    /// Whether this entry sets or deletes the key.
    pub op: DataOp,
}

/// A node in the execution tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node id.
    pub id: Uuid,
    /// Parent node id; absent on the root.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_id: Option<Uuid>,
    /// Kind of work this node records.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Human-readable name (agent name, tool name, step id).
    pub name: String,
    /// JSON of the node's input.
    pub input: Value,
    /// JSON of the node's output, once set.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output: Option<Value>,
    /// Stringified error, if the node failed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    /// When the node was created.
    pub start_time: DateTime<Utc>,
    /// When the node's output or error was recorded.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Child nodes, in creation order.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<Node>,
    /// Per-node data ledger.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub data: Vec<DataEntry>,
    /// Free-form metadata.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub metadata: BTreeMap<String, String>,
}

impl Node {
    fn new(kind: NodeKind, name: impl Into<String>, input: Value, parent_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id,
            kind,
            name: name.into(),
            input,
            output: None,
            error: None,
            start_time: Utc::now(),
            end_time: None,
            children: Vec::new(),
            data: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    fn find(&self, id: Uuid) -> Option<&Self> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    fn find_mut(&mut self, id: Uuid) -> Option<&mut Self> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }
}

/// Latest non-deleted value for `key` in an entry log.
fn current_value<'a>(entries: &'a [DataEntry], key: &str) -> Option<&'a Value> {
    let entry = entries.iter().rev().find(|e| e.key == key)?;
    match entry.op {
        DataOp::Set => Some(&entry.value),
        DataOp::Delete => None,
    }
}

fn set_entry(key: &str, value: Value) -> DataEntry {
    DataEntry {
        key: key.to_owned(),
        value,
        timestamp: Utc::now(),
        op: DataOp::Set,
    }
}

fn delete_entry(key: &str) -> DataEntry {
    DataEntry {
        key: key.to_owned(),
        value: Value::Null,
        timestamp: Utc::now(),
        op: DataOp::Delete,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ContextState {
    root: Node,
    current_id: Uuid,
    execution_data_ledger: Vec<DataEntry>,
}

struct ContextInner {
    state: RwLock<ContextState>,
    cancelled: AtomicBool,
    deadline: Mutex<Option<Instant>>,
}

/// Shared handle onto an execution tree.
///
/// Clones are cheap and point at the same tree; the handle also carries
/// the cancellation flag and optional deadline that every suspension
/// point observes through [`checkpoint`](Self::checkpoint).
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("ExecutionContext")
            .field("root", &state.root.name)
            .field("current_id", &state.current_id)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    /// Create a context with a fresh root node.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let root = Node::new(NodeKind::Root, name, Value::Null, None);
        let current_id = root.id;
        Self {
            inner: Arc::new(ContextInner {
                state: RwLock::new(ContextState {
                    root,
                    current_id,
                    execution_data_ledger: Vec::new(),
                }),
                cancelled: AtomicBool::new(false),
                deadline: Mutex::new(None),
            }),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ContextState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ContextState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Id of the root node.
    #[must_use]
    pub fn root_id(&self) -> Uuid {
        self.read().root.id
    }

    /// Id of the current node.
    #[must_use]
    pub fn current_id(&self) -> Uuid {
        self.read().current_id
    }

    /// Snapshot of a node by id.
    #[must_use]
    pub fn node(&self, id: Uuid) -> Option<Node> {
        self.read().root.find(id).cloned()
    }

    /// Create a child node and return its id.
    ///
    /// The parent defaults to the current node. Fails when the parent id
    /// is not in the tree or the input cannot be serialized.
    pub fn create_child_node(
        &self,
        parent: Option<Uuid>,
        kind: NodeKind,
        name: impl Into<String>,
        input: impl Serialize,
    ) -> Result<Uuid, AgentError> {
        let input = serde_json::to_value(input)?;
        let mut state = self.write();
        let parent_id = parent.unwrap_or(state.current_id);
        let parent_node = state
            .root
            .find_mut(parent_id)
            .ok_or_else(|| AgentError::configuration(format!("unknown parent node: {parent_id}")))?;
        let node = Node::new(kind, name, input, Some(parent_id));
        let id = node.id;
        parent_node.children.push(node);
        Ok(id)
    }

    /// Select the current node. Fails when the id is not in the tree.
    pub fn set_current_node(&self, id: Uuid) -> Result<(), AgentError> {
        let mut state = self.write();
        if state.root.find(id).is_none() {
            return Err(AgentError::configuration(format!("unknown node: {id}")));
        }
        state.current_id = id;
        Ok(())
    }

    /// Record a node's output and stamp its end time.
    pub fn set_output(&self, id: Uuid, output: impl Serialize) -> Result<(), AgentError> {
        let output = serde_json::to_value(output)?;
        let mut state = self.write();
        let node = state
            .root
            .find_mut(id)
            .ok_or_else(|| AgentError::configuration(format!("unknown node: {id}")))?;
        node.output = Some(output);
        node.end_time = Some(Utc::now());
        Ok(())
    }

    /// Typed view of a node's output.
    #[must_use]
    pub fn output_of<T: DeserializeOwned>(&self, id: Uuid) -> Option<T> {
        let state = self.read();
        let output = state.root.find(id)?.output.clone()?;
        serde_json::from_value(output).ok()
    }

    /// Record a node's error and stamp its end time.
    pub fn set_error(&self, id: Uuid, error: &impl std::fmt::Display) -> Result<(), AgentError> {
        let mut state = self.write();
        let node = state
            .root
            .find_mut(id)
            .ok_or_else(|| AgentError::configuration(format!("unknown node: {id}")))?;
        node.error = Some(error.to_string());
        node.end_time = Some(Utc::now());
        Ok(())
    }

    /// Attach a metadata entry to a node.
    pub fn set_metadata(
        &self,
        id: Uuid,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), AgentError> {
        let mut state = self.write();
        let node = state
            .root
            .find_mut(id)
            .ok_or_else(|| AgentError::configuration(format!("unknown node: {id}")))?;
        node.metadata.insert(key.into(), value.into());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Per-node data ledger
    // ------------------------------------------------------------------

    /// Append a `Set` entry to a node's ledger.
    pub fn set_data(
        &self,
        id: Uuid,
        key: &str,
        value: impl Serialize,
    ) -> Result<(), AgentError> {
        let value = serde_json::to_value(value)?;
        let mut state = self.write();
        let node = state
            .root
            .find_mut(id)
            .ok_or_else(|| AgentError::configuration(format!("unknown node: {id}")))?;
        node.data.push(set_entry(key, value));
        Ok(())
    }

    /// Latest non-deleted value for `key` in a node's ledger.
    #[must_use]
    pub fn get_data<T: DeserializeOwned>(&self, id: Uuid, key: &str) -> Option<T> {
        let state = self.read();
        let node = state.root.find(id)?;
        current_value(&node.data, key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Append a `Delete` entry to a node's ledger.
    pub fn delete_data(&self, id: Uuid, key: &str) -> Result<(), AgentError> {
        let mut state = self.write();
        let node = state
            .root
            .find_mut(id)
            .ok_or_else(|| AgentError::configuration(format!("unknown node: {id}")))?;
        node.data.push(delete_entry(key));
        Ok(())
    }

    /// Full entry history for `key` in a node's ledger.
    #[must_use]
    pub fn data_history(&self, id: Uuid, key: &str) -> Vec<DataEntry> {
        let state = self.read();
        state.root.find(id).map_or_else(Vec::new, |node| {
            node.data.iter().filter(|e| e.key == key).cloned().collect()
        })
    }

    // ------------------------------------------------------------------
    // Execution-wide data ledger
    // ------------------------------------------------------------------

    /// Append a `Set` entry to the execution-wide ledger.
    pub fn set_execution_data(&self, key: &str, value: impl Serialize) -> Result<(), AgentError> {
        let value = serde_json::to_value(value)?;
        self.write().execution_data_ledger.push(set_entry(key, value));
        Ok(())
    }

    /// Latest non-deleted value for `key` in the execution-wide ledger.
    #[must_use]
    pub fn get_execution_data<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let state = self.read();
        current_value(&state.execution_data_ledger, key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Append a `Delete` entry to the execution-wide ledger.
    pub fn delete_execution_data(&self, key: &str) {
        self.write().execution_data_ledger.push(delete_entry(key));
    }

    /// Full entry history for `key` in the execution-wide ledger.
    #[must_use]
    pub fn execution_data_history(&self, key: &str) -> Vec<DataEntry> {
        self.read()
            .execution_data_ledger
            .iter()
            .filter(|e| e.key == key)
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------

    /// Signal cancellation to every holder of this context.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was signalled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Arm a deadline this far in the future; an earlier existing deadline
    /// is kept.
    pub fn set_deadline(&self, timeout: Duration) {
        let candidate = Instant::now() + timeout;
        let mut deadline = self
            .inner
            .deadline
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *deadline = Some(deadline.map_or(candidate, |d| d.min(candidate)));
    }

    /// Fail fast when cancellation or the deadline has fired.
    ///
    /// Called at every suspension point: before model calls, around tool
    /// batches, and per executor iteration.
    pub fn checkpoint(&self) -> Result<(), AgentError> {
        if self.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        let deadline = *self
            .inner
            .deadline
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(AgentError::DeadlineExceeded);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Serialize the full tree, the current selection, and the
    /// execution-wide ledger.
    pub fn serialize(&self) -> Result<Vec<u8>, AgentError> {
        Ok(serde_json::to_vec(&*self.read())?)
    }

    /// Reconstruct a context from [`serialize`](Self::serialize) output.
    ///
    /// The current node is reselected by id, falling back to the root when
    /// the recorded id is missing.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, AgentError> {
        let mut state: ContextState = serde_json::from_slice(bytes)?;
        if state.root.find(state.current_id).is_none() {
            state.current_id = state.root.id;
        }
        Ok(Self {
            inner: Arc::new(ContextInner {
                state: RwLock::new(state),
                cancelled: AtomicBool::new(false),
                deadline: Mutex::new(None),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod tree {
        use super::*;

        #[test]
        fn child_defaults_to_current() {
            let ctx = ExecutionContext::new("run");
            let agent = ctx
                .create_child_node(None, NodeKind::Agent, "planner", json!({"objective": "x"}))
                .expect("child");
            ctx.set_current_node(agent).expect("select");

            let tool = ctx
                .create_child_node(None, NodeKind::Tool, "search", Value::Null)
                .expect("grandchild");

            let node = ctx.node(tool).expect("node");
            assert_eq!(node.parent_id, Some(agent));
            assert_eq!(node.kind, NodeKind::Tool);
        }

        #[test]
        fn unknown_parent_fails() {
            let ctx = ExecutionContext::new("run");
            let result =
                ctx.create_child_node(Some(Uuid::new_v4()), NodeKind::Tool, "x", Value::Null);
            assert!(result.is_err());
        }

        #[test]
        fn set_current_validates_membership() {
            let ctx = ExecutionContext::new("run");
            assert!(ctx.set_current_node(Uuid::new_v4()).is_err());
            assert!(ctx.set_current_node(ctx.root_id()).is_ok());
        }

        #[test]
        fn output_stamps_end_time() {
            let ctx = ExecutionContext::new("run");
            let id = ctx
                .create_child_node(None, NodeKind::Tool, "t", Value::Null)
                .expect("child");
            ctx.set_output(id, json!({"ok": true})).expect("output");

            let node = ctx.node(id).expect("node");
            assert!(node.end_time.is_some());
            assert_eq!(ctx.output_of::<Value>(id), Some(json!({"ok": true})));
        }

        #[test]
        fn error_is_stringified() {
            let ctx = ExecutionContext::new("run");
            let id = ctx
                .create_child_node(None, NodeKind::Tool, "t", Value::Null)
                .expect("child");
            ctx.set_error(id, &"boom").expect("error");
            let node = ctx.node(id).expect("node");
            assert_eq!(node.error.as_deref(), Some("boom"));
            assert!(node.end_time.is_some());
        }
    }

    mod ledger {
        use super::*;

        #[test]
        fn latest_set_wins() {
            let ctx = ExecutionContext::new("run");
            let id = ctx.root_id();
            ctx.set_data(id, "k", 1).expect("set");
            ctx.set_data(id, "k", 2).expect("set");
            assert_eq!(ctx.get_data::<i64>(id, "k"), Some(2));
        }

        #[test]
        fn delete_hides_value_but_keeps_history() {
            let ctx = ExecutionContext::new("run");
            let id = ctx.root_id();
            ctx.set_data(id, "k", "v").expect("set");
            ctx.delete_data(id, "k").expect("delete");

            assert_eq!(ctx.get_data::<String>(id, "k"), None);
            let history = ctx.data_history(id, "k");
            assert_eq!(history.len(), 2);
            assert_eq!(history[1].op, DataOp::Delete);
        }

        #[test]
        fn set_after_delete_restores() {
            let ctx = ExecutionContext::new("run");
            let id = ctx.root_id();
            ctx.set_data(id, "k", 1).expect("set");
            ctx.delete_data(id, "k").expect("delete");
            ctx.set_data(id, "k", 3).expect("set");
            assert_eq!(ctx.get_data::<i64>(id, "k"), Some(3));
        }

        #[test]
        fn execution_ledger_is_shared_across_nodes() {
            let ctx = ExecutionContext::new("run");
            ctx.set_execution_data("run::phase", "planning").expect("set");

            let clone = ctx.clone();
            assert_eq!(
                clone.get_execution_data::<String>("run::phase"),
                Some("planning".to_string())
            );

            clone.delete_execution_data("run::phase");
            assert_eq!(ctx.get_execution_data::<String>("run::phase"), None);
        }
    }

    mod cancellation {
        use super::*;

        #[test]
        fn cancel_trips_checkpoint() {
            let ctx = ExecutionContext::new("run");
            assert!(ctx.checkpoint().is_ok());
            ctx.cancel();
            assert!(matches!(ctx.checkpoint(), Err(AgentError::Cancelled)));
        }

        #[test]
        fn expired_deadline_trips_checkpoint() {
            let ctx = ExecutionContext::new("run");
            ctx.set_deadline(Duration::from_millis(0));
            std::thread::sleep(Duration::from_millis(2));
            assert!(matches!(
                ctx.checkpoint(),
                Err(AgentError::DeadlineExceeded)
            ));
        }

        #[test]
        fn earlier_deadline_is_kept() {
            let ctx = ExecutionContext::new("run");
            ctx.set_deadline(Duration::from_millis(0));
            ctx.set_deadline(Duration::from_secs(3600));
            std::thread::sleep(Duration::from_millis(2));
            assert!(ctx.checkpoint().is_err());
        }
    }

    mod serde_roundtrip {
        use super::*;

        #[test]
        fn tree_and_ledgers_survive() {
            let ctx = ExecutionContext::new("run");
            let agent = ctx
                .create_child_node(None, NodeKind::Agent, "runner", json!({"step": "s1"}))
                .expect("child");
            ctx.set_current_node(agent).expect("select");
            ctx.set_output(agent, "done").expect("output");
            ctx.set_data(agent, "attempts", 2).expect("data");
            ctx.set_execution_data("objective", "ship it").expect("exec data");

            let bytes = ctx.serialize().expect("serialize");
            let restored = ExecutionContext::deserialize(&bytes).expect("deserialize");

            assert_eq!(restored.current_id(), agent);
            assert_eq!(restored.get_data::<i64>(agent, "attempts"), Some(2));
            assert_eq!(
                restored.get_execution_data::<String>("objective"),
                Some("ship it".to_string())
            );
            assert_eq!(restored.output_of::<String>(agent), Some("done".to_string()));
        }

        #[test]
        fn missing_current_falls_back_to_root() {
            let ctx = ExecutionContext::new("run");
            let bytes = ctx.serialize().expect("serialize");

            let mut doc: Value = serde_json::from_slice(&bytes).expect("parse");
            doc["current_id"] = json!(Uuid::new_v4());
            let bytes = serde_json::to_vec(&doc).expect("re-encode");

            let restored = ExecutionContext::deserialize(&bytes).expect("deserialize");
            assert_eq!(restored.current_id(), restored.root_id());
        }
    }
}
