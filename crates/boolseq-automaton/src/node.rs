//! Nodes: one dynamical unit and its memoized history.
//!
//! ```text
//! Node = {
//!     history:       Vec<bool>,  // history[0] == initial_state, grows lazily
//!     saved_history: Vec<bool>,  // append-only, spans many runs
//! }
//! ```
//!
//! A node only stores values. Computing new values needs the other nodes of
//! the network, so `state_at` / `buffer_up_to` live on
//! [`Network`](crate::Network), which owns every node in one arena.

use std::sync::Arc;

use boolseq_core::{FunctionId, NodeHandle, NodeIdentity, OutputChannel};
use serde::{Deserialize, Serialize};

use crate::error::{AutomatonError, AutomatonResult};
use crate::vertex_function::VertexFunction;

/// Which function a node evaluates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionBinding {
    /// The node's private latch (`<label>_default`).
    Default(Arc<VertexFunction>),
    /// A named function owned by the network.
    Named(FunctionId),
}

/// Plain copy of a node's histories, for callers that want owned data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHistory {
    pub identity: NodeIdentity,
    pub channel: Option<OutputChannel>,
    pub history: Vec<bool>,
    pub saved_history: Vec<bool>,
}

/// A single boolean node.
#[derive(Debug, Clone)]
pub struct Node {
    identity: NodeIdentity,
    initial_state: bool,
    function: FunctionBinding,
    inputs: Vec<NodeHandle>,
    history: Vec<bool>,
    saved_history: Vec<bool>,
    channel: Option<OutputChannel>,
    /// Set while the network is appending to `history`.
    extending: bool,
}

impl Node {
    /// Create a node latched to itself. `handle` is the node's own arena slot.
    pub fn new(identity: NodeIdentity, initial_state: bool, handle: NodeHandle) -> Self {
        let latch = VertexFunction::latch(&identity.label);
        Self {
            identity,
            initial_state,
            function: FunctionBinding::Default(Arc::new(latch)),
            inputs: vec![handle],
            history: vec![initial_state],
            saved_history: Vec::new(),
            channel: None,
            extending: false,
        }
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn label(&self) -> &str {
        &self.identity.label
    }

    pub fn initial_state(&self) -> bool {
        self.initial_state
    }

    /// Takes effect at the next [`clear`](Self::clear).
    pub fn set_initial_state(&mut self, value: bool) {
        self.initial_state = value;
    }

    pub fn function(&self) -> &FunctionBinding {
        &self.function
    }

    pub fn inputs(&self) -> &[NodeHandle] {
        &self.inputs
    }

    pub(crate) fn bind(&mut self, function: FunctionBinding, inputs: Vec<NodeHandle>) {
        self.function = function;
        self.inputs = inputs;
    }

    pub fn channel(&self) -> Option<OutputChannel> {
        self.channel
    }

    pub fn set_channel(&mut self, channel: Option<OutputChannel>) {
        self.channel = channel;
    }

    /// Silent nodes never produce sound events.
    pub fn is_silent(&self) -> bool {
        self.channel.is_none()
    }

    /// Every computed value, starting at step 0.
    pub fn history(&self) -> &[bool] {
        &self.history
    }

    pub fn saved_history(&self) -> &[bool] {
        &self.saved_history
    }

    /// Memoized value at `step`, if already computed.
    pub fn cached(&self, step: usize) -> Option<bool> {
        self.history.get(step).copied()
    }

    /// Last computed step.
    pub fn buffered_to(&self) -> usize {
        self.history.len() - 1
    }

    pub fn saved_state_at(&self, step: usize) -> Option<bool> {
        self.saved_history.get(step).copied()
    }

    /// Number of `true` values among the buffered steps.
    pub fn true_count(&self) -> usize {
        self.history.iter().filter(|v| **v).count()
    }

    pub(crate) fn is_extending(&self) -> bool {
        self.extending
    }

    pub(crate) fn set_extending(&mut self, extending: bool) {
        self.extending = extending;
    }

    pub(crate) fn push(&mut self, value: bool) {
        self.history.push(value);
    }

    /// Drop everything but step 0, which becomes the current initial state.
    pub fn clear(&mut self) {
        self.history.clear();
        self.history.push(self.initial_state);
    }

    /// Append one segment to the saved history.
    ///
    /// Silent segments append `duration` copies of `false`; otherwise
    /// `history[0..duration]` is appended and must already be buffered.
    pub fn save_segment(&mut self, duration: usize, silent: bool) -> AutomatonResult<()> {
        if silent {
            self.saved_history
                .extend(std::iter::repeat(false).take(duration));
            return Ok(());
        }

        if duration > self.history.len() {
            return Err(AutomatonError::NotBuffered {
                label: self.identity.label.clone(),
                needed: duration,
                available: self.history.len(),
            });
        }
        self.saved_history.extend_from_slice(&self.history[..duration]);
        Ok(())
    }

    /// Drop the saved history.
    pub fn clear_saved(&mut self) {
        self.saved_history.clear();
    }

    pub fn to_history(&self) -> NodeHistory {
        NodeHistory {
            identity: self.identity.clone(),
            channel: self.channel,
            history: self.history.clone(),
            saved_history: self.saved_history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(initial: bool) -> Node {
        Node::new(NodeIdentity::new("net", "a", 0), initial, NodeHandle(0))
    }

    #[test]
    fn test_new_node_is_self_latched() {
        let n = node(true);
        assert_eq!(n.history(), &[true]);
        assert_eq!(n.inputs(), &[NodeHandle(0)]);
        match n.function() {
            FunctionBinding::Default(f) => assert_eq!(f.name(), "a_default"),
            other => panic!("Expected default latch, got {other:?}"),
        }
        assert!(n.is_silent());
    }

    #[test]
    fn test_clear_uses_new_initial_state() {
        let mut n = node(false);
        n.push(true);
        n.push(true);
        n.set_initial_state(true);

        // Not applied until clear.
        assert_eq!(n.cached(0), Some(false));

        n.clear();
        assert_eq!(n.history(), &[true]);
        assert_eq!(n.buffered_to(), 0);
    }

    #[test]
    fn test_save_segment() {
        let mut n = node(true);
        n.push(false);
        n.push(true);

        n.save_segment(2, false).unwrap();
        n.save_segment(3, true).unwrap();
        assert_eq!(n.saved_history(), &[true, false, false, false, false]);

        let err = n.save_segment(5, false).unwrap_err();
        assert!(matches!(err, AutomatonError::NotBuffered { needed: 5, available: 3, .. }));
    }

    #[test]
    fn test_true_count() {
        let mut n = node(true);
        n.push(false);
        n.push(true);
        assert_eq!(n.true_count(), 2);
    }
}
