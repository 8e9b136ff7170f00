//! Boolean network that owns nodes, functions and start states.
//!
//! The `Network` is the main entry point for building a network and
//! computing its evolution. Nodes live in one arena addressed by
//! [`NodeHandle`]; input links are handles, so cycles in the input graph
//! carry no ownership.

use std::collections::HashMap;
use std::sync::Arc;

use boolseq_core::{FunctionId, NodeHandle, NodeIdentity, NodeState, OutputChannel, Snapshot};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{EvaluationMode, NetworkConfig};
use crate::error::{AutomatonError, AutomatonResult, NameKind};
use crate::node::{FunctionBinding, Node, NodeHistory};
use crate::registry::IdentityRegistry;
use crate::start_state::StartState;
use crate::vertex_function::{RuleRow, StateSource, VertexFunction};

/// Output of one node over one rendered segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub identity: NodeIdentity,
    /// `None` means the node never sounds.
    pub channel: Option<OutputChannel>,
    /// One value per step of the segment.
    pub steps: Vec<bool>,
}

/// What a network produced for `[offset, offset + duration)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedSegment {
    pub network: String,
    pub instrument: u8,
    /// Absolute step at which this segment starts.
    pub offset: usize,
    pub duration: usize,
    /// Start state the segment was run from; `None` for a rest.
    pub start_state: Option<String>,
    pub resting: bool,
    pub voices: Vec<Voice>,
}

impl RenderedSegment {
    /// Voices that have an output channel.
    pub fn audible_voices(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter().filter(|v| v.channel.is_some())
    }
}

/// Statistics about a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkStats {
    pub node_count: usize,
    pub audible_count: usize,
    pub function_count: usize,
    pub start_state_count: usize,
    /// Network-level buffered horizon.
    pub buffered_to: usize,
    /// Longest saved history across nodes.
    pub saved_steps: usize,
}

/// A boolean network.
#[derive(Debug, Clone)]
pub struct Network {
    name: String,
    config: NetworkConfig,
    nodes: Vec<Node>,
    labels: HashMap<String, NodeHandle>,
    functions: Vec<Arc<VertexFunction>>,
    function_names: HashMap<String, FunctionId>,
    start_states: Vec<StartState>,
    instrument: u8,
    buffered_to: usize,
    resting: bool,
}

impl Network {
    /// Create an empty network with default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, NetworkConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(name: impl Into<String>, config: NetworkConfig) -> Self {
        Self {
            name: name.into(),
            config,
            nodes: Vec::new(),
            labels: HashMap::new(),
            functions: Vec::new(),
            function_names: HashMap::new(),
            start_states: Vec::new(),
            instrument: 0,
            buffered_to: 0,
            resting: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Add a node latched to itself. Clears all buffers.
    pub fn add_node(
        &mut self,
        registry: &mut IdentityRegistry,
        initial_state: bool,
        label: &str,
    ) -> AutomatonResult<NodeHandle> {
        if self.labels.contains_key(label) {
            return Err(AutomatonError::DuplicateIdentity {
                namespace: self.name.clone(),
                label: label.to_string(),
            });
        }
        let identity = registry.create(&self.name, label)?;
        let handle = NodeHandle(self.nodes.len());

        self.nodes.push(Node::new(identity, initial_state, handle));
        self.labels.insert(label.to_string(), handle);
        self.clear_all_buffers();

        debug!(network = %self.name, label, initial_state, "node_added");
        Ok(handle)
    }

    /// Register a named vertex function. Clears all buffers.
    pub fn add_vertex_function(
        &mut self,
        arity: usize,
        name: &str,
        argument_names: Vec<String>,
        default_output: bool,
    ) -> AutomatonResult<FunctionId> {
        if self.function_names.contains_key(name) {
            return Err(AutomatonError::duplicate(NameKind::Function, name));
        }
        if arity > self.config.max_arity {
            return Err(AutomatonError::ArityTooLarge {
                arity,
                max: self.config.max_arity,
            });
        }

        let function = VertexFunction::new(arity, name, argument_names, default_output)?;
        let id = FunctionId(self.functions.len());
        self.functions.push(Arc::new(function));
        self.function_names.insert(name.to_string(), id);
        self.clear_all_buffers();

        debug!(network = %self.name, function = name, arity, "vertex_function_added");
        Ok(id)
    }

    /// Mutable access to a named function for rule editing. Clears all
    /// buffers.
    fn function_mut(&mut self, name: &str) -> AutomatonResult<&mut VertexFunction> {
        let id = self.function_id(name)?;
        self.clear_all_buffers();
        Ok(Arc::make_mut(&mut self.functions[id.0]))
    }

    /// Set one concrete rule on a named function.
    pub fn set_rule(&mut self, function: &str, inputs: &[bool], output: bool) -> AutomatonResult<()> {
        self.function_mut(function)?.set_rule(inputs, output)
    }

    /// Expand and write wildcard rows on a named function, in order.
    pub fn set_rules(&mut self, function: &str, rows: &[RuleRow]) -> AutomatonResult<usize> {
        self.function_mut(function)?.set_rules(rows)
    }

    /// Bind a named function and its ordered inputs to a node.
    ///
    /// Nothing changes on failure.
    pub fn assign_function<S: AsRef<str>>(
        &mut self,
        node_label: &str,
        function_name: &str,
        input_labels: &[S],
    ) -> AutomatonResult<()> {
        let handle = self.handle_of(node_label)?;
        let id = self.function_id(function_name)?;
        let inputs = input_labels
            .iter()
            .map(|label| self.handle_of(label.as_ref()))
            .collect::<AutomatonResult<Vec<_>>>()?;

        let arity = self.functions[id.0].arity();
        if inputs.len() != arity {
            return Err(AutomatonError::ArityMismatch {
                context: format!("assigning '{function_name}' to '{node_label}'"),
                expected: arity,
                actual: inputs.len(),
            });
        }

        self.nodes[handle.0].bind(FunctionBinding::Named(id), inputs);
        self.clear_all_buffers();

        debug!(network = %self.name, node = node_label, function = function_name, "function_assigned");
        Ok(())
    }

    /// Register a named start state. Clears all buffers.
    pub fn add_start_state<S: AsRef<str>>(
        &mut self,
        name: &str,
        node_labels: &[S],
        value: bool,
    ) -> AutomatonResult<()> {
        if self.start_state(name).is_some() {
            return Err(AutomatonError::duplicate(NameKind::StartState, name));
        }

        let targets = self.resolve_identities(node_labels)?;
        self.start_states.push(StartState::new(name, targets, value));
        self.clear_all_buffers();
        Ok(())
    }

    /// Attach (or remove) a node's output channel.
    pub fn set_output_channel(
        &mut self,
        node_label: &str,
        channel: Option<OutputChannel>,
    ) -> AutomatonResult<()> {
        let handle = self.handle_of(node_label)?;
        self.nodes[handle.0].set_channel(channel);
        Ok(())
    }

    /// Instrument program carried in rendered segments.
    pub fn set_instrument(&mut self, instrument: u8) {
        self.instrument = instrument;
    }

    pub fn instrument(&self) -> u8 {
        self.instrument
    }

    // -------------------------------------------------------------------------
    // Start conditions
    // -------------------------------------------------------------------------

    /// Apply a named start state, or mark the network resting when `None`.
    ///
    /// Resting leaves histories untouched; exports of the live history then
    /// report silence.
    pub fn apply_start_state(&mut self, name: Option<&str>) -> AutomatonResult<()> {
        let Some(name) = name else {
            self.resting = true;
            debug!(network = %self.name, "network_resting");
            return Ok(());
        };

        let state = self
            .start_state(name)
            .cloned()
            .ok_or_else(|| AutomatonError::unknown(NameKind::StartState, name))?;

        self.resting = false;
        for node in &mut self.nodes {
            let value = state.value_for(node.identity());
            node.set_initial_state(value);
        }
        self.clear_all_buffers();

        debug!(network = %self.name, start_state = name, "start_state_applied");
        Ok(())
    }

    /// Apply an unnamed start condition: `node_labels` get `value`, all
    /// other nodes `!value`.
    pub fn set_start_state<S: AsRef<str>>(
        &mut self,
        node_labels: &[S],
        value: bool,
    ) -> AutomatonResult<()> {
        let targets = self.resolve_identities(node_labels)?;
        let state = StartState::new("", targets, value);

        self.resting = false;
        for node in &mut self.nodes {
            let value = state.value_for(node.identity());
            node.set_initial_state(value);
        }
        self.clear_all_buffers();
        Ok(())
    }

    pub fn is_resting(&self) -> bool {
        self.resting
    }

    // -------------------------------------------------------------------------
    // Buffering
    // -------------------------------------------------------------------------

    /// Value of a node at `step`, buffering it first if needed.
    pub fn state_at(&mut self, handle: NodeHandle, step: usize) -> AutomatonResult<bool> {
        if let Some(value) = self.node_checked(handle)?.cached(step) {
            return Ok(value);
        }

        self.buffer_up_to(handle, step)?;
        let node = self.node_checked(handle)?;
        node.cached(step).ok_or_else(|| AutomatonError::NotBuffered {
            label: node.label().to_string(),
            needed: step + 1,
            available: node.history().len(),
        })
    }

    /// Value of the node labelled `label` at `step`.
    pub fn state_of(&mut self, label: &str, step: usize) -> AutomatonResult<bool> {
        let handle = self.handle_of(label)?;
        self.state_at(handle, step)
    }

    /// Compute a node's history through `target_step`.
    ///
    /// Already computed steps are never recomputed. Pending extensions are
    /// kept on an explicit work stack: a node requested while it is already
    /// on the stack is a same-step cycle, and a stack deeper than
    /// `max_evaluation_depth` is rejected.
    pub fn buffer_up_to(&mut self, handle: NodeHandle, target_step: usize) -> AutomatonResult<()> {
        if self.node_checked(handle)?.history().len() > target_step {
            return Ok(());
        }

        let mut stack = Vec::new();
        let result = self.extend(&mut stack, Frame {
            node: handle,
            target: target_step,
        });
        for frame in &stack {
            self.nodes[frame.node.0].set_extending(false);
        }
        result
    }

    fn extend(&mut self, stack: &mut Vec<Frame>, root: Frame) -> AutomatonResult<()> {
        self.push_frame(stack, root)?;

        while let Some(&Frame { node, target }) = stack.last() {
            let step = self.nodes[node.0].buffered_to();
            if step >= target {
                stack.pop();
                self.nodes[node.0].set_extending(false);
                continue;
            }

            if let Some(pending) = self.missing_input(node, step) {
                self.push_frame(stack, pending)?;
                continue;
            }

            let function = self.resolve_function(node);
            let network: &Network = self;
            let mut cursor = EvalCursor { network, node };
            let value = function.evaluate(&mut cursor, network.nodes[node.0].inputs(), step)?;
            self.nodes[node.0].push(value);
        }
        Ok(())
    }

    fn push_frame(&mut self, stack: &mut Vec<Frame>, frame: Frame) -> AutomatonResult<()> {
        let node = &self.nodes[frame.node.0];
        if node.is_extending() {
            return Err(AutomatonError::CyclicDependency {
                label: node.label().to_string(),
                step: frame.target,
            });
        }
        if stack.len() >= self.config.max_evaluation_depth {
            return Err(AutomatonError::EvaluationDepthExceeded {
                limit: self.config.max_evaluation_depth,
                label: node.label().to_string(),
                step: frame.target,
            });
        }

        self.nodes[frame.node.0].set_extending(true);
        stack.push(frame);
        Ok(())
    }

    /// First input of `node` whose value for computing `step + 1` is not
    /// buffered yet.
    fn missing_input(&self, node: NodeHandle, step: usize) -> Option<Frame> {
        self.nodes[node.0]
            .inputs()
            .iter()
            .map(|&input| Frame {
                node: input,
                target: self.input_step(node, input, step),
            })
            .find(|frame| self.nodes[frame.node.0].cached(frame.target).is_none())
    }

    /// Step at which `node` samples `input` when computing `step + 1`.
    fn input_step(&self, node: NodeHandle, input: NodeHandle, step: usize) -> usize {
        match self.config.evaluation {
            EvaluationMode::Delayed => step,
            EvaluationMode::Combinational if input == node => step,
            EvaluationMode::Combinational => step + 1,
        }
    }

    /// Buffer every node through `end_step`.
    ///
    /// A no-op when the network horizon already reaches `end_step`. On error
    /// the horizon is left unchanged; values computed so far stay memoized.
    pub fn ensure_buffered(&mut self, end_step: usize) -> AutomatonResult<()> {
        if self.buffered_to >= end_step {
            return Ok(());
        }

        for index in 0..self.nodes.len() {
            if let Err(e) = self.buffer_up_to(NodeHandle(index), end_step) {
                warn!(network = %self.name, end_step, error = %e, "network_buffering_aborted");
                return Err(e);
            }
        }
        self.buffered_to = end_step;

        debug!(network = %self.name, end_step, "network_buffered");
        Ok(())
    }

    /// Network-level buffered horizon.
    pub fn buffered_to(&self) -> usize {
        self.buffered_to
    }

    /// Reset every node to `[initial_state]` and the horizon to 0.
    pub fn clear_all_buffers(&mut self) {
        for node in &mut self.nodes {
            node.clear();
        }
        self.buffered_to = 0;
    }

    /// Append a segment of `duration` steps to every node's saved history.
    pub fn save_all(&mut self, duration: usize, silent: bool) -> AutomatonResult<()> {
        for node in &mut self.nodes {
            node.save_segment(duration, silent)?;
        }
        Ok(())
    }

    /// Drop every node's saved history.
    pub fn clear_saved(&mut self) {
        for node in &mut self.nodes {
            node.clear_saved();
        }
    }

    // -------------------------------------------------------------------------
    // Export
    // -------------------------------------------------------------------------

    /// Classify every node at every exported step.
    ///
    /// With `sort`, silent nodes come first ordered by label, then audible
    /// nodes by ascending channel. Ordering never affects values. Steps are
    /// exported while every node has a value; while resting, the live
    /// history reports every node inactive.
    pub fn export_snapshot(&self, sort: bool, use_saved_history: bool) -> Snapshot {
        let order = if sort {
            self.sorted_handles()
        } else {
            (0..self.nodes.len()).map(NodeHandle).collect()
        };

        let steps = order
            .iter()
            .map(|h| series(&self.nodes[h.0], use_saved_history).len())
            .min()
            .unwrap_or(0);
        let silenced = self.resting && !use_saved_history;

        let rows = (0..steps)
            .map(|step| {
                order
                    .iter()
                    .map(|h| {
                        let node = &self.nodes[h.0];
                        let active = !silenced && series(node, use_saved_history)[step];
                        NodeState::classify(active, !node.is_silent())
                    })
                    .collect()
            })
            .collect();

        Snapshot {
            rows,
            columns: order
                .iter()
                .map(|h| self.nodes[h.0].identity().clone())
                .collect(),
        }
    }

    fn sorted_handles(&self) -> Vec<NodeHandle> {
        let mut handles: Vec<NodeHandle> = (0..self.nodes.len()).map(NodeHandle).collect();
        // `None < Some`, so silent nodes sort first.
        handles.sort_by(|a, b| {
            let a = &self.nodes[a.0];
            let b = &self.nodes[b.0];
            (a.channel(), a.label()).cmp(&(b.channel(), b.label()))
        });
        handles
    }

    /// Output for `[offset, offset + duration)` taken from live steps
    /// `0..duration`. Every value is `false` while resting.
    pub fn render_segment(
        &self,
        offset: usize,
        duration: usize,
        start_state: Option<&str>,
    ) -> AutomatonResult<RenderedSegment> {
        let mut voices = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let steps = if self.resting {
                vec![false; duration]
            } else {
                let history = node.history();
                if history.len() < duration {
                    return Err(AutomatonError::NotBuffered {
                        label: node.label().to_string(),
                        needed: duration,
                        available: history.len(),
                    });
                }
                history[..duration].to_vec()
            };
            voices.push(Voice {
                identity: node.identity().clone(),
                channel: node.channel(),
                steps,
            });
        }

        debug!(network = %self.name, offset, duration, resting = self.resting, "segment_rendered");
        Ok(RenderedSegment {
            network: self.name.clone(),
            instrument: self.instrument,
            offset,
            duration,
            start_state: start_state.map(str::to_string),
            resting: self.resting,
            voices,
        })
    }

    // -------------------------------------------------------------------------
    // Structure analysis
    // -------------------------------------------------------------------------

    /// Input graph: an edge `input -> node` per input slot, weighted by the
    /// slot position. Graph indices match node handles.
    pub fn dependency_graph(&self) -> DiGraph<NodeHandle, usize> {
        let mut graph = DiGraph::with_capacity(self.nodes.len(), self.nodes.len());
        for index in 0..self.nodes.len() {
            graph.add_node(NodeHandle(index));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            for (slot, input) in node.inputs().iter().enumerate() {
                graph.add_edge(NodeIndex::new(input.0), NodeIndex::new(index), slot);
            }
        }
        graph
    }

    /// Groups of distinct nodes that feed each other.
    ///
    /// Under [`EvaluationMode::Combinational`] these groups fail with
    /// `CyclicDependency`; a node reading only itself is a legal latch and
    /// is not reported. Labels within a group are sorted.
    pub fn combinational_cycles(&self) -> Vec<Vec<String>> {
        let graph = self.dependency_graph();
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let mut labels: Vec<String> = component
                    .into_iter()
                    .map(|ix| self.nodes[graph[ix].0].label().to_string())
                    .collect();
                labels.sort();
                labels
            })
            .collect();
        cycles.sort();
        cycles
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle.0)
    }

    pub fn node_by_label(&self, label: &str) -> Option<&Node> {
        self.labels.get(label).map(|h| &self.nodes[h.0])
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Handle of the node labelled `label`.
    pub fn handle_of(&self, label: &str) -> AutomatonResult<NodeHandle> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| AutomatonError::UnknownIdentity {
                namespace: self.name.clone(),
                label: label.to_string(),
            })
    }

    pub fn function(&self, name: &str) -> Option<&VertexFunction> {
        self.function_names
            .get(name)
            .map(|id| self.functions[id.0].as_ref())
    }

    pub fn start_state(&self, name: &str) -> Option<&StartState> {
        self.start_states.iter().find(|s| s.name() == name)
    }

    pub fn start_states(&self) -> &[StartState] {
        &self.start_states
    }

    /// Owned copies of every node's histories, in insertion order.
    pub fn histories(&self) -> Vec<NodeHistory> {
        self.nodes.iter().map(Node::to_history).collect()
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            node_count: self.nodes.len(),
            audible_count: self.nodes.iter().filter(|n| !n.is_silent()).count(),
            function_count: self.functions.len(),
            start_state_count: self.start_states.len(),
            buffered_to: self.buffered_to,
            saved_steps: self
                .nodes
                .iter()
                .map(|n| n.saved_history().len())
                .max()
                .unwrap_or(0),
        }
    }

    // Internal helpers

    fn node_checked(&self, handle: NodeHandle) -> AutomatonResult<&Node> {
        self.nodes
            .get(handle.0)
            .ok_or_else(|| AutomatonError::UnknownIdentity {
                namespace: self.name.clone(),
                label: format!("#{}", handle.0),
            })
    }

    fn function_id(&self, name: &str) -> AutomatonResult<FunctionId> {
        self.function_names
            .get(name)
            .copied()
            .ok_or_else(|| AutomatonError::unknown(NameKind::Function, name))
    }

    fn resolve_function(&self, handle: NodeHandle) -> Arc<VertexFunction> {
        match self.nodes[handle.0].function() {
            FunctionBinding::Default(latch) => Arc::clone(latch),
            FunctionBinding::Named(id) => Arc::clone(&self.functions[id.0]),
        }
    }

    fn resolve_identities<S: AsRef<str>>(&self, labels: &[S]) -> AutomatonResult<Vec<NodeIdentity>> {
        labels
            .iter()
            .map(|label| {
                let handle = self.handle_of(label.as_ref())?;
                Ok(self.nodes[handle.0].identity().clone())
            })
            .collect()
    }
}

fn series(node: &Node, saved: bool) -> &[bool] {
    if saved {
        node.saved_history()
    } else {
        node.history()
    }
}

/// One pending extension on the buffering work stack.
#[derive(Debug, Clone, Copy)]
struct Frame {
    node: NodeHandle,
    target: usize,
}

/// Reads buffered inputs on behalf of one node, applying the evaluation
/// mode.
struct EvalCursor<'a> {
    network: &'a Network,
    node: NodeHandle,
}

impl StateSource for EvalCursor<'_> {
    fn state_at(&mut self, input: NodeHandle, step: usize) -> AutomatonResult<bool> {
        let step = self.network.input_step(self.node, input, step);
        let node = self.network.node_checked(input)?;
        node.cached(step).ok_or_else(|| AutomatonError::NotBuffered {
            label: node.label().to_string(),
            needed: step + 1,
            available: node.history().len(),
        })
    }
}
