//! Boolean-network simulation and track sequencing.
//!
//! A network is a set of boolean nodes. Each node evaluates a truth-table
//! function over an ordered list of input nodes, and its history is computed
//! lazily, one step at a time, on demand. Tracks chain several runs of one
//! network (from different start states, with silent rests between them)
//! into a single saved timeline per node.
//!
//! ## Core Concepts
//!
//! - **VertexFunction**: a boolean function stored as a complete truth table,
//!   written with optional wildcard rows
//! - **Node**: identity, function binding, inputs and memoized history
//! - **StartState**: a named initial condition (targets get a value, the rest
//!   its complement)
//! - **Network**: arena of nodes; buffering, start states and export
//! - **Track / Sequencer**: segments run in order, appended to saved history
//! - **Session**: owns the identity registry, networks and sequencer
//!
//! ## The Evaluation Model
//!
//! ```text
//! history[0]   = initial_state
//! history[t+1] = f(inputs sampled at t)        // EvaluationMode::Delayed
//! history[t+1] = f(others at t+1, self at t)   // EvaluationMode::Combinational
//! ```
//!
//! Requesting a node's value while that same node is being extended is a
//! cyclic dependency and is reported as [`AutomatonError::CyclicDependency`].

pub mod config;
pub mod description;
mod error;
mod network;
mod node;
mod registry;
mod sequencer;
mod session;
mod start_state;
mod vertex_function;

pub use config::{EvaluationMode, NetworkConfig};
pub use error::{AutomatonError, AutomatonResult, NameKind};
pub use network::{Network, NetworkStats, RenderedSegment, Voice};
pub use node::{FunctionBinding, Node, NodeHistory};
pub use registry::IdentityRegistry;
pub use sequencer::{run_track, NullSink, Segment, SegmentSink, Sequencer, Track, TrackReport};
pub use session::Session;
pub use start_state::StartState;
pub use vertex_function::{RuleRow, StateSource, VertexFunction, ABSOLUTE_MAX_ARITY};

// Description
pub use description::{
    AssignmentDescription, FunctionDescription, NetworkDescription, NodeDescription,
    SegmentDescription, SessionDescription, StartStateDescription, TrackDescription,
};

// Shared types from the core crate
pub use boolseq_core::{
    ChannelError, FunctionId, NodeHandle, NodeIdentity, NodeState, OutputChannel, Snapshot,
};
