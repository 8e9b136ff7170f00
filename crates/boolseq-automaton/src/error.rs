//! Error types for the automaton system.

use boolseq_core::ChannelError;
use thiserror::Error;

/// Result type alias for automaton operations.
pub type AutomatonResult<T> = Result<T, AutomatonError>;

/// Kind of named entity, used to qualify name errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Network,
    Function,
    StartState,
    Track,
}

impl std::fmt::Display for NameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NameKind::Network => "network",
            NameKind::Function => "vertex function",
            NameKind::StartState => "start state",
            NameKind::Track => "track",
        };
        f.write_str(s)
    }
}

/// Errors that can occur during automaton operations.
#[derive(Debug, Error)]
pub enum AutomatonError {
    /// `(namespace, label)` is already registered.
    #[error("node label '{namespace}:{label}' has already been assigned")]
    DuplicateIdentity { namespace: String, label: String },

    /// No identity is registered under `(namespace, label)`.
    #[error("unknown node '{namespace}:{label}'")]
    UnknownIdentity { namespace: String, label: String },

    /// A function, start state, network or track name is already in use.
    #[error("the {kind} name '{name}' is already in use")]
    DuplicateName { kind: NameKind, name: String },

    /// A function, start state, network or track name is not registered.
    #[error("unknown {kind} '{name}'")]
    UnknownName { kind: NameKind, name: String },

    /// Input count does not match a function's arity.
    #[error("arity mismatch in {context}: expected {expected} inputs, got {actual}")]
    ArityMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// Requested arity would exceed the configured truth-table limit.
    #[error("arity {arity} exceeds the configured maximum of {max}")]
    ArityTooLarge { arity: usize, max: usize },

    /// A node's value was requested while that node was still being extended.
    #[error("cyclic dependency: node '{label}' requested at step {step} while it is being computed")]
    CyclicDependency { label: String, step: usize },

    /// The buffering work stack grew past the configured bound.
    #[error("evaluation depth limit {limit} exceeded at node '{label}' step {step}")]
    EvaluationDepthExceeded {
        limit: usize,
        label: String,
        step: usize,
    },

    /// A segment asked for more steps than a node has buffered.
    #[error("node '{label}' has {available} buffered steps, {needed} requested")]
    NotBuffered {
        label: String,
        needed: usize,
        available: usize,
    },

    /// Track segments must last at least one step.
    #[error("segment duration must be positive")]
    InvalidDuration,

    /// Output channel could not be built.
    #[error("invalid output channel: {0}")]
    InvalidChannel(#[from] ChannelError),

    /// A declarative description could not be decoded.
    #[error("description error: {0}")]
    Description(#[from] serde_json::Error),
}

impl AutomatonError {
    pub(crate) fn unknown(kind: NameKind, name: impl Into<String>) -> Self {
        Self::UnknownName {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn duplicate(kind: NameKind, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            kind,
            name: name.into(),
        }
    }

    /// True for errors raised while buffering rather than while building.
    pub fn is_evaluation_error(&self) -> bool {
        matches!(
            self,
            Self::CyclicDependency { .. } | Self::EvaluationDepthExceeded { .. }
        )
    }
}
