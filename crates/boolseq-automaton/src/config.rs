//! Engine configuration.

use serde::{Deserialize, Serialize};

/// How a node's inputs are sampled when computing its next value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// `history[t+1] = f(inputs at t)` for every input.
    #[default]
    Delayed,
    /// `history[t+1] = f(other inputs at t+1, own value at t)`.
    ///
    /// Cross-node cycles under this mode have no evaluation order and are
    /// reported as `CyclicDependency`.
    Combinational,
}

/// Configuration for a network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Input sampling mode.
    #[serde(default)]
    pub evaluation: EvaluationMode,

    /// Maximum nesting of node-to-node evaluation before giving up.
    #[serde(default = "default_max_depth")]
    pub max_evaluation_depth: usize,

    /// Largest arity accepted for named vertex functions.
    #[serde(default = "default_max_arity")]
    pub max_arity: usize,
}

fn default_max_depth() -> usize {
    1024
}

fn default_max_arity() -> usize {
    16
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            evaluation: EvaluationMode::default(),
            max_evaluation_depth: default_max_depth(),
            max_arity: default_max_arity(),
        }
    }
}

impl NetworkConfig {
    /// Same-step coupling between distinct nodes.
    pub fn combinational() -> Self {
        Self {
            evaluation: EvaluationMode::Combinational,
            ..Default::default()
        }
    }

    /// Tight limits, useful when networks come from untrusted descriptions.
    pub fn strict() -> Self {
        Self {
            max_evaluation_depth: 64,
            max_arity: 8,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: NetworkConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.evaluation, EvaluationMode::Delayed);
        assert_eq!(config.max_evaluation_depth, 1024);
        assert_eq!(config.max_arity, 16);
    }

    #[test]
    fn test_mode_serialization() {
        let config: NetworkConfig =
            serde_json::from_str(r#"{"evaluation": "combinational"}"#).unwrap();
        assert_eq!(config.evaluation, EvaluationMode::Combinational);
    }
}
