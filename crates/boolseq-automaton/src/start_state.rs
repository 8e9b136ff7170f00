//! Named initial-condition templates.

use boolseq_core::NodeIdentity;
use serde::{Deserialize, Serialize};

/// A reusable start condition: `targets` get `truth_value`, every other node
/// of the network gets its complement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartState {
    name: String,
    targets: Vec<NodeIdentity>,
    truth_value: bool,
}

impl StartState {
    pub fn new(name: impl Into<String>, targets: Vec<NodeIdentity>, truth_value: bool) -> Self {
        let mut unique: Vec<NodeIdentity> = Vec::with_capacity(targets.len());
        for target in targets {
            if !unique.iter().any(|u| u.uuid == target.uuid) {
                unique.push(target);
            }
        }
        Self {
            name: name.into(),
            targets: unique,
            truth_value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn targets(&self) -> &[NodeIdentity] {
        &self.targets
    }

    pub fn truth_value(&self) -> bool {
        self.truth_value
    }

    /// Initial value this state assigns to `identity`.
    pub fn value_for(&self, identity: &NodeIdentity) -> bool {
        if self.targets.iter().any(|t| t.uuid == identity.uuid) {
            self.truth_value
        } else {
            !self.truth_value
        }
    }
}
