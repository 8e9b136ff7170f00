//! Vertex functions: boolean functions stored as complete truth tables.
//!
//! A function of arity `n` owns `2^n` outputs. The table index of an input
//! vector is little-endian: input `i` contributes bit `i`. Rule authors may
//! write rows containing wildcards (`None`), which are expanded into every
//! concrete input vector they cover before being written.

use std::fmt;

use boolseq_core::NodeHandle;
use serde::{Deserialize, Serialize};

use crate::error::{AutomatonError, AutomatonResult};

/// Hard upper bound on arity, independent of configuration.
pub const ABSOLUTE_MAX_ARITY: usize = 24;

/// A rule row as written by an author: `None` matches either value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRow {
    /// Input pattern, one entry per argument.
    pub inputs: Vec<Option<bool>>,
    /// Output for every vector the pattern covers.
    pub output: bool,
}

impl RuleRow {
    pub fn new(inputs: Vec<Option<bool>>, output: bool) -> Self {
        Self { inputs, output }
    }

    /// A row with no wildcards.
    pub fn concrete(inputs: &[bool], output: bool) -> Self {
        Self {
            inputs: inputs.iter().copied().map(Some).collect(),
            output,
        }
    }

    /// Number of wildcard positions.
    pub fn wildcard_count(&self) -> usize {
        self.inputs.iter().filter(|v| v.is_none()).count()
    }
}

/// Source of node values consulted while evaluating a function.
///
/// The network implements this over its buffered histories, applying its
/// evaluation mode to the requested step.
pub trait StateSource {
    /// Value of `node` at `step`.
    fn state_at(&mut self, node: NodeHandle, step: usize) -> AutomatonResult<bool>;
}

/// A named boolean function of fixed arity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawVertexFunction")]
pub struct VertexFunction {
    arity: usize,
    name: String,
    argument_names: Vec<String>,
    default_output: bool,
    table: Vec<bool>,
}

/// Unchecked wire form of [`VertexFunction`].
#[derive(Deserialize)]
struct RawVertexFunction {
    arity: usize,
    name: String,
    argument_names: Vec<String>,
    default_output: bool,
    table: Vec<bool>,
}

impl TryFrom<RawVertexFunction> for VertexFunction {
    type Error = AutomatonError;

    fn try_from(raw: RawVertexFunction) -> AutomatonResult<Self> {
        let mut function = Self::new(raw.arity, raw.name, raw.argument_names, raw.default_output)?;
        if raw.table.len() != function.table.len() {
            return Err(AutomatonError::ArityMismatch {
                context: format!("truth table of '{}'", function.name),
                expected: function.table.len(),
                actual: raw.table.len(),
            });
        }
        function.table = raw.table;
        Ok(function)
    }
}

impl VertexFunction {
    /// Allocate a function whose every entry is `default_output`.
    pub fn new(
        arity: usize,
        name: impl Into<String>,
        argument_names: Vec<String>,
        default_output: bool,
    ) -> AutomatonResult<Self> {
        let name = name.into();
        if arity > ABSOLUTE_MAX_ARITY {
            return Err(AutomatonError::ArityTooLarge {
                arity,
                max: ABSOLUTE_MAX_ARITY,
            });
        }
        if argument_names.len() != arity {
            return Err(AutomatonError::ArityMismatch {
                context: format!("argument names of '{name}'"),
                expected: arity,
                actual: argument_names.len(),
            });
        }

        Ok(Self {
            arity,
            name,
            argument_names,
            default_output,
            table: vec![default_output; 1 << arity],
        })
    }

    /// The latch every new node starts with: arity 1, reads itself, always
    /// outputs `false`.
    pub fn latch(label: &str) -> Self {
        Self {
            arity: 1,
            name: format!("{label}_default"),
            argument_names: vec!["self".to_string()],
            default_output: false,
            table: vec![false; 2],
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn argument_names(&self) -> &[String] {
        &self.argument_names
    }

    pub fn default_output(&self) -> bool {
        self.default_output
    }

    /// The full truth table, indexed little-endian.
    pub fn table(&self) -> &[bool] {
        &self.table
    }

    /// Table index for a concrete input vector.
    pub fn table_index(inputs: &[bool]) -> usize {
        inputs
            .iter()
            .enumerate()
            .filter(|(_, v)| **v)
            .fold(0, |index, (bit, _)| index | (1 << bit))
    }

    /// Overwrite the output for one concrete input vector.
    pub fn set_rule(&mut self, inputs: &[bool], output: bool) -> AutomatonResult<()> {
        self.check_arity("set_rule", inputs.len())?;
        let index = Self::table_index(inputs);
        let len = self.table.len();
        let entry = self
            .table
            .get_mut(index)
            .ok_or_else(|| AutomatonError::ArityMismatch {
                context: "set_rule".to_string(),
                expected: 1 << self.arity,
                actual: len,
            })?;
        *entry = output;
        Ok(())
    }

    /// Expand wildcard rows and write them in order (last write wins).
    ///
    /// Returns the number of concrete entries written.
    pub fn set_rules(&mut self, rows: &[RuleRow]) -> AutomatonResult<usize> {
        for row in rows {
            self.check_arity("rule row", row.inputs.len())?;
        }

        let expanded = Self::expand_wildcard_rules(rows.to_vec());
        for (inputs, output) in &expanded {
            self.set_rule(inputs, *output)?;
        }
        Ok(expanded.len())
    }

    /// Output for a concrete input vector.
    pub fn output_for(&self, inputs: &[bool]) -> AutomatonResult<bool> {
        self.check_arity("output lookup", inputs.len())?;
        self.entry(Self::table_index(inputs))
    }

    /// Output at a raw table index.
    pub fn lookup(&self, index: usize) -> Option<bool> {
        self.table.get(index).copied()
    }

    /// Read every input at `step` from `source` and return the table entry.
    pub fn evaluate<S>(
        &self,
        source: &mut S,
        inputs: &[NodeHandle],
        step: usize,
    ) -> AutomatonResult<bool>
    where
        S: StateSource + ?Sized,
    {
        if inputs.len() != self.arity {
            return Err(AutomatonError::ArityMismatch {
                context: format!("evaluate '{}'", self.name),
                expected: self.arity,
                actual: inputs.len(),
            });
        }

        let mut index = 0;
        for (bit, input) in inputs.iter().enumerate() {
            if source.state_at(*input, step)? {
                index |= 1 << bit;
            }
        }
        self.entry(index)
    }

    fn entry(&self, index: usize) -> AutomatonResult<bool> {
        self.lookup(index).ok_or_else(|| AutomatonError::ArityMismatch {
            context: format!("truth table of '{}'", self.name),
            expected: 1 << self.arity,
            actual: self.table.len(),
        })
    }

    /// Replace wildcards with concrete values.
    ///
    /// Each pass splits the first remaining wildcard of every row into a
    /// `true` copy followed by a `false` copy. Passes repeat until no row has
    /// a wildcard, so a row with `k` wildcards yields `2^k` rows sharing its
    /// output. Caller order is preserved.
    pub fn expand_wildcard_rules(rows: Vec<RuleRow>) -> Vec<(Vec<bool>, bool)> {
        let mut pending = rows;

        loop {
            let mut unresolved = false;
            let mut next = Vec::with_capacity(pending.len() * 2);

            for row in pending {
                match row.inputs.iter().position(|v| v.is_none()) {
                    Some(first) => {
                        let mut high = row.inputs.clone();
                        let mut low = row.inputs;
                        high[first] = Some(true);
                        low[first] = Some(false);
                        unresolved |= high.iter().any(|v| v.is_none());
                        next.push(RuleRow::new(high, row.output));
                        next.push(RuleRow::new(low, row.output));
                    }
                    None => next.push(row),
                }
            }

            pending = next;
            if !unresolved {
                break;
            }
        }

        pending
            .into_iter()
            .map(|row| {
                let inputs = row.inputs.into_iter().map(|v| v.unwrap_or(false)).collect();
                (inputs, row.output)
            })
            .collect()
    }

    /// One line per table entry, `"<bits> -> <output>"`, bits least
    /// significant first.
    pub fn rule_listing(&self) -> Vec<String> {
        self.table
            .iter()
            .enumerate()
            .map(|(index, output)| {
                let bits: String = (0..self.arity)
                    .map(|bit| if index & (1 << bit) != 0 { '1' } else { '0' })
                    .collect();
                format!("{bits} -> {output}")
            })
            .collect()
    }

    fn check_arity(&self, context: &str, actual: usize) -> AutomatonResult<()> {
        if actual != self.arity {
            return Err(AutomatonError::ArityMismatch {
                context: context.to_string(),
                expected: self.arity,
                actual,
            });
        }
        Ok(())
    }
}

impl fmt::Display for VertexFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Vertex Function '{}':", self.name)?;
        for line in self.rule_listing() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
