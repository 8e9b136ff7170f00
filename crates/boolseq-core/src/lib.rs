//! Core domain types shared across the boolseq workspace.
//!
//! These are the leaf types every other layer speaks in: node identities and
//! arena handles, output channels (the "audible" attribute of a node), the
//! four-way node state classification used by visual exports, and the exported
//! snapshot itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// Identifiers
// =============================================================================

/// Arena index of a node inside its owning network.
///
/// Handles are only meaningful for the network that issued them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeHandle(pub usize);

/// Arena index of a named vertex function inside its owning network.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId(pub usize);

/// Stable identity of a node.
///
/// `(namespace, label)` is unique within the registry that created the
/// identity, and `uuid` is unique everywhere. The serial records creation
/// order within the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Globally unique handle used for lookups.
    pub uuid: Uuid,
    /// Label as written by the network author.
    pub label: String,
    /// Namespace (normally the owning network's name).
    pub namespace: String,
    /// Creation order within the issuing registry.
    pub serial: u64,
}

impl NodeIdentity {
    /// Creates a fresh identity with a random v4 uuid.
    pub fn new(namespace: impl Into<String>, label: impl Into<String>, serial: u64) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            label: label.into(),
            namespace: namespace.into(),
            serial,
        }
    }

    /// The composite `namespace:label` key.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.namespace, self.label)
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.label)
    }
}

// =============================================================================
// Output Channels
// =============================================================================

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Highest valid channel index.
pub const MAX_CHANNEL: u8 = 127;

/// Errors raised while building an [`OutputChannel`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The note name is not valid scientific pitch notation.
    #[error("invalid note name: {0:?}")]
    InvalidNoteName(String),

    /// The computed index falls outside `0..=127`.
    #[error("channel index {0} is out of range (0..=127)")]
    OutOfRange(i64),
}

/// The "audible" attribute of a node: a MIDI-style note index.
///
/// Nodes without a channel are silent. They still take part in the dynamics
/// but never produce sound events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputChannel(u8);

impl OutputChannel {
    /// Creates a channel from a raw index.
    pub fn new(index: u8) -> Result<Self, ChannelError> {
        if index > MAX_CHANNEL {
            return Err(ChannelError::OutOfRange(index as i64));
        }
        Ok(Self(index))
    }

    /// Parses scientific pitch notation such as `"G#3"`, `"Bb4"`, `"C2"` or
    /// `"C#-2"`.
    ///
    /// The index is `(octave + 2) * 12 + pitch_class`, so `"G#3"` maps to 68.
    pub fn from_note_name(name: &str) -> Result<Self, ChannelError> {
        let invalid = || ChannelError::InvalidNoteName(name.to_string());

        if !name.is_ascii() || name.len() < 2 || name.len() > 4 {
            return Err(invalid());
        }

        let (pitch, octave) = if name.contains('#') {
            (pitch_class(&SHARP_NAMES, &name[..2]), &name[2..])
        } else if name.contains('b') {
            (pitch_class(&FLAT_NAMES, &name[..2]), &name[2..])
        } else {
            (pitch_class(&SHARP_NAMES, &name[..1]), &name[1..])
        };

        let pitch = pitch.ok_or_else(invalid)?;
        let octave: i64 = octave.parse().map_err(|_| invalid())?;
        let index = (octave + 2) * 12 + pitch as i64;

        if !(0..=MAX_CHANNEL as i64).contains(&index) {
            return Err(ChannelError::OutOfRange(index));
        }
        Ok(Self(index as u8))
    }

    /// Raw channel index.
    pub fn index(&self) -> u8 {
        self.0
    }

    /// Sharp-spelled note name for this channel.
    pub fn note_name(&self) -> String {
        let octave = (self.0 / 12) as i32 - 2;
        format!("{}{}", SHARP_NAMES[(self.0 % 12) as usize], octave)
    }
}

fn pitch_class(names: &[&str; 12], candidate: &str) -> Option<usize> {
    names.iter().position(|n| *n == candidate)
}

impl FromStr for OutputChannel {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<u8>() {
            Ok(index) => Self::new(index),
            Err(_) => Self::from_note_name(s),
        }
    }
}

impl fmt::Display for OutputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.note_name())
    }
}

// =============================================================================
// Node State Classification
// =============================================================================

/// Classification of one node at one step, as seen by the visual export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    /// Value is `true` and the node has an output channel.
    ActiveAudible,
    /// Value is `true` and the node is silent.
    ActiveSilent,
    /// Value is `false` and the node has an output channel.
    InactiveAudible,
    /// Value is `false` and the node is silent.
    InactiveSilent,
}

impl NodeState {
    /// Classifies a value for a node that is (or isn't) audible.
    pub fn classify(active: bool, audible: bool) -> Self {
        match (active, audible) {
            (true, true) => Self::ActiveAudible,
            (true, false) => Self::ActiveSilent,
            (false, true) => Self::InactiveAudible,
            (false, false) => Self::InactiveSilent,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::ActiveAudible | Self::ActiveSilent)
    }

    pub fn is_audible(&self) -> bool {
        matches!(self, Self::ActiveAudible | Self::InactiveAudible)
    }
}

// =============================================================================
// Snapshots
// =============================================================================

/// Exported per-step classification of every node in a network.
///
/// `rows[step][column]` classifies the node identified by `columns[column]`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// One row per exported step.
    pub rows: Vec<Vec<NodeState>>,
    /// Column order shared by every row.
    pub columns: Vec<NodeIdentity>,
}

impl Snapshot {
    /// Number of exported steps.
    pub fn step_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns (nodes).
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Column index of the node with the given label.
    pub fn column_of(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|id| id.label == label)
    }

    /// Labels in column order.
    pub fn labels(&self) -> Vec<&str> {
        self.columns.iter().map(|id| id.label.as_str()).collect()
    }

    /// Full column of states for one node.
    pub fn column(&self, index: usize) -> Option<Vec<NodeState>> {
        if index >= self.columns.len() {
            return None;
        }
        Some(self.rows.iter().map(|row| row[index]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_names() {
        assert_eq!(OutputChannel::from_note_name("G#3").unwrap().index(), 68);
        assert_eq!(OutputChannel::from_note_name("Ab3").unwrap().index(), 68);
        assert_eq!(OutputChannel::from_note_name("C2").unwrap().index(), 48);
        assert_eq!(OutputChannel::from_note_name("Bb4").unwrap().index(), 82);
        assert_eq!(OutputChannel::from_note_name("B4").unwrap().index(), 83);
    }

    #[test]
    fn test_invalid_note_names() {
        assert!(matches!(
            OutputChannel::from_note_name("H3"),
            Err(ChannelError::InvalidNoteName(_))
        ));
        assert!(matches!(
            OutputChannel::from_note_name("C#"),
            Err(ChannelError::InvalidNoteName(_))
        ));
        assert!(OutputChannel::from_note_name("C").is_err());
        assert!(OutputChannel::from_note_name("C#10").is_err());
        assert!(matches!(
            OutputChannel::from_note_name("G9"),
            Err(ChannelError::OutOfRange(139))
        ));
    }

    #[test]
    fn test_channel_from_str() {
        let numeric: OutputChannel = "60".parse().unwrap();
        assert_eq!(numeric.index(), 60);

        let named: OutputChannel = "F#6".parse().unwrap();
        assert_eq!(named.index(), 102);
        assert_eq!(named.note_name(), "F#6");

        assert!("200".parse::<OutputChannel>().is_err());
    }

    #[test]
    fn test_negative_octaves() {
        assert_eq!(OutputChannel::from_note_name("C-2").unwrap().index(), 0);
        assert_eq!(OutputChannel::from_note_name("C#-2").unwrap().index(), 1);
        assert_eq!(OutputChannel::from_note_name("Bb-1").unwrap().index(), 22);
        assert!(matches!(
            OutputChannel::from_note_name("B-3"),
            Err(ChannelError::OutOfRange(-1))
        ));
    }

    #[test]
    fn test_every_note_name_parses_back() {
        for index in 0..=MAX_CHANNEL {
            let channel = OutputChannel::new(index).unwrap();
            let parsed: OutputChannel = channel.to_string().parse().unwrap();
            assert_eq!(parsed, channel, "{}", channel.note_name());
        }
    }

    #[test]
    fn test_node_state_classification() {
        assert_eq!(NodeState::classify(true, true), NodeState::ActiveAudible);
        assert_eq!(NodeState::classify(false, false), NodeState::InactiveSilent);
        assert!(NodeState::ActiveSilent.is_active());
        assert!(!NodeState::ActiveSilent.is_audible());
        assert!(NodeState::InactiveAudible.is_audible());
    }

    #[test]
    fn test_identity_display() {
        let id = NodeIdentity::new("net", "a", 0);
        assert_eq!(id.to_string(), "net:a");
        assert_eq!(id.qualified_name(), "net:a");
        assert_ne!(id.uuid, NodeIdentity::new("net", "a", 0).uuid);
    }
}
