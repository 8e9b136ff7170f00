//! Declarative session descriptions.
//!
//! A [`SessionDescription`] is plain data: networks, their nodes, functions,
//! assignments and start states, then tracks and the tracks to play. It is
//! replayed through the ordinary construction calls of [`Session`], so it
//! obeys exactly the same validation.
//!
//! ```json
//! {
//!   "networks": [{
//!     "name": "bells",
//!     "nodes": [{ "label": "a", "initial_state": true, "note": "C4" }],
//!     "functions": [{ "name": "keep", "arguments": ["x"],
//!                     "rules": [{ "inputs": [true], "output": true }] }],
//!     "assignments": [{ "node": "a", "function": "keep", "inputs": ["a"] }],
//!     "start_states": [{ "name": "on", "nodes": ["a"] }]
//!   }],
//!   "tracks": [{ "name": "intro", "network": "bells",
//!                "segments": [{ "start_state": "on", "duration": 4 },
//!                             { "duration": 2 }] }],
//!   "play": ["intro"]
//! }
//! ```

use std::str::FromStr;

use boolseq_core::OutputChannel;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::NetworkConfig;
use crate::error::AutomatonResult;
use crate::sequencer::{Segment, Track};
use crate::session::Session;
use crate::vertex_function::RuleRow;

/// Root of a description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Configuration for a session built with [`build`](Self::build).
    #[serde(default)]
    pub config: Option<NetworkConfig>,
    #[serde(default)]
    pub networks: Vec<NetworkDescription>,
    #[serde(default)]
    pub tracks: Vec<TrackDescription>,
    /// Track names to flag for the next `run_flagged`.
    #[serde(default)]
    pub play: Vec<String>,
}

/// One network and everything defined inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkDescription {
    pub name: String,
    /// Instrument program carried in rendered segments.
    #[serde(default)]
    pub instrument: Option<u8>,
    #[serde(default)]
    pub nodes: Vec<NodeDescription>,
    #[serde(default)]
    pub functions: Vec<FunctionDescription>,
    #[serde(default)]
    pub assignments: Vec<AssignmentDescription>,
    #[serde(default)]
    pub start_states: Vec<StartStateDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDescription {
    pub label: String,
    #[serde(default)]
    pub initial_state: bool,
    /// Channel index or note name such as `"G#3"`. Absent means silent.
    #[serde(default)]
    pub note: Option<String>,
}

/// A named vertex function. Arity is the number of arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDescription {
    pub name: String,
    pub arguments: Vec<String>,
    #[serde(default)]
    pub default_output: bool,
    /// Rows written in order; `null` inputs are wildcards.
    #[serde(default)]
    pub rules: Vec<RuleRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentDescription {
    pub node: String,
    pub function: String,
    pub inputs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartStateDescription {
    pub name: String,
    pub nodes: Vec<String>,
    /// Value of the listed nodes; every other node gets the complement.
    #[serde(default = "default_truth_value")]
    pub value: bool,
}

fn default_truth_value() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackDescription {
    pub name: String,
    pub network: String,
    pub segments: Vec<SegmentDescription>,
}

/// A segment; no start state means rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentDescription {
    #[serde(default)]
    pub start_state: Option<String>,
    pub duration: usize,
}

impl SessionDescription {
    /// Decode from a JSON string.
    pub fn from_json(json: &str) -> AutomatonResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> AutomatonResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Replay into `session`, stopping at the first failing call.
    pub fn apply(&self, session: &mut Session) -> AutomatonResult<()> {
        for network in &self.networks {
            network.apply(session)?;
        }

        for track in &self.tracks {
            let mut built = Track::new(&track.name, &track.network);
            for segment in &track.segments {
                built.push(Segment::new(segment.start_state.clone(), segment.duration)?);
            }
            session.add_track(built)?;
        }

        session.flag_tracks(self.play.as_slice())?;
        debug!(
            networks = self.networks.len(),
            tracks = self.tracks.len(),
            "description_applied"
        );
        Ok(())
    }

    /// A fresh session holding this description.
    pub fn build(&self) -> AutomatonResult<Session> {
        let mut session = Session::with_config(self.config.clone().unwrap_or_default());
        self.apply(&mut session)?;
        Ok(session)
    }
}

impl NetworkDescription {
    fn apply(&self, session: &mut Session) -> AutomatonResult<()> {
        let name = self.name.as_str();
        let network = session.create_network(name)?;
        if let Some(instrument) = self.instrument {
            network.set_instrument(instrument);
        }

        for node in &self.nodes {
            session.add_node(name, node.initial_state, &node.label)?;
            if let Some(note) = &node.note {
                let channel = OutputChannel::from_str(note)?;
                session.set_output_channel(name, &node.label, Some(channel))?;
            }
        }

        for function in &self.functions {
            session.add_vertex_function(
                name,
                function.arguments.len(),
                &function.name,
                function.arguments.clone(),
                function.default_output,
            )?;
            session.set_rules(name, &function.name, &function.rules)?;
        }

        for assignment in &self.assignments {
            session.assign_function(name, &assignment.node, &assignment.function, assignment.inputs.as_slice())?;
        }

        for state in &self.start_states {
            session.add_start_state(name, &state.name, state.nodes.as_slice(), state.value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AutomatonError, NameKind};

    const BELLS: &str = r#"{
        "networks": [{
            "name": "bells",
            "instrument": 14,
            "nodes": [
                { "label": "a", "initial_state": true, "note": "C4" },
                { "label": "b", "note": "62" },
                { "label": "clock" }
            ],
            "functions": [{
                "name": "or",
                "arguments": ["x", "y"],
                "rules": [
                    { "inputs": [true, null], "output": true },
                    { "inputs": [null, true], "output": true }
                ]
            }],
            "assignments": [{ "node": "b", "function": "or", "inputs": ["a", "b"] }],
            "start_states": [{ "name": "first", "nodes": ["a"] }]
        }],
        "tracks": [{
            "name": "intro",
            "network": "bells",
            "segments": [{ "start_state": "first", "duration": 3 }, { "duration": 1 }]
        }],
        "play": ["intro"]
    }"#;

    #[test]
    fn test_build_from_json() {
        let session = SessionDescription::from_json(BELLS).unwrap().build().unwrap();
        let net = session.network("bells").unwrap();

        assert_eq!(net.node_count(), 3);
        assert_eq!(net.instrument(), 14);
        assert_eq!(net.node_by_label("a").unwrap().channel().map(|c| c.index()), Some(72));
        assert_eq!(net.node_by_label("b").unwrap().channel().map(|c| c.index()), Some(62));
        assert!(net.node_by_label("clock").unwrap().is_silent());
        assert_eq!(net.function("or").unwrap().table(), &[false, true, true, true]);
        assert!(session.sequencer().is_flagged("intro"));
    }

    #[test]
    fn test_run_after_build() {
        let mut session = SessionDescription::from_json(BELLS).unwrap().build().unwrap();
        let mut sink = Vec::new();
        let reports = session.run_flagged(&mut sink).unwrap();

        assert_eq!(reports[0].total_steps, 4);
        let b = session.network("bells").unwrap().node_by_label("b").unwrap();
        // b = a OR b; a latches false after step 0.
        assert_eq!(b.saved_history(), &[false, true, true, false]);
    }

    #[test]
    fn test_invalid_note_aborts() {
        let json = r#"{ "networks": [{ "name": "n", "nodes": [{ "label": "a", "note": "H2" }] }] }"#;
        let err = SessionDescription::from_json(json).unwrap().build().unwrap_err();
        assert!(matches!(err, AutomatonError::InvalidChannel(_)));
    }

    #[test]
    fn test_unknown_play_track() {
        let json = r#"{ "play": ["nothing"] }"#;
        let err = SessionDescription::from_json(json).unwrap().build().unwrap_err();
        assert!(matches!(err, AutomatonError::UnknownName { kind: NameKind::Track, .. }));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            SessionDescription::from_json("{ networks: 1 }"),
            Err(AutomatonError::Description(_))
        ));
    }

    #[test]
    fn test_zero_duration_segment() {
        let json = r#"{
            "networks": [{ "name": "n" }],
            "tracks": [{ "name": "t", "network": "n", "segments": [{ "duration": 0 }] }]
        }"#;
        let err = SessionDescription::from_json(json).unwrap().build().unwrap_err();
        assert!(matches!(err, AutomatonError::InvalidDuration));
    }
}
