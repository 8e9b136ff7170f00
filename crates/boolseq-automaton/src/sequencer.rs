//! Tracks and the sequencer.
//!
//! A track is an ordered list of segments run against one network. Each
//! segment re-initializes the network (or rests), buffers it, renders its
//! output and appends it to every node's saved history, so one saved
//! history spans the whole composed sequence.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AutomatonError, AutomatonResult, NameKind};
use crate::network::{Network, RenderedSegment};

/// One `(start state or rest, duration)` entry of a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSegment")]
pub struct Segment {
    start_state: Option<String>,
    duration: usize,
}

#[derive(Deserialize)]
struct RawSegment {
    #[serde(default)]
    start_state: Option<String>,
    duration: usize,
}

impl TryFrom<RawSegment> for Segment {
    type Error = AutomatonError;

    fn try_from(raw: RawSegment) -> AutomatonResult<Self> {
        Self::new(raw.start_state, raw.duration)
    }
}

impl Segment {
    /// Run from a named start state for `duration` steps.
    pub fn play(start_state: impl Into<String>, duration: usize) -> AutomatonResult<Self> {
        Self::new(Some(start_state.into()), duration)
    }

    /// Stay silent for `duration` steps.
    pub fn rest(duration: usize) -> AutomatonResult<Self> {
        Self::new(None, duration)
    }

    pub fn new(start_state: Option<String>, duration: usize) -> AutomatonResult<Self> {
        if duration == 0 {
            return Err(AutomatonError::InvalidDuration);
        }
        Ok(Self {
            start_state,
            duration,
        })
    }

    pub fn start_state(&self) -> Option<&str> {
        self.start_state.as_deref()
    }

    pub fn duration(&self) -> usize {
        self.duration
    }

    pub fn is_rest(&self) -> bool {
        self.start_state.is_none()
    }
}

/// Segments bound to one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    name: String,
    network: String,
    segments: Vec<Segment>,
}

impl Track {
    pub fn new(name: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            network: network.into(),
            segments: Vec::new(),
        }
    }

    /// Builder-style segment append.
    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Sum of all segment durations.
    pub fn total_steps(&self) -> usize {
        self.segments.iter().map(Segment::duration).sum()
    }
}

/// Summary of one `run_track` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackReport {
    pub track: String,
    pub network: String,
    pub segments_run: usize,
    pub rests: usize,
    pub total_steps: usize,
}

/// Receiver of rendered segments, e.g. an audio scheduler.
pub trait SegmentSink {
    fn accept(&mut self, segment: RenderedSegment);
}

impl SegmentSink for Vec<RenderedSegment> {
    fn accept(&mut self, segment: RenderedSegment) {
        self.push(segment);
    }
}

/// Discards every segment.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SegmentSink for NullSink {
    fn accept(&mut self, _segment: RenderedSegment) {}
}

/// Run every segment of `track` on `network`.
///
/// Rests never read live history, so they skip buffering.
///
/// The network must be the one the track is bound to; callers that hold
/// several networks resolve it by [`Track::network`].
pub fn run_track<S>(track: &Track, network: &mut Network, sink: &mut S) -> AutomatonResult<TrackReport>
where
    S: SegmentSink + ?Sized,
{
    info!(
        track = %track.name,
        network = %network.name(),
        segments = track.segments.len(),
        "track_run_start"
    );

    let mut offset = 0;
    let mut rests = 0;
    for segment in &track.segments {
        let duration = segment.duration;
        network.apply_start_state(segment.start_state())?;
        if !segment.is_rest() {
            network.ensure_buffered(offset + duration)?;
        }
        sink.accept(network.render_segment(offset, duration, segment.start_state())?);
        network.save_all(duration, segment.is_rest())?;

        if segment.is_rest() {
            rests += 1;
        }
        debug!(track = %track.name, offset, duration, rest = segment.is_rest(), "segment_saved");
        offset += duration;
    }

    info!(track = %track.name, total_steps = offset, "track_run_complete");
    Ok(TrackReport {
        track: track.name.clone(),
        network: track.network.clone(),
        segments_run: track.segments.len(),
        rests,
        total_steps: offset,
    })
}

/// Named tracks plus the subset flagged to run next.
#[derive(Debug, Default, Clone)]
pub struct Sequencer {
    tracks: Vec<Track>,
    flagged: Vec<String>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a track. Names are unique.
    pub fn add_track(&mut self, track: Track) -> AutomatonResult<()> {
        if self.track(track.name()).is_some() {
            return Err(AutomatonError::duplicate(NameKind::Track, track.name()));
        }
        self.tracks.push(track);
        Ok(())
    }

    pub fn track(&self, name: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.name == name)
    }

    pub fn track_mut(&mut self, name: &str) -> AutomatonResult<&mut Track> {
        self.tracks
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| AutomatonError::unknown(NameKind::Track, name))
    }

    /// Tracks in declaration order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Add tracks to the flagged set. Nothing is flagged if any name is
    /// unknown.
    pub fn flag<S: AsRef<str>>(&mut self, names: &[S]) -> AutomatonResult<()> {
        if let Some(missing) = names.iter().find(|n| self.track(n.as_ref()).is_none()) {
            return Err(AutomatonError::unknown(NameKind::Track, missing.as_ref()));
        }
        for name in names {
            let name = name.as_ref();
            if !self.is_flagged(name) {
                self.flagged.push(name.to_string());
            }
        }
        Ok(())
    }

    pub fn is_flagged(&self, name: &str) -> bool {
        self.flagged.iter().any(|f| f == name)
    }

    pub fn clear_flags(&mut self) {
        self.flagged.clear();
    }

    /// Run every flagged track in declaration order, then clear the flags.
    ///
    /// The flags are kept if a track fails.
    pub fn run_flagged<S>(
        &mut self,
        networks: &mut [Network],
        sink: &mut S,
    ) -> AutomatonResult<Vec<TrackReport>>
    where
        S: SegmentSink + ?Sized,
    {
        info!(flagged = self.flagged.len(), "sequencer_run_flagged");

        let mut reports = Vec::with_capacity(self.flagged.len());
        for track in self.tracks.iter().filter(|t| self.flagged.contains(&t.name)) {
            let network = find_network_mut(networks, &track.network)?;
            reports.push(run_track(track, network, sink)?);
        }

        self.flagged.clear();
        Ok(reports)
    }
}

/// Resolve a network by name.
pub(crate) fn find_network_mut<'a>(
    networks: &'a mut [Network],
    name: &str,
) -> AutomatonResult<&'a mut Network> {
    networks
        .iter_mut()
        .find(|n| n.name() == name)
        .ok_or_else(|| AutomatonError::unknown(NameKind::Network, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::IdentityRegistry;

    /// `on` latches true, `off` latches false, `blink` toggles.
    fn sample_network(registry: &mut IdentityRegistry, name: &str) -> Network {
        let mut net = Network::new(name);
        net.add_node(registry, true, "on").unwrap();
        net.add_node(registry, true, "blink").unwrap();

        net.add_vertex_function(1, "keep", vec!["x".into()], false)
            .unwrap();
        net.set_rule("keep", &[true], true).unwrap();
        net.add_vertex_function(1, "toggle", vec!["x".into()], true)
            .unwrap();
        net.set_rule("toggle", &[true], false).unwrap();
        net.assign_function("on", "keep", &["on"]).unwrap();
        net.assign_function("blink", "toggle", &["blink"]).unwrap();

        net.add_start_state("all", &["on", "blink"], true).unwrap();
        net.add_start_state("none", &["on", "blink"], false).unwrap();
        net
    }

    #[test]
    fn test_zero_duration_rejected() {
        assert!(matches!(Segment::rest(0), Err(AutomatonError::InvalidDuration)));
        assert!(matches!(Segment::play("s", 0), Err(AutomatonError::InvalidDuration)));
        assert!(Segment::play("s", 1).is_ok());
    }

    #[test]
    fn test_deserialized_segment_is_validated() {
        let rest: Segment = serde_json::from_str(r#"{"duration":2}"#).unwrap();
        assert!(rest.is_rest());

        let err = serde_json::from_str::<Segment>(r#"{"start_state":null,"duration":0}"#).unwrap_err();
        assert!(err.to_string().contains("duration must be positive"));

        let track = r#"{"name":"t","network":"n","segments":[{"start_state":"s","duration":0}]}"#;
        assert!(serde_json::from_str::<Track>(track).is_err());
    }

    #[test]
    fn test_rest_on_cyclic_network_skips_buffering() {
        use crate::config::NetworkConfig;

        let mut registry = IdentityRegistry::new();
        let mut net = Network::with_config("comb", NetworkConfig::combinational());
        net.add_node(&mut registry, true, "a").unwrap();
        net.add_node(&mut registry, false, "b").unwrap();
        net.add_vertex_function(1, "copy", vec!["x".into()], false)
            .unwrap();
        net.set_rule("copy", &[true], true).unwrap();
        net.assign_function("a", "copy", &["b"]).unwrap();
        net.assign_function("b", "copy", &["a"]).unwrap();

        let track = Track::new("quiet", "comb").with_segment(Segment::rest(3).unwrap());
        let report = run_track(&track, &mut net, &mut NullSink).unwrap();
        assert_eq!(report.total_steps, 3);
        assert_eq!(net.node_by_label("a").unwrap().saved_history(), &[false; 3]);

        net.add_start_state("on", &["a"], true).unwrap();
        let track = Track::new("loud", "comb").with_segment(Segment::play("on", 2).unwrap());
        assert!(matches!(
            run_track(&track, &mut net, &mut NullSink),
            Err(AutomatonError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_run_track_concatenates_segments() {
        let mut registry = IdentityRegistry::new();
        let mut net = sample_network(&mut registry, "net");
        let track = Track::new("t", "net")
            .with_segment(Segment::play("all", 3).unwrap())
            .with_segment(Segment::rest(2).unwrap())
            .with_segment(Segment::play("all", 2).unwrap());

        let mut sink: Vec<RenderedSegment> = Vec::new();
        let report = run_track(&track, &mut net, &mut sink).unwrap();

        assert_eq!(report.segments_run, 3);
        assert_eq!(report.rests, 1);
        assert_eq!(report.total_steps, 7);

        let on = net.node_by_label("on").unwrap();
        let blink = net.node_by_label("blink").unwrap();
        assert_eq!(on.saved_history(), &[true, true, true, false, false, true, true]);
        assert_eq!(blink.saved_history(), &[true, false, true, false, false, true, false]);

        let offsets: Vec<usize> = sink.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0, 3, 5]);
        assert!(sink[1].resting);
        assert_eq!(sink[2].start_state.as_deref(), Some("all"));
    }

    #[test]
    fn test_unknown_start_state_aborts_track() {
        let mut registry = IdentityRegistry::new();
        let mut net = sample_network(&mut registry, "net");
        let track = Track::new("t", "net").with_segment(Segment::play("missing", 2).unwrap());

        let err = run_track(&track, &mut net, &mut NullSink).unwrap_err();
        assert!(matches!(err, AutomatonError::UnknownName { kind: NameKind::StartState, .. }));
    }

    #[test]
    fn test_duplicate_track() {
        let mut sequencer = Sequencer::new();
        sequencer.add_track(Track::new("t", "net")).unwrap();
        assert!(matches!(
            sequencer.add_track(Track::new("t", "other")),
            Err(AutomatonError::DuplicateName { kind: NameKind::Track, .. })
        ));
    }

    #[test]
    fn test_flag_unknown_track() {
        let mut sequencer = Sequencer::new();
        sequencer.add_track(Track::new("a", "net")).unwrap();

        assert!(sequencer.flag(&["a", "b"]).is_err());
        assert!(!sequencer.is_flagged("a"));
    }

    #[test]
    fn test_run_flagged_in_declaration_order() {
        let mut registry = IdentityRegistry::new();
        let mut networks = vec![
            sample_network(&mut registry, "first"),
            sample_network(&mut registry, "second"),
        ];

        let mut sequencer = Sequencer::new();
        sequencer
            .add_track(Track::new("one", "first").with_segment(Segment::play("all", 2).unwrap()))
            .unwrap();
        sequencer
            .add_track(Track::new("two", "second").with_segment(Segment::play("none", 3).unwrap()))
            .unwrap();
        sequencer
            .add_track(Track::new("three", "first").with_segment(Segment::rest(1).unwrap()))
            .unwrap();

        sequencer.flag(&["three", "one"]).unwrap();
        let reports = sequencer.run_flagged(&mut networks, &mut NullSink).unwrap();

        let order: Vec<&str> = reports.iter().map(|r| r.track.as_str()).collect();
        assert_eq!(order, vec!["one", "three"]);
        assert!(!sequencer.is_flagged("one"));
        assert_eq!(networks[0].node_by_label("on").unwrap().saved_history().len(), 3);
        assert!(networks[1].node_by_label("on").unwrap().saved_history().is_empty());
    }

    #[test]
    fn test_run_flagged_unknown_network() {
        let mut sequencer = Sequencer::new();
        sequencer
            .add_track(Track::new("t", "ghost").with_segment(Segment::rest(1).unwrap()))
            .unwrap();
        sequencer.flag(&["t"]).unwrap();

        let err = sequencer.run_flagged(&mut [], &mut NullSink).unwrap_err();
        assert!(matches!(err, AutomatonError::UnknownName { kind: NameKind::Network, .. }));
        assert!(sequencer.is_flagged("t"));
    }
}
