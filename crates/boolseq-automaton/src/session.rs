//! Session: the top-level context object.
//!
//! A session owns the identity registry, every network and the sequencer.
//! Independent sessions share nothing.

use boolseq_core::{NodeHandle, OutputChannel};
use tracing::info;

use crate::config::NetworkConfig;
use crate::error::{AutomatonError, AutomatonResult, NameKind};
use crate::network::Network;
use crate::registry::IdentityRegistry;
use crate::sequencer::{find_network_mut, run_track, SegmentSink, Sequencer, Track, TrackReport};
use crate::vertex_function::RuleRow;

/// Networks, tracks and the identities they use.
#[derive(Debug, Default, Clone)]
pub struct Session {
    config: NetworkConfig,
    registry: IdentityRegistry,
    networks: Vec<Network>,
    sequencer: Sequencer,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every network created by this session uses `config`.
    pub fn with_config(config: NetworkConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    // -------------------------------------------------------------------------
    // Networks
    // -------------------------------------------------------------------------

    /// Create an empty network. Names are unique within the session.
    pub fn create_network(&mut self, name: &str) -> AutomatonResult<&mut Network> {
        if self.network(name).is_some() {
            return Err(AutomatonError::duplicate(NameKind::Network, name));
        }
        self.networks
            .push(Network::with_config(name, self.config.clone()));
        info!(network = name, "network_created");
        find_network_mut(&mut self.networks, name)
    }

    /// The network called `name`, created if missing.
    pub fn network_or_create(&mut self, name: &str) -> AutomatonResult<&mut Network> {
        if self.network(name).is_none() {
            return self.create_network(name);
        }
        find_network_mut(&mut self.networks, name)
    }

    pub fn network(&self, name: &str) -> Option<&Network> {
        self.networks.iter().find(|n| n.name() == name)
    }

    pub fn network_mut(&mut self, name: &str) -> AutomatonResult<&mut Network> {
        find_network_mut(&mut self.networks, name)
    }

    /// Networks in creation order.
    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    // -------------------------------------------------------------------------
    // Construction calls routed to a network
    // -------------------------------------------------------------------------

    pub fn add_node(&mut self, network: &str, initial_state: bool, label: &str) -> AutomatonResult<NodeHandle> {
        let net = find_network_mut(&mut self.networks, network)?;
        net.add_node(&mut self.registry, initial_state, label)
    }

    pub fn add_vertex_function(
        &mut self,
        network: &str,
        arity: usize,
        name: &str,
        argument_names: Vec<String>,
        default_output: bool,
    ) -> AutomatonResult<()> {
        self.network_mut(network)?
            .add_vertex_function(arity, name, argument_names, default_output)
            .map(|_| ())
    }

    pub fn set_rules(&mut self, network: &str, function: &str, rows: &[RuleRow]) -> AutomatonResult<usize> {
        self.network_mut(network)?.set_rules(function, rows)
    }

    pub fn assign_function<S: AsRef<str>>(
        &mut self,
        network: &str,
        node_label: &str,
        function_name: &str,
        input_labels: &[S],
    ) -> AutomatonResult<()> {
        self.network_mut(network)?
            .assign_function(node_label, function_name, input_labels)
    }

    /// Register a start state. Names are unique across every network of
    /// the session.
    pub fn add_start_state<S: AsRef<str>>(
        &mut self,
        network: &str,
        name: &str,
        node_labels: &[S],
        value: bool,
    ) -> AutomatonResult<()> {
        if self.networks.iter().any(|n| n.start_state(name).is_some()) {
            return Err(AutomatonError::duplicate(NameKind::StartState, name));
        }
        self.network_mut(network)?
            .add_start_state(name, node_labels, value)
    }

    pub fn apply_start_state(&mut self, network: &str, name: Option<&str>) -> AutomatonResult<()> {
        self.network_mut(network)?.apply_start_state(name)
    }

    pub fn set_output_channel(
        &mut self,
        network: &str,
        node_label: &str,
        channel: Option<OutputChannel>,
    ) -> AutomatonResult<()> {
        self.network_mut(network)?
            .set_output_channel(node_label, channel)
    }

    // -------------------------------------------------------------------------
    // Tracks
    // -------------------------------------------------------------------------

    /// Register a track bound to an existing network.
    pub fn add_track(&mut self, track: Track) -> AutomatonResult<()> {
        if self.network(track.network()).is_none() {
            return Err(AutomatonError::unknown(NameKind::Network, track.network()));
        }
        self.sequencer.add_track(track)
    }

    pub fn track_mut(&mut self, name: &str) -> AutomatonResult<&mut Track> {
        self.sequencer.track_mut(name)
    }

    pub fn flag_tracks<S: AsRef<str>>(&mut self, names: &[S]) -> AutomatonResult<()> {
        self.sequencer.flag(names)
    }

    /// Run one track on its network.
    pub fn run_track<S>(&mut self, name: &str, sink: &mut S) -> AutomatonResult<TrackReport>
    where
        S: SegmentSink + ?Sized,
    {
        let track = self
            .sequencer
            .track(name)
            .ok_or_else(|| AutomatonError::unknown(NameKind::Track, name))?;
        let network = find_network_mut(&mut self.networks, track.network())?;
        run_track(track, network, sink)
    }

    /// Run every flagged track in declaration order.
    pub fn run_flagged<S>(&mut self, sink: &mut S) -> AutomatonResult<Vec<TrackReport>>
    where
        S: SegmentSink + ?Sized,
    {
        self.sequencer.run_flagged(&mut self.networks, sink)
    }

    /// Tear everything down, including the identity registry.
    ///
    /// Configuration is kept.
    pub fn reset(&mut self) {
        self.networks.clear();
        self.sequencer = Sequencer::new();
        self.registry.reset();
        info!("session_reset");
    }
}
