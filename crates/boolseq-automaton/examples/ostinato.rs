//! An ostinato grown from an elementary cellular automaton.
//!
//! Eight cells form a ring; each reads its left neighbour, itself and its
//! right neighbour through rule 90 (`left XOR right`). Every cell plays one
//! note of a C major scale. A track runs the ring from two different start
//! states with a rest between them and prints the resulting piano roll.
//!
//! Run with:
//! ```bash
//! RUST_LOG=debug cargo run --example ostinato -p boolseq-automaton
//! ```

use boolseq_automaton::{
    NodeState, NullSink, OutputChannel, RenderedSegment, RuleRow, Segment, Session, Track,
};
use tracing_subscriber::EnvFilter;

const RING: &str = "ring";
const SCALE: [&str; 8] = ["C4", "D4", "E4", "F4", "G4", "A4", "B4", "C5"];

// =============================================================================
// Network construction
// =============================================================================

fn cell(i: usize) -> String {
    format!("cell{i}")
}

fn build_ring(session: &mut Session) -> anyhow::Result<()> {
    session.create_network(RING)?.set_instrument(11);

    for (i, note) in SCALE.iter().enumerate() {
        session.add_node(RING, false, &cell(i))?;
        session.set_output_channel(RING, &cell(i), Some(note.parse::<OutputChannel>()?))?;
    }

    // Rule 90: the centre input is ignored.
    let arguments = vec!["left".to_string(), "centre".to_string(), "right".to_string()];
    session.add_vertex_function(RING, 3, "rule90", arguments, false)?;
    session.set_rules(
        RING,
        "rule90",
        &[
            RuleRow::new(vec![Some(true), None, Some(false)], true),
            RuleRow::new(vec![Some(false), None, Some(true)], true),
        ],
    )?;

    let n = SCALE.len();
    for i in 0..n {
        let inputs = [cell((i + n - 1) % n), cell(i), cell((i + 1) % n)];
        session.assign_function(RING, &cell(i), "rule90", &inputs)?;
    }

    session.add_start_state(RING, "seed", &[cell(3)], true)?;
    session.add_start_state(RING, "pair", &[cell(0), cell(5)], true)?;
    Ok(())
}

// =============================================================================
// Display
// =============================================================================

fn print_piano_roll(session: &Session) {
    let Some(network) = session.network(RING) else {
        return;
    };
    let snapshot = network.export_snapshot(true, true);

    for (column, identity) in snapshot.columns.iter().enumerate() {
        let channel = network
            .node_by_label(&identity.label)
            .and_then(|n| n.channel())
            .map(|c| c.note_name())
            .unwrap_or_default();
        let row: String = snapshot
            .rows
            .iter()
            .map(|r| match r[column] {
                NodeState::ActiveAudible | NodeState::ActiveSilent => '#',
                _ => '.',
            })
            .collect();
        println!("  {channel:>4} {row}");
    }
}

fn describe(segments: &[RenderedSegment]) {
    for segment in segments {
        let notes = segment
            .audible_voices()
            .map(|v| v.steps.iter().filter(|s| **s).count())
            .sum::<usize>();
        match &segment.start_state {
            Some(name) => println!(
                "  [{:>2}..{:>2}) {name}: {notes} note-steps",
                segment.offset,
                segment.offset + segment.duration
            ),
            None => println!(
                "  [{:>2}..{:>2}) rest",
                segment.offset,
                segment.offset + segment.duration
            ),
        }
    }
}

// =============================================================================
// Main
// =============================================================================

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let mut session = Session::new();
    build_ring(&mut session)?;

    let track = Track::new("ostinato", RING)
        .with_segment(Segment::play("seed", 8)?)
        .with_segment(Segment::rest(2)?)
        .with_segment(Segment::play("pair", 8)?);
    session.add_track(track)?;

    // Every cell reads both neighbours, so the whole ring is one group.
    if let Some(cycles) = session.network(RING).map(|n| n.combinational_cycles()) {
        println!("Same-step cycles under combinational evaluation: {}", cycles.len());
    }

    session.flag_tracks(&["ostinato"])?;
    let mut rendered: Vec<RenderedSegment> = Vec::new();
    let reports = session.run_flagged(&mut rendered)?;
    for report in &reports {
        println!(
            "Track '{}' on '{}': {} segments, {} steps",
            report.track, report.network, report.segments_run, report.total_steps
        );
    }

    describe(&rendered);
    println!();
    print_piano_roll(&session);

    // A second pass appends to the saved timeline.
    session.run_track("ostinato", &mut NullSink)?;
    if let Some(network) = session.network(RING) {
        println!();
        println!("Saved steps after two passes: {}", network.stats().saved_steps);
    }

    Ok(())
}
