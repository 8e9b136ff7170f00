use boolseq_automaton::{
    AutomatonResult, IdentityRegistry, Network, NodeHandle, RuleRow, StateSource, VertexFunction,
};
use proptest::prelude::*;
use std::collections::HashSet;

/// Reads input `i` as bit `i` of `index`.
struct BitSource {
    index: usize,
}

impl StateSource for BitSource {
    fn state_at(&mut self, node: NodeHandle, _step: usize) -> AutomatonResult<bool> {
        Ok(self.index & (1 << node.0) != 0)
    }
}

fn bits(index: usize, arity: usize) -> Vec<bool> {
    (0..arity).map(|bit| index & (1 << bit) != 0).collect()
}

/// Random wiring for a network of 2-input nodes.
#[derive(Debug, Clone)]
struct NetworkShape {
    initials: Vec<bool>,
    wiring: Vec<(usize, usize)>,
    table: Vec<bool>,
}

prop_compose! {
    fn arb_network_shape()(n in 1usize..7)(
        initials in prop::collection::vec(any::<bool>(), n),
        wiring in prop::collection::vec((0..n, 0..n), n),
        table in prop::collection::vec(any::<bool>(), 4)
    ) -> NetworkShape {
        NetworkShape { initials, wiring, table }
    }
}

fn build(shape: &NetworkShape) -> Network {
    let mut registry = IdentityRegistry::new();
    let mut net = Network::new("prop");
    for (i, initial) in shape.initials.iter().enumerate() {
        net.add_node(&mut registry, *initial, &format!("n{i}")).unwrap();
    }

    net.add_vertex_function(2, "f", vec!["x".into(), "y".into()], false)
        .unwrap();
    for (index, output) in shape.table.iter().enumerate() {
        net.set_rule("f", &bits(index, 2), *output).unwrap();
    }

    for (i, (x, y)) in shape.wiring.iter().enumerate() {
        let inputs = [format!("n{x}"), format!("n{y}")];
        net.assign_function(&format!("n{i}"), "f", &inputs).unwrap();
    }
    net
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_truth_table_returns_last_write(
        (arity, writes, default) in (0usize..=6).prop_flat_map(|arity| (
            Just(arity),
            prop::collection::vec((0usize..(1 << arity), any::<bool>()), 0..40),
            any::<bool>(),
        ))
    ) {
        let names = (0..arity).map(|i| format!("x{i}")).collect();
        let mut f = VertexFunction::new(arity, "f", names, default).unwrap();

        let mut expected = vec![default; 1 << arity];
        for (index, output) in &writes {
            f.set_rule(&bits(*index, arity), *output).unwrap();
            expected[*index] = *output;
        }

        let inputs: Vec<NodeHandle> = (0..arity).map(NodeHandle).collect();
        for (index, want) in expected.iter().enumerate() {
            prop_assert_eq!(f.output_for(&bits(index, arity)).unwrap(), *want);
            let mut source = BitSource { index };
            prop_assert_eq!(f.evaluate(&mut source, &inputs, 0).unwrap(), *want);
        }
    }

    #[test]
    fn test_wildcard_expansion_covers_each_concretization_once(
        pattern in prop::collection::vec(prop::option::of(any::<bool>()), 0..9),
        output in any::<bool>()
    ) {
        let k = pattern.iter().filter(|v| v.is_none()).count();
        let rows = VertexFunction::expand_wildcard_rules(vec![RuleRow::new(pattern.clone(), output)]);

        prop_assert_eq!(rows.len(), 1 << k);

        let mut seen = HashSet::new();
        for (inputs, out) in &rows {
            prop_assert_eq!(*out, output);
            prop_assert_eq!(inputs.len(), pattern.len());
            for (value, fixed) in inputs.iter().zip(&pattern) {
                if let Some(fixed) = fixed {
                    prop_assert_eq!(value, fixed);
                }
            }
            prop_assert!(seen.insert(inputs.clone()));
        }
    }

    #[test]
    fn test_step_zero_is_initial_state(
        shape in arb_network_shape(),
        ends in prop::collection::vec(0usize..20, 1..4)
    ) {
        let mut net = build(&shape);
        for end in ends {
            net.ensure_buffered(end).unwrap();
            for (i, initial) in shape.initials.iter().enumerate() {
                prop_assert_eq!(net.state_at(NodeHandle(i), 0).unwrap(), *initial);
            }
        }
    }

    #[test]
    fn test_buffering_is_idempotent(shape in arb_network_shape(), end in 0usize..20) {
        let mut net = build(&shape);
        net.ensure_buffered(end).unwrap();
        let first = net.histories();

        net.ensure_buffered(end).unwrap();
        for i in 0..shape.initials.len() {
            net.buffer_up_to(NodeHandle(i), end).unwrap();
        }

        prop_assert_eq!(net.histories(), first);
        prop_assert_eq!(net.buffered_to(), end);
    }
}
