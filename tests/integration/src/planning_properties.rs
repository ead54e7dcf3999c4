//! Planner invariants over random topologies

use crate::test_utils::*;
use meshplan_assign::{
    ChannelHelper, ControlSuperframeHelper, GolayHelper, LinkParam, OccSolver, PolarityHelper,
    VertexWeights,
};
use meshplan_core::CONTROL_SUPERFRAME_UNSET;
use meshplan_topology::{
    ConfigStore, InMemoryConfigStore, LinkGroupHelper, MacToPolarity, ReadMode, TopologyView,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Whether the site graph stays bipartite once `cover` is removed.
fn is_bipartite_without(topology: &dyn TopologyView, cover: &BTreeSet<String>) -> bool {
    let mut graph = OccSolver::site_graph(topology);
    for site in cover {
        graph.remove_vertex(site);
    }

    let mut side: std::collections::BTreeMap<String, bool> = Default::default();
    let vertices: Vec<String> = graph.vertices().cloned().collect();
    for start in vertices {
        if side.contains_key(&start) {
            continue;
        }
        side.insert(start.clone(), false);
        let mut stack = vec![start];
        while let Some(v) = stack.pop() {
            let here = side[&v];
            for n in graph.neighbors(&v) {
                match side.get(n) {
                    Some(s) if *s == here => return false,
                    Some(_) => {}
                    None => {
                        side.insert(n.clone(), !here);
                        stack.push(n.clone());
                    }
                }
            }
        }
    }
    true
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn successful_plans_leave_every_link_valid(topology in arb_topology()) {
        let mut config = InMemoryConfigStore::default();
        if plan_network(&topology, &mut config, &Default::default(), false).is_ok() {
            prop_assert!(invalid_links(&topology, &config).is_empty());
        }
    }

    #[test]
    fn occ_solution_breaks_every_odd_cycle(topology in arb_topology()) {
        let cover = OccSolver::from_topology(&topology, VertexWeights::new()).get_occ_solution();
        prop_assert!(is_bipartite_without(&topology, &cover));
    }

    #[test]
    fn link_groups_partition_radio_links(topology in arb_topology()) {
        let groups = LinkGroupHelper::get_link_groups(&topology);
        for link in topology.links().iter().filter(|l| l.has_radio_macs()) {
            let owners: Vec<&String> = groups
                .iter()
                .filter(|(_, links)| links.contains(&link.name))
                .map(|(name, _)| name)
                .collect();
            prop_assert_eq!(owners.len(), 1);
            for sibling in topology.same_radio_links(link) {
                prop_assert!(groups[owners[0]].contains(&sibling.name));
            }
        }
    }

    #[test]
    fn polarity_plan_without_conflicts_is_valid(topology in arb_topology()) {
        let plan = PolarityHelper::optimize_polarity(
            &topology,
            &MacToPolarity::new(),
            &MacToPolarity::new(),
        );
        if plan.succeeded() {
            for link in topology.links().iter().filter(|l| l.has_radio_macs()) {
                prop_assert!(PolarityHelper::is_valid_link_polarity(
                    plan.polarities.get(&link.a_node_mac).copied(),
                    plan.polarities.get(&link.z_node_mac).copied(),
                ));
            }
        }
    }

    #[test]
    fn network_colouring_is_idempotent(topology in arb_topology()) {
        let mut config = InMemoryConfigStore::default();
        config.set_enabled_channels(BTreeSet::from([1, 2, 3]));
        prop_assume!(PolarityHelper::apply_polarity_optimization(&topology, &mut config, false).is_ok());

        let channels = ChannelHelper::default();
        let golay = GolayHelper::default();
        let first = (
            channels.assign_network_channels(&topology, &mut config, false).unwrap(),
            golay.assign_network_golay(&topology, &mut config, false).unwrap(),
        );
        let second = (
            channels.assign_network_channels(&topology, &mut config, false).unwrap(),
            golay.assign_network_golay(&topology, &mut config, false).unwrap(),
        );
        prop_assert_eq!(first, second);
    }

    #[test]
    fn control_superframes_respect_node_types(topology in arb_topology()) {
        let mut config = InMemoryConfigStore::default();
        if let Ok(assigned) =
            ControlSuperframeHelper::assign_all_control_superframes(&topology, &mut config, false)
        {
            for link in topology.links().iter().filter(|l| l.has_radio_macs()) {
                let touches_cn = [&link.a_node_name, &link.z_node_name]
                    .iter()
                    .any(|n| topology.node(n).is_some_and(|node| node.is_cn()));
                let value = assigned[&link.name];
                if touches_cn {
                    prop_assert_eq!(value, CONTROL_SUPERFRAME_UNSET);
                } else {
                    prop_assert_ne!(value, CONTROL_SUPERFRAME_UNSET);
                }
                let (a, z) = config.link_control_superframe(link, ReadMode::Merged);
                prop_assert_eq!(a, Some(value));
                prop_assert_eq!(z, Some(value));
            }
            prop_assert!(invalid_links(&topology, &config)
                .iter()
                .all(|(_, param)| *param != LinkParam::ControlSuperframe));
        }
    }
}
