//! Shared fixtures for cross-crate planner tests

use meshplan_assign::{
    AssignResult, ChannelHelper, ControlSuperframeHelper, GolayHelper, GroupName2Color,
    InterferenceHelper, LinkControlSuperframes, LinkParam, PolarityHelper,
};
use meshplan_core::InterferenceConfig;
use meshplan_topology::test_utils::create_topology;
use meshplan_topology::{
    ConfigStore, MacToPolarity, ReadMode, Topology, TopologyDocument, TopologyView,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

/// Sample topology document: a four-pole street with a P2MP hub and a CN.
pub const STREET_TOPOLOGY_JSON: &str = r#"{
  "name": "street",
  "sites": [
    {"name": "pole-a", "location": {"latitude": 37.4800, "longitude": -122.1500}},
    {"name": "pole-b", "location": {"latitude": 37.4810, "longitude": -122.1500}},
    {"name": "pole-c", "location": {"latitude": 37.4820, "longitude": -122.1500}},
    {"name": "pole-d", "location": {"latitude": 37.4810, "longitude": -122.1490}}
  ],
  "nodes": [
    {"name": "dn-a", "node_type": "DN", "site_name": "pole-a", "wlan_macs": ["00:00:00:00:0A:01"]},
    {"name": "dn-b", "node_type": "DN", "site_name": "pole-b", "wlan_macs": ["00:00:00:00:0b:01"]},
    {"name": "dn-c", "node_type": "DN", "site_name": "pole-c", "wlan_macs": ["00:00:00:00:0c:01"]},
    {"name": "cn-d", "node_type": "CN", "site_name": "pole-d", "wlan_macs": ["00:00:00:00:0d:01"]}
  ],
  "links": [
    {"name": "link-dn-a-dn-b", "a_node_name": "dn-a", "a_node_mac": "00:00:00:00:0a:01",
     "z_node_name": "dn-b", "z_node_mac": "00:00:00:00:0b:01", "link_type": "WIRELESS"},
    {"name": "link-dn-b-dn-c", "a_node_name": "dn-b", "a_node_mac": "00:00:00:00:0b:01",
     "z_node_name": "dn-c", "z_node_mac": "00:00:00:00:0c:01", "link_type": "WIRELESS"},
    {"name": "link-cn-d-dn-b", "a_node_name": "cn-d", "a_node_mac": "00:00:00:00:0d:01",
     "z_node_name": "dn-b", "z_node_mac": "00:00:00:00:0b:01", "link_type": "WIRELESS"},
    {"name": "link-dn-a-dn-c", "a_node_name": "dn-a", "z_node_name": "dn-c",
     "link_type": "ETHERNET"}
  ]
}"#;

/// The street document, parsed but not yet validated.
pub fn street_document() -> TopologyDocument {
    serde_json::from_str(STREET_TOPOLOGY_JSON).expect("street document must parse")
}

/// The street topology.
pub fn street_topology() -> Topology {
    Topology::from_document(street_document()).expect("street topology must load")
}

/// Parse JSON text into a value for structural comparison.
pub fn json_value(json: &str) -> serde_json::Value {
    serde_json::from_str(json).expect("must be valid JSON")
}

/// Deterministic RNG for tie-breaks in tests.
pub fn test_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Result of planning every link parameter of a network.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkPlan {
    /// Radio polarities
    pub polarities: MacToPolarity,
    /// Channel per link group
    pub channels: GroupName2Color,
    /// Golay code per link group
    pub golay: GroupName2Color,
    /// Control superframe per link
    pub control_superframes: LinkControlSuperframes,
}

/// Install the test subscriber
pub fn init_logging() {
    meshplan_core::logging::init_for_tests();
}

/// Plan polarity, channels, Golay codes and control superframes in turn.
pub fn plan_network(
    topology: &Topology,
    config: &mut dyn ConfigStore,
    interference: &InterferenceConfig,
    clear_user: bool,
) -> AssignResult<NetworkPlan> {
    let interference = InterferenceHelper::new(interference.clone());
    let polarities = PolarityHelper::apply_polarity_optimization(topology, config, clear_user)?;
    let channels = ChannelHelper::new(interference.clone())
        .assign_network_channels(topology, config, clear_user)?;
    let golay =
        GolayHelper::new(interference).assign_network_golay(topology, config, clear_user)?;
    let control_superframes =
        ControlSuperframeHelper::assign_all_control_superframes(topology, config, clear_user)?;
    tracing::debug!(
        topology = topology.name(),
        radios = polarities.len(),
        groups = channels.len(),
        links = control_superframes.len(),
        "Planned network"
    );
    Ok(NetworkPlan {
        polarities,
        channels,
        golay,
        control_superframes,
    })
}

/// Every (link, parameter) pair whose merged configuration is invalid.
pub fn invalid_links(topology: &Topology, config: &dyn ConfigStore) -> Vec<(String, LinkParam)> {
    let mut invalid = Vec::new();
    for link in topology.links() {
        if !link.has_radio_macs() {
            continue;
        }
        let (a, z) = (&link.a_node_name, &link.z_node_name);
        let checks = [
            (
                LinkParam::Polarity,
                PolarityHelper::is_valid_link_polarity(
                    config.radio_polarity(a, &link.a_node_mac, ReadMode::Merged),
                    config.radio_polarity(z, &link.z_node_mac, ReadMode::Merged),
                ),
            ),
            (
                LinkParam::Channel,
                ChannelHelper::is_valid_link_channel(
                    config.radio_channel(a, &link.a_node_mac, ReadMode::Merged),
                    config.radio_channel(z, &link.z_node_mac, ReadMode::Merged),
                ),
            ),
            (
                LinkParam::Golay,
                GolayHelper::is_valid_link_golay(
                    config.node_link_golay(a, &link.z_node_mac, ReadMode::Merged),
                    config.node_link_golay(z, &link.a_node_mac, ReadMode::Merged),
                ),
            ),
            (LinkParam::ControlSuperframe, {
                let (a_csf, z_csf) = config.link_control_superframe(link, ReadMode::Merged);
                ControlSuperframeHelper::is_valid_link_control_superframe(
                    topology, config, link, a_csf, z_csf,
                )
            }),
        ];
        for (param, valid) in checks {
            if !valid {
                invalid.push((link.name.clone(), param));
            }
        }
    }
    invalid
}

/// Small random topologies: up to seven single-radio nodes on up to
/// seven poles, random links, roughly one node in five a CN.
pub fn arb_topology() -> impl Strategy<Value = Topology> {
    (2usize..8)
        .prop_flat_map(|num_nodes| {
            let pairs: Vec<(usize, usize)> = (0..num_nodes)
                .flat_map(|a| (a + 1..num_nodes).map(move |z| (a, z)))
                .collect();
            let max_links = pairs.len();
            (
                Just(num_nodes),
                proptest::sample::subsequence(pairs, 1..=max_links),
                proptest::collection::vec(0..num_nodes, num_nodes),
                proptest::collection::vec(proptest::bool::weighted(0.2), num_nodes),
            )
        })
        .prop_map(|(num_nodes, links, sites, cn_flags)| {
            let site_map: Vec<(usize, usize)> = sites.into_iter().enumerate().collect();
            let cn_nodes: Vec<usize> = cn_flags
                .iter()
                .enumerate()
                .filter(|(_, is_cn)| **is_cn)
                .map(|(i, _)| i)
                .collect();
            create_topology(num_nodes, &links, num_nodes, &site_map, &cn_nodes)
        })
}
