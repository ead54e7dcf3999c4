//! End-to-end planning scenarios
//!
//! Tests cover:
//! - Planning a topology loaded from its JSON document
//! - Planner configuration loaded from TOML driving channel choice
//! - Re-planning after the enabled channel set changes
//! - User overrides surviving or blocking a re-plan
//! - Per-link repair of links added after planning

use crate::test_utils::*;
use meshplan_assign::{
    AssignError, ChannelHelper, InterferenceHelper, LinkConfigValidator, LinkParam,
};
use meshplan_core::{GolayIdx, PlannerConfig, Polarity, CONTROL_SUPERFRAME_UNSET};
use meshplan_topology::test_utils::{create_topology, link_name_for, mac_for, node_name};
use meshplan_topology::{
    ConfigLayer, ConfigStore, InMemoryConfigStore, Link, ReadMode, Topology, TopologyView,
};
use std::collections::BTreeSet;

fn link<'a>(topology: &'a Topology, name: &str) -> &'a Link {
    topology.link(name).expect("link must exist")
}

#[test]
fn test_street_plan_is_fully_valid() {
    init_logging();
    let _span = tracing::info_span!("street_plan").entered();
    let topology = street_topology();
    let mut config = InMemoryConfigStore::default();

    let plan = plan_network(&topology, &mut config, &Default::default(), false).unwrap();
    assert!(invalid_links(&topology, &config).is_empty());

    // hub radio on pole-b terminates all three wireless links
    assert_eq!(plan.channels.len(), 1);
    assert_eq!(plan.golay.len(), 1);
    assert_eq!(plan.polarities["00:00:00:00:0a:01"], Polarity::Odd);
    assert_eq!(plan.polarities["00:00:00:00:0b:01"], Polarity::Even);

    assert_eq!(plan.control_superframes["link-dn-a-dn-b"], 0);
    assert_eq!(plan.control_superframes["link-dn-b-dn-c"], 1);
    assert_eq!(
        plan.control_superframes["link-cn-d-dn-b"],
        CONTROL_SUPERFRAME_UNSET
    );
    assert!(!plan.control_superframes.contains_key("link-dn-a-dn-c"));

    let wired = link(&topology, "link-dn-a-dn-c");
    assert_eq!(config.link_channel(wired, ReadMode::Merged), None);
}

#[test]
fn test_replanning_is_stable() {
    let topology = street_topology();
    let mut config = InMemoryConfigStore::default();

    let first = plan_network(&topology, &mut config, &Default::default(), false).unwrap();
    let snapshot = config.to_document();
    let second = plan_network(&topology, &mut config, &Default::default(), false).unwrap();

    assert_eq!(first, second);
    assert_eq!(snapshot, config.to_document());
}

#[test]
fn test_planner_config_drives_channels() {
    let planner = PlannerConfig::from_toml_str(
        r#"
        [channels]
        enabled = [1, 3, 9]

        [interference]
        max_distance_m = 300.0

        [randomness]
        seed = "street"
        "#,
    )
    .unwrap();
    let topology = street_topology();
    let mut config = InMemoryConfigStore::from_config(&planner);
    assert_eq!(config.enabled_channels(), BTreeSet::from([1, 3]));

    let plan = plan_network(&topology, &mut config, &planner.interference, false).unwrap();
    assert!(plan.channels.values().all(|c| [1, 3].contains(c)));
    assert!(invalid_links(&topology, &config).is_empty());
}

#[test]
fn test_disabling_a_channel_moves_the_network() {
    let topology = street_topology();
    let mut config = InMemoryConfigStore::new(BTreeSet::from([1, 2]));
    let helper = ChannelHelper::default();
    helper
        .assign_network_channels(&topology, &mut config, false)
        .unwrap();
    assert!(!helper.validate_topology_channels(&topology, &mut config).unwrap());
    assert_eq!(config.used_channels(&topology), BTreeSet::from([1]));

    config.set_enabled_channels(BTreeSet::from([3]));
    assert!(ChannelHelper::disabled_channel_in_use(&topology, &config));
    assert!(helper.validate_topology_channels(&topology, &mut config).unwrap());
    assert_eq!(config.used_channels(&topology), BTreeSet::from([3]));
    assert!(!ChannelHelper::disabled_channel_in_use(&topology, &config));
}

#[test]
fn test_user_override_survives_replan() {
    let topology = street_topology();
    let mut config = InMemoryConfigStore::new(BTreeSet::from([1, 2, 3, 4]));
    let hub_link = link(&topology, "link-dn-a-dn-b").clone();
    for l in topology.links().iter().filter(|l| l.has_radio_macs()) {
        config
            .set_link_channel(l, Some(4), ConfigLayer::User)
            .unwrap();
    }

    let plan = plan_network(&topology, &mut config, &Default::default(), false).unwrap();
    assert!(plan.channels.values().all(|c| *c == 4));
    assert_eq!(config.link_channel(&hub_link, ReadMode::UserOnly), Some(4));

    // clearing moves the value into the auto layer
    let plan = plan_network(&topology, &mut config, &Default::default(), true).unwrap();
    assert!(plan.channels.values().all(|c| *c == 4));
    assert_eq!(config.link_channel(&hub_link, ReadMode::UserOnly), None);
    assert_eq!(config.link_channel(&hub_link, ReadMode::AutoOnly), Some(4));
}

#[test]
fn test_conflicting_user_channels_block_replan() {
    let topology = street_topology();
    let mut config = InMemoryConfigStore::new(BTreeSet::from([1, 2]));
    for (node, mac, channel) in [
        ("dn-a", "00:00:00:00:0a:01", 1),
        ("dn-b", "00:00:00:00:0b:01", 1),
        ("cn-d", "00:00:00:00:0d:01", 1),
        ("dn-c", "00:00:00:00:0c:01", 2),
    ] {
        config
            .set_radio_channel(node, mac, Some(channel), ConfigLayer::User)
            .unwrap();
    }
    let before = config.to_document();

    let err = ChannelHelper::default()
        .assign_network_channels(&topology, &mut config, false)
        .unwrap_err();
    assert!(matches!(err, AssignError::IncompatibleChannel { .. }));
    assert_eq!(before, config.to_document());
}

#[test]
fn test_user_polarity_conflict_blocks_replan() {
    let topology = street_topology();
    let mut config = InMemoryConfigStore::default();
    // both ends of a P2P link locked to the same parity
    config
        .set_radio_polarity("dn-a", "00:00:00:00:0a:01", Some(Polarity::Odd), ConfigLayer::User)
        .unwrap();
    config
        .set_radio_polarity("dn-b", "00:00:00:00:0b:01", Some(Polarity::Odd), ConfigLayer::User)
        .unwrap();
    let before = config.to_document();

    let err = plan_network(&topology, &mut config, &Default::default(), false).unwrap_err();
    assert!(matches!(
        err,
        AssignError::UnsolvableOddCycle { .. } | AssignError::UserPolarityConflict { .. }
    ));
    assert_eq!(before, config.to_document());

    plan_network(&topology, &mut config, &Default::default(), true).unwrap();
    assert!(invalid_links(&topology, &config).is_empty());
}

#[test]
fn test_new_link_is_repaired_next_to_planned_network() {
    let planned = create_topology(3, &[(0, 1), (1, 2)], 3, &[], &[]);
    let mut config = InMemoryConfigStore::default();
    plan_network(&planned, &mut config, &Default::default(), false).unwrap();

    // a fourth pole is added after planning
    let grown = create_topology(4, &[(0, 1), (1, 2), (2, 3)], 4, &[], &[]);
    let new_link = link(&grown, &link_name_for(2, 3)).clone();
    let mut validator =
        LinkConfigValidator::new(InterferenceHelper::default(), test_rng(7));
    let report = validator
        .validate_link_config(&grown, &mut config, &new_link)
        .unwrap();

    assert!(report.is_valid());
    assert_eq!(
        report.repaired,
        vec![
            LinkParam::Polarity,
            LinkParam::Channel,
            LinkParam::Golay,
            LinkParam::ControlSuperframe
        ]
    );
    assert!(invalid_links(&grown, &config).is_empty());

    // new radio takes the opposite parity of the one it joins
    let joined = config.radio_polarity(&node_name(2), &mac_for(2), ReadMode::Merged);
    let added = config.radio_polarity(&node_name(3), &mac_for(3), ReadMode::Merged);
    assert!(!joined.unwrap().same_parity(added.unwrap()));

    // Golay follows the link sharing node 2
    let previous = link(&grown, &link_name_for(1, 2));
    assert_eq!(
        config.link_golay(&new_link, ReadMode::Merged),
        config.link_golay(previous, ReadMode::Merged)
    );
    assert_ne!(
        config.link_golay(&new_link, ReadMode::Merged),
        Some(GolayIdx::default())
    );
}

#[test]
fn test_street_document_is_standardized_on_load() {
    let document = street_document();
    assert_eq!(document.nodes[0].wlan_macs[0], "00:00:00:00:0A:01");

    let topology = street_topology();
    assert_eq!(topology.node("dn-a").unwrap().wlan_macs[0], "00:00:00:00:0a:01");

    let dumped = json_value(&topology.to_json().unwrap());
    assert_eq!(dumped["links"].as_array().map(Vec::len), Some(4));
    assert_eq!(dumped["links"][3]["link_type"], "ETHERNET");
    let reloaded = Topology::from_json(&topology.to_json().unwrap()).unwrap();
    assert_eq!(reloaded.links(), topology.links());
}

#[test]
fn test_plan_serializes_per_parameter() {
    let topology = street_topology();
    let mut config = InMemoryConfigStore::default();
    let plan = plan_network(&topology, &mut config, &Default::default(), false).unwrap();

    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["polarities"]["00:00:00:00:0a:01"], "ODD");
    assert_eq!(json["polarities"]["00:00:00:00:0b:01"], "EVEN");
    assert_eq!(
        json["control_superframes"]["link-cn-d-dn-b"],
        CONTROL_SUPERFRAME_UNSET
    );
    assert_eq!(json["channels"].as_object().map(|m| m.len()), Some(1));
}

#[test]
fn test_config_document_round_trip_after_plan() {
    let topology = street_topology();
    let mut config = InMemoryConfigStore::default();
    plan_network(&topology, &mut config, &Default::default(), false).unwrap();

    let json = config.to_json().unwrap();
    assert_eq!(
        json_value(&json),
        serde_json::to_value(config.to_document()).unwrap()
    );
    let restored = InMemoryConfigStore::from_json(&json).unwrap();
    assert!(invalid_links(&topology, &restored).is_empty());
    assert_eq!(restored.to_document(), config.to_document());
}
