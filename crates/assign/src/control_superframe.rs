//! Control superframe assignment.
//!
//! Every DN-DN wireless link uses one of two control superframe slots, and
//! links sharing a radio must use different slots. Links touching a CN
//! carry the unset marker instead.

use crate::error::{AssignError, AssignResult};
use meshplan_core::CONTROL_SUPERFRAME_UNSET;
use meshplan_topology::{ConfigLayer, ConfigStore, Link, ReadMode, TopologyView};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Link name to control superframe.
pub type LinkControlSuperframes = BTreeMap<String, u8>;

/// Slots tried, in order, for a fresh DN-DN link.
const SLOTS: [u8; 2] = [0, 1];

/// Control superframe validation and assignment.
pub struct ControlSuperframeHelper;

impl ControlSuperframeHelper {
    /// Whether the given end values are acceptable for `link`.
    ///
    /// Both ends must agree. CN links must be unset. DN-DN links must be
    /// set and differ from every other link on either radio.
    pub fn is_valid_link_control_superframe(
        topology: &dyn TopologyView,
        config: &dyn ConfigStore,
        link: &Link,
        a: Option<u8>,
        z: Option<u8>,
    ) -> bool {
        let (Some(a_node), Some(z_node)) =
            (topology.node(&link.a_node_name), topology.node(&link.z_node_name))
        else {
            return false;
        };
        if !link.is_wireless() || !link.has_radio_macs() {
            return true;
        }

        let value = match (a, z) {
            (Some(a), Some(z)) if a == z => a,
            _ => return false,
        };

        if a_node.is_cn() || z_node.is_cn() {
            return value == CONTROL_SUPERFRAME_UNSET;
        }
        if value == CONTROL_SUPERFRAME_UNSET {
            return false;
        }

        for (node_name, mac) in [
            (&link.a_node_name, &link.a_node_mac),
            (&link.z_node_name, &link.z_node_mac),
        ] {
            for other in topology.links_by_radio_mac(mac) {
                if other.name == link.name || !other.has_radio_macs() {
                    continue;
                }
                let Some(responder) = other.peer_mac(mac) else {
                    continue;
                };
                if config.node_link_control_superframe(node_name, responder, ReadMode::Merged)
                    == Some(value)
                {
                    return false;
                }
            }
        }
        true
    }

    /// Give a link a valid control superframe if one exists.
    ///
    /// A lone user value is kept if valid; two user values are never
    /// overridden. Returns whether the link ends up valid.
    pub fn assign_link_control_superframe(
        topology: &dyn TopologyView,
        config: &mut dyn ConfigStore,
        link: &Link,
    ) -> AssignResult<bool> {
        if !link.is_wireless() || !link.has_radio_macs() {
            return Ok(true);
        }

        let (a, z) = config.link_control_superframe(link, ReadMode::Merged);
        if Self::is_valid_link_control_superframe(topology, config, link, a, z) {
            return Ok(true);
        }

        let candidate = match config.link_control_superframe(link, ReadMode::UserOnly) {
            (Some(_), Some(_)) => return Ok(false),
            (Some(user), None) | (None, Some(user)) => Some(user),
            (None, None) => {
                let (Some(a_node), Some(z_node)) =
                    (topology.node(&link.a_node_name), topology.node(&link.z_node_name))
                else {
                    return Ok(false);
                };
                if a_node.is_cn() || z_node.is_cn() {
                    Some(CONTROL_SUPERFRAME_UNSET)
                } else {
                    SLOTS.into_iter().find(|&slot| {
                        Self::is_valid_link_control_superframe(
                            topology,
                            config,
                            link,
                            Some(slot),
                            Some(slot),
                        )
                    })
                }
            }
        };

        match candidate {
            Some(value)
                if Self::is_valid_link_control_superframe(
                    topology,
                    config,
                    link,
                    Some(value),
                    Some(value),
                ) =>
            {
                tracing::info!(link = %link.name, control_superframe = value, "Assigned control superframe");
                config.set_link_control_superframe(link, Some(value), ConfigLayer::Auto)?;
                Ok(true)
            }
            _ => {
                tracing::warn!(link = %link.name, "No valid control superframe for link");
                Ok(false)
            }
        }
    }

    /// Slot a link should take given what its radio siblings already use.
    ///
    /// CN links get the unset marker. A link whose siblings use both slots
    /// cannot be placed.
    pub fn preferred_control_superframe(
        topology: &dyn TopologyView,
        link: &Link,
        user: &LinkControlSuperframes,
        auto: &LinkControlSuperframes,
        mac_links: &BTreeMap<String, BTreeSet<String>>,
        assigned: &LinkControlSuperframes,
    ) -> AssignResult<u8> {
        let is_cn = |name: &str| {
            topology
                .node(name)
                .map_or(true, |node| node.is_cn())
        };
        if is_cn(&link.a_node_name) || is_cn(&link.z_node_name) {
            return Ok(CONTROL_SUPERFRAME_UNSET);
        }

        let used: BTreeSet<u8> = [&link.a_node_mac, &link.z_node_mac]
            .into_iter()
            .filter_map(|mac| mac_links.get(mac))
            .flatten()
            .filter(|name| **name != link.name)
            .filter_map(|name| assigned.get(name).copied())
            .filter(|value| *value != CONTROL_SUPERFRAME_UNSET)
            .collect();

        match used.len() {
            0 => {}
            1 => return Ok(if used.contains(&0) { 1 } else { 0 }),
            _ => {
                return Err(AssignError::ImpossibleControlSuperframe {
                    link: link.name.clone(),
                })
            }
        }

        let configured = |values: &LinkControlSuperframes| {
            values
                .get(&link.name)
                .copied()
                .filter(|value| *value != CONTROL_SUPERFRAME_UNSET)
        };
        Ok(configured(user).or_else(|| configured(auto)).unwrap_or(0))
    }

    /// Re-plan control superframes for every wireless link.
    ///
    /// User-configured links are placed first, then links with a valid auto
    /// value, then the rest; each placement immediately pulls in its radio
    /// siblings. Nothing is written if the plan is infeasible or, unless
    /// `clear_user`, would change a user value.
    pub fn assign_all_control_superframes(
        topology: &dyn TopologyView,
        config: &mut dyn ConfigStore,
        clear_user: bool,
    ) -> AssignResult<LinkControlSuperframes> {
        let mut mac_links: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut user = LinkControlSuperframes::new();
        let mut auto = LinkControlSuperframes::new();
        let (mut user_links, mut auto_links, mut fresh_links) = (Vec::new(), Vec::new(), Vec::new());

        for link in topology.links() {
            if !link.is_wireless() || !link.has_radio_macs() {
                continue;
            }
            for mac in [&link.a_node_mac, &link.z_node_mac] {
                mac_links
                    .entry(mac.clone())
                    .or_default()
                    .insert(link.name.clone());
            }

            if !clear_user {
                if let (Some(value), _) | (None, Some(value)) =
                    config.link_control_superframe(link, ReadMode::UserOnly)
                {
                    user.insert(link.name.clone(), value);
                    user_links.push(link);
                    continue;
                }
            }

            match config.link_control_superframe(link, ReadMode::Merged) {
                (Some(a), Some(z)) if a == z && a != CONTROL_SUPERFRAME_UNSET => {
                    auto.insert(link.name.clone(), a);
                    auto_links.push(link);
                }
                _ => fresh_links.push(link),
            }
        }

        let mut queue: VecDeque<&Link> = user_links
            .into_iter()
            .chain(auto_links)
            .chain(fresh_links)
            .collect();
        let mut assigned = LinkControlSuperframes::new();
        while let Some(link) = queue.pop_front() {
            if assigned.contains_key(&link.name) {
                continue;
            }

            let value = Self::preferred_control_superframe(
                topology, link, &user, &auto, &mac_links, &assigned,
            )?;
            if !clear_user && user.get(&link.name).is_some_and(|u| *u != value) {
                return Err(AssignError::UserControlSuperframeConflict {
                    link: link.name.clone(),
                });
            }
            assigned.insert(link.name.clone(), value);

            for dependent in topology.same_radio_links(link).into_iter().rev() {
                queue.push_front(dependent);
            }
        }

        if clear_user {
            for link in topology.links() {
                config.set_link_control_superframe(link, None, ConfigLayer::User)?;
            }
        }
        for link in topology.links() {
            if !link.is_wireless() {
                continue;
            }
            let value = assigned.get(&link.name).copied();
            tracing::debug!(link = %link.name, control_superframe = ?value, "Writing control superframe");
            config.set_link_control_superframe(link, value, ConfigLayer::Auto)?;
        }
        tracing::info!(links = assigned.len(), "Control superframes assigned");
        Ok(assigned)
    }
}
