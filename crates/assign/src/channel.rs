//! Channel assignment for wireless links.

use crate::error::{AssignError, AssignResult};
use crate::interference::{GroupName2Color, InterferenceHelper};
use meshplan_core::{Channel, CHANNEL_RANGE};
use meshplan_topology::{
    ConfigLayer, ConfigStore, GroupNameToLinkNames, Link, LinkGroupHelper, ReadMode, TopologyView,
};
use rand::Rng;

/// Assigns channels to single links and whole networks.
#[derive(Debug, Clone, Default)]
pub struct ChannelHelper {
    interference: InterferenceHelper,
}

impl ChannelHelper {
    /// Helper using the given interference model.
    pub fn new(interference: InterferenceHelper) -> Self {
        Self { interference }
    }

    /// Whether a channel number is one radios support.
    pub fn is_valid_channel(channel: Channel) -> bool {
        CHANNEL_RANGE.contains(&channel)
    }

    /// Whether both ends carry the same channel.
    pub fn is_valid_link_channel(a: Option<Channel>, z: Option<Channel>) -> bool {
        matches!((a, z), (Some(a), Some(z)) if a == z)
    }

    /// Give a link a usable channel, touching as little as possible.
    ///
    /// Returns `false` only when conflicting user overrides on both ends
    /// make the link unrepairable.
    pub fn assign_link_channel<R: Rng + ?Sized>(
        &self,
        topology: &dyn TopologyView,
        config: &mut dyn ConfigStore,
        link: &Link,
        rng: &mut R,
    ) -> AssignResult<bool> {
        if !link.is_wireless() || !link.has_radio_macs() {
            return Ok(true);
        }

        let a = config.radio_channel(&link.a_node_name, &link.a_node_mac, ReadMode::Merged);
        let z = config.radio_channel(&link.z_node_name, &link.z_node_mac, ReadMode::Merged);
        if Self::is_valid_link_channel(a, z) {
            return Ok(true);
        }

        // one end already chosen, e.g. a P2MP radio
        if let (Some(channel), None) | (None, Some(channel)) = (a, z) {
            config.set_link_channel(link, Some(channel), ConfigLayer::Auto)?;
            return Ok(true);
        }

        let a_user = config.radio_channel(&link.a_node_name, &link.a_node_mac, ReadMode::UserOnly);
        let z_user = config.radio_channel(&link.z_node_name, &link.z_node_mac, ReadMode::UserOnly);
        match (a_user, z_user) {
            (Some(_), Some(_)) => {
                tracing::warn!(link = %link.name, "Conflicting user channels on link");
                return Ok(false);
            }
            (Some(channel), None) | (None, Some(channel)) => {
                config.set_link_channel(link, Some(channel), ConfigLayer::Auto)?;
                return Ok(true);
            }
            (None, None) => {}
        }

        let enabled = config.enabled_channels();
        let Some(channel) = self.interference.get_new_link_color(
            link,
            topology,
            config,
            |link, store| store.link_channel(link, ReadMode::Merged),
            &enabled,
            rng,
        ) else {
            return Ok(false);
        };

        tracing::info!(link = %link.name, channel, "Assigned channel");
        config.set_link_channel(link, Some(channel), ConfigLayer::Auto)?;
        Ok(true)
    }

    /// Current channel of every group, as `(user, merged)` maps.
    ///
    /// Fails if any link disagrees with its group or has mismatched ends.
    /// A group whose first link has no channel is left out of the merged
    /// map.
    pub fn current_channel_config(
        topology: &dyn TopologyView,
        config: &dyn ConfigStore,
        groups: &GroupNameToLinkNames,
        use_user_config: bool,
    ) -> AssignResult<(GroupName2Color, GroupName2Color)> {
        let mut user_channels = GroupName2Color::new();
        let mut auto_channels = GroupName2Color::new();

        for (group, links) in groups {
            let mut group_user = None;
            let mut group_auto = None;
            for name in links {
                let Some(link) = topology.link(name) else {
                    continue;
                };
                if use_user_config {
                    group_user = current_channel(config, link, group_user, ReadMode::UserOnly)?;
                }
                group_auto = current_channel(config, link, group_auto, ReadMode::Merged)?;
                if group_auto.is_none() {
                    break;
                }
            }

            if let Some(channel) = group_user {
                user_channels.insert(group.clone(), channel);
            }
            if let Some(channel) = group_auto {
                auto_channels.insert(group.clone(), channel);
            }
        }
        Ok((user_channels, auto_channels))
    }

    /// Re-plan channels for the whole network.
    ///
    /// Current configuration is validated before anything is written.
    /// With `clear_user`, user overrides are ignored and then removed.
    pub fn assign_network_channels(
        &self,
        topology: &dyn TopologyView,
        config: &mut dyn ConfigStore,
        clear_user: bool,
    ) -> AssignResult<GroupName2Color> {
        let groups = LinkGroupHelper::get_link_groups(topology);
        let (user_channels, auto_channels) =
            Self::current_channel_config(topology, config, &groups, !clear_user)?;

        let enabled = config.enabled_channels();
        let assigned = self.interference.allocate_new_link_colors(
            &groups,
            topology,
            config,
            &user_channels,
            &auto_channels,
            false,
            &enabled,
        );

        for (group, links) in &groups {
            let Some(channel) = assigned.get(group).copied() else {
                continue;
            };
            tracing::info!(group = %group, channel, "Assigned channel to group");
            for name in links {
                let Some(link) = topology.link(name) else {
                    continue;
                };
                if clear_user {
                    config.set_link_channel(link, None, ConfigLayer::User)?;
                }
                config.set_link_channel(link, Some(channel), ConfigLayer::Auto)?;
            }
        }
        Ok(assigned)
    }

    /// Whether any group still runs on a channel that is no longer enabled.
    pub fn disabled_channel_in_use(topology: &dyn TopologyView, config: &dyn ConfigStore) -> bool {
        let enabled = config.enabled_channels();
        config
            .used_channels(topology)
            .iter()
            .any(|channel| !enabled.contains(channel))
    }

    /// Re-plan the network if a disabled channel is still in use.
    ///
    /// Returns whether a re-plan happened.
    pub fn validate_topology_channels(
        &self,
        topology: &dyn TopologyView,
        config: &mut dyn ConfigStore,
    ) -> AssignResult<bool> {
        if !Self::disabled_channel_in_use(topology, config) {
            return Ok(false);
        }
        tracing::info!("Disabled channel in use, reassigning network channels");
        self.assign_network_channels(topology, config, false)?;
        Ok(true)
    }
}

/// Fold one link's channel into its group's running value.
fn current_channel(
    config: &dyn ConfigStore,
    link: &Link,
    group: Option<Channel>,
    mode: ReadMode,
) -> AssignResult<Option<Channel>> {
    let a = config.radio_channel(&link.a_node_name, &link.a_node_mac, mode);
    let z = config.radio_channel(&link.z_node_name, &link.z_node_mac, mode);
    let incompatible = || AssignError::IncompatibleChannel {
        link: link.name.clone(),
    };

    if ChannelHelper::is_valid_link_channel(a, z) || a.is_some() != z.is_some() {
        match (group, config.link_channel(link, mode)) {
            (Some(g), Some(c)) if g != c => Err(incompatible()),
            (_, Some(c)) => Ok(Some(c)),
            (g, None) => Ok(g),
        }
    } else if a.is_some() || z.is_some() {
        Err(incompatible())
    } else {
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshplan_core::seeded_rng;
    use meshplan_topology::test_utils::{create_topology, link_name_for, mac_for, node_name};
    use meshplan_topology::{InMemoryConfigStore, Topology};
    use std::collections::BTreeSet;

    fn link(topology: &Topology, a: usize, z: usize) -> Link {
        topology.link(&link_name_for(a, z)).cloned().unwrap()
    }

    fn channels(values: &[Channel]) -> BTreeSet<Channel> {
        values.iter().copied().collect()
    }

    #[test]
    fn test_valid_channel_helpers() {
        assert!(!ChannelHelper::is_valid_channel(0));
        assert!(ChannelHelper::is_valid_channel(1));
        assert!(ChannelHelper::is_valid_channel(4));
        assert!(!ChannelHelper::is_valid_channel(5));

        assert!(ChannelHelper::is_valid_link_channel(Some(2), Some(2)));
        assert!(!ChannelHelper::is_valid_link_channel(Some(2), Some(3)));
        assert!(!ChannelHelper::is_valid_link_channel(Some(2), None));
    }

    #[test]
    fn test_assign_link_channel_fresh_link_uses_enabled() {
        let topology = create_topology(2, &[(0, 1)], 2, &[], &[]);
        let l = link(&topology, 0, 1);
        let mut config = InMemoryConfigStore::new(channels(&[3]));
        let mut rng = seeded_rng(b"channel");

        assert!(ChannelHelper::default()
            .assign_link_channel(&topology, &mut config, &l, &mut rng)
            .unwrap());
        assert_eq!(config.link_channel(&l, ReadMode::AutoOnly), Some(3));
    }

    #[test]
    fn test_assign_link_channel_copies_one_side() {
        let topology = create_topology(2, &[(0, 1)], 2, &[], &[]);
        let l = link(&topology, 0, 1);
        let mut config = InMemoryConfigStore::default();
        config
            .set_radio_channel(&node_name(1), &mac_for(1), Some(4), ConfigLayer::Auto)
            .unwrap();
        let mut rng = seeded_rng(b"channel");

        assert!(ChannelHelper::default()
            .assign_link_channel(&topology, &mut config, &l, &mut rng)
            .unwrap());
        assert_eq!(config.link_channel(&l, ReadMode::Merged), Some(4));
    }

    #[test]
    fn test_assign_link_channel_user_overrides() {
        let topology = create_topology(2, &[(0, 1)], 2, &[], &[]);
        let l = link(&topology, 0, 1);
        let mut rng = seeded_rng(b"channel");
        let helper = ChannelHelper::default();

        // user end wins over a stale auto end
        let mut config = InMemoryConfigStore::default();
        config
            .set_radio_channel(&node_name(0), &mac_for(0), Some(1), ConfigLayer::User)
            .unwrap();
        config
            .set_radio_channel(&node_name(1), &mac_for(1), Some(3), ConfigLayer::Auto)
            .unwrap();
        assert!(helper
            .assign_link_channel(&topology, &mut config, &l, &mut rng)
            .unwrap());
        assert_eq!(config.link_channel(&l, ReadMode::Merged), Some(1));

        // two disagreeing user ends are left alone
        let mut config = InMemoryConfigStore::default();
        config
            .set_radio_channel(&node_name(0), &mac_for(0), Some(1), ConfigLayer::User)
            .unwrap();
        config
            .set_radio_channel(&node_name(1), &mac_for(1), Some(3), ConfigLayer::User)
            .unwrap();
        let before = config.to_document();
        assert!(!helper
            .assign_link_channel(&topology, &mut config, &l, &mut rng)
            .unwrap());
        assert_eq!(config.to_document(), before);
    }

    #[test]
    fn test_current_channel_config_rejects_mismatch() {
        // 0 serves 1 and 2 from one radio
        let topology = create_topology(3, &[(0, 1), (0, 2)], 3, &[], &[]);
        let mut config = InMemoryConfigStore::new(channels(&[1, 2]));
        config
            .set_link_channel(&link(&topology, 0, 1), Some(1), ConfigLayer::Auto)
            .unwrap();
        config
            .set_radio_channel(&node_name(2), &mac_for(2), Some(2), ConfigLayer::Auto)
            .unwrap();

        let groups = LinkGroupHelper::get_link_groups(&topology);
        let err = ChannelHelper::current_channel_config(&topology, &config, &groups, true)
            .unwrap_err();
        assert!(matches!(err, AssignError::IncompatibleChannel { .. }));

        // network assignment refuses to write anything
        let before = config.to_document();
        assert!(ChannelHelper::default()
            .assign_network_channels(&topology, &mut config, false)
            .is_err());
        assert_eq!(config.to_document(), before);
    }

    #[test]
    fn test_current_channel_config_collects_groups() {
        let topology = create_topology(4, &[(0, 1), (2, 3)], 4, &[], &[]);
        let mut config = InMemoryConfigStore::new(channels(&[1, 2]));
        config
            .set_link_channel(&link(&topology, 0, 1), Some(2), ConfigLayer::User)
            .unwrap();

        let groups = LinkGroupHelper::get_link_groups(&topology);
        let (user, auto) =
            ChannelHelper::current_channel_config(&topology, &config, &groups, true).unwrap();
        assert_eq!(user.get(&link_name_for(0, 1)), Some(&2));
        assert_eq!(auto.get(&link_name_for(0, 1)), Some(&2));
        assert!(!auto.contains_key(&link_name_for(2, 3)));
    }

    #[test]
    fn test_assign_network_channels() {
        let topology = create_topology(5, &[(0, 1), (0, 2), (3, 4)], 5, &[], &[]);
        let mut config = InMemoryConfigStore::new(channels(&[1, 3]));
        config
            .set_link_channel(&link(&topology, 3, 4), Some(3), ConfigLayer::User)
            .unwrap();

        let assigned = ChannelHelper::default()
            .assign_network_channels(&topology, &mut config, false)
            .unwrap();
        assert_eq!(assigned.len(), 2);
        assert_eq!(assigned[&link_name_for(3, 4)], 3);
        for l in topology.links() {
            let channel = config.link_channel(l, ReadMode::AutoOnly).unwrap();
            assert!(config.enabled_channels().contains(&channel));
        }
        // P2MP links share the channel
        assert_eq!(
            config.link_channel(&link(&topology, 0, 1), ReadMode::AutoOnly),
            config.link_channel(&link(&topology, 0, 2), ReadMode::AutoOnly)
        );
        // user layer untouched
        assert_eq!(
            config.link_channel(&link(&topology, 3, 4), ReadMode::UserOnly),
            Some(3)
        );
    }

    #[test]
    fn test_assign_network_channels_clears_user() {
        let topology = create_topology(2, &[(0, 1)], 2, &[], &[]);
        let l = link(&topology, 0, 1);
        let mut config = InMemoryConfigStore::new(channels(&[2]));
        config.set_link_channel(&l, Some(4), ConfigLayer::User).unwrap();

        ChannelHelper::default()
            .assign_network_channels(&topology, &mut config, true)
            .unwrap();
        assert_eq!(config.link_channel(&l, ReadMode::UserOnly), None);
        assert_eq!(config.link_channel(&l, ReadMode::Merged), Some(2));
    }

    #[test]
    fn test_validate_topology_channels() {
        let topology = create_topology(2, &[(0, 1)], 2, &[], &[]);
        let l = link(&topology, 0, 1);
        let mut config = InMemoryConfigStore::new(channels(&[3]));
        config.set_link_channel(&l, Some(3), ConfigLayer::Auto).unwrap();

        let helper = ChannelHelper::default();
        assert!(!helper
            .validate_topology_channels(&topology, &mut config)
            .unwrap());

        config.set_enabled_channels(channels(&[1]));
        assert!(ChannelHelper::disabled_channel_in_use(&topology, &config));
        assert!(helper
            .validate_topology_channels(&topology, &mut config)
            .unwrap());
        assert_eq!(config.link_channel(&l, ReadMode::AutoOnly), Some(1));
    }
}
