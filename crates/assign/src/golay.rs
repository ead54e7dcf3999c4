//! Golay code assignment for wireless links.
//!
//! Golay codes are handed out like channels, except that only two codes
//! exist and groups on different channels never interfere.

use crate::error::{AssignError, AssignResult};
use crate::interference::{GroupName2Color, InterferenceHelper};
use meshplan_core::{Color, GolayIdx, GOLAY_COLORS};
use meshplan_topology::{
    ConfigLayer, ConfigStore, GroupNameToLinkNames, Link, LinkGroupHelper, ReadMode, TopologyView,
};
use rand::Rng;
use std::collections::BTreeSet;

/// Assigns Golay codes to single links and whole networks.
#[derive(Debug, Clone, Default)]
pub struct GolayHelper {
    interference: InterferenceHelper,
}

/// What one link's ends say about its Golay code.
enum LinkGolay {
    Unset,
    Valid(Color),
    Invalid,
}

impl GolayHelper {
    /// Helper using the given interference model.
    pub fn new(interference: InterferenceHelper) -> Self {
        Self { interference }
    }

    /// Codes the planner hands out.
    pub fn golay_colors() -> BTreeSet<Color> {
        GOLAY_COLORS.into_iter().collect()
    }

    /// Whether both ends use the same symmetric, configured code pair.
    pub fn is_valid_link_golay(a: Option<GolayIdx>, z: Option<GolayIdx>) -> bool {
        matches!((a, z), (Some(a), Some(z)) if a == z && a.tx == a.rx && !a.is_unset())
    }

    /// Give a link a usable Golay code, touching as little as possible.
    ///
    /// Returns `false` only when user overrides on both ends conflict.
    pub fn assign_link_golay<R: Rng + ?Sized>(
        &self,
        topology: &dyn TopologyView,
        config: &mut dyn ConfigStore,
        link: &Link,
        rng: &mut R,
    ) -> AssignResult<bool> {
        if !link.is_wireless() || !link.has_radio_macs() {
            return Ok(true);
        }

        let (a, z) = link_ends(config, link, ReadMode::Merged);
        if Self::is_valid_link_golay(a, z) {
            return Ok(true);
        }

        if a.is_some() || z.is_some() {
            match link_ends(config, link, ReadMode::UserOnly) {
                (Some(_), Some(_)) => {
                    tracing::warn!(link = %link.name, "Conflicting user golay on link");
                    return Ok(false);
                }
                (Some(golay), None) | (None, Some(golay)) => {
                    config.set_link_golay(link, Some(golay), ConfigLayer::Auto)?;
                    return Ok(true);
                }
                (None, None) => {}
            }
        }

        let Some(code) = self.interference.get_new_link_color(
            link,
            topology,
            config,
            |link, store| {
                store
                    .link_golay(link, ReadMode::Merged)
                    .filter(|g| g.tx == g.rx)
                    .map(|g| g.tx)
            },
            &Self::golay_colors(),
            rng,
        ) else {
            return Ok(false);
        };

        let golay = GolayIdx::symmetric(code);
        tracing::info!(link = %link.name, golay = %golay, "Assigned golay");
        config.set_link_golay(link, Some(golay), ConfigLayer::Auto)?;
        Ok(true)
    }

    /// Current Golay code of every group, as `(user, merged)` maps.
    ///
    /// Inconsistent user overrides are an error. Inconsistent merged values
    /// only drop the group from the merged map.
    pub fn current_golay_config(
        topology: &dyn TopologyView,
        config: &dyn ConfigStore,
        groups: &GroupNameToLinkNames,
        clear_user: bool,
    ) -> AssignResult<(GroupName2Color, GroupName2Color)> {
        let mut user_golay = GroupName2Color::new();
        let mut auto_golay = GroupName2Color::new();

        for (group, links) in groups {
            let mut group_user: Option<Color> = None;
            let mut group_auto: Option<Color> = None;
            for name in links {
                let Some(link) = topology.link(name) else {
                    continue;
                };

                if !clear_user {
                    match classify(config, link, ReadMode::UserOnly) {
                        LinkGolay::Valid(code) if group_user.is_some_and(|g| g != code) => {
                            return Err(AssignError::IncompatibleGolay {
                                link: link.name.clone(),
                            });
                        }
                        LinkGolay::Valid(code) => group_user = Some(code),
                        LinkGolay::Invalid => {
                            return Err(AssignError::IncompatibleGolay {
                                link: link.name.clone(),
                            });
                        }
                        LinkGolay::Unset => {}
                    }
                }

                match classify(config, link, ReadMode::Merged) {
                    LinkGolay::Valid(code) if group_auto.is_some_and(|g| g != code) => {
                        group_auto = None;
                        break;
                    }
                    LinkGolay::Valid(code) => group_auto = Some(code),
                    LinkGolay::Invalid => {
                        group_auto = None;
                        break;
                    }
                    LinkGolay::Unset => {}
                }
            }

            if let Some(code) = group_user {
                user_golay.insert(group.clone(), code);
            }
            if let Some(code) = group_auto {
                auto_golay.insert(group.clone(), code);
            }
        }
        Ok((user_golay, auto_golay))
    }

    /// Re-plan Golay codes for the whole network.
    ///
    /// Groups already separated by channel are not treated as interfering.
    pub fn assign_network_golay(
        &self,
        topology: &dyn TopologyView,
        config: &mut dyn ConfigStore,
        clear_user: bool,
    ) -> AssignResult<GroupName2Color> {
        let groups = LinkGroupHelper::get_link_groups(topology);
        let (user_golay, auto_golay) =
            Self::current_golay_config(topology, config, &groups, clear_user)?;

        let assigned = self.interference.allocate_new_link_colors(
            &groups,
            topology,
            config,
            &user_golay,
            &auto_golay,
            true,
            &Self::golay_colors(),
        );

        for (group, links) in &groups {
            let Some(code) = assigned.get(group).copied() else {
                continue;
            };
            tracing::info!(group = %group, golay = code, "Assigned golay to group");
            for name in links {
                let Some(link) = topology.link(name) else {
                    continue;
                };
                if clear_user {
                    config.set_link_golay(link, None, ConfigLayer::User)?;
                }
                config.set_link_golay(link, Some(GolayIdx::symmetric(code)), ConfigLayer::Auto)?;
            }
        }
        Ok(assigned)
    }
}

fn link_ends(
    config: &dyn ConfigStore,
    link: &Link,
    mode: ReadMode,
) -> (Option<GolayIdx>, Option<GolayIdx>) {
    (
        config.node_link_golay(&link.a_node_name, &link.z_node_mac, mode),
        config.node_link_golay(&link.z_node_name, &link.a_node_mac, mode),
    )
}

/// A lone configured end counts as valid if its pair is usable.
fn classify(config: &dyn ConfigStore, link: &Link, mode: ReadMode) -> LinkGolay {
    let valid = GolayHelper::is_valid_link_golay;
    match link_ends(config, link, mode) {
        (None, None) => LinkGolay::Unset,
        (Some(a), Some(z)) if valid(Some(a), Some(z)) => LinkGolay::Valid(a.tx),
        (Some(g), None) | (None, Some(g)) if valid(Some(g), Some(g)) => LinkGolay::Valid(g.tx),
        _ => LinkGolay::Invalid,
    }
}
