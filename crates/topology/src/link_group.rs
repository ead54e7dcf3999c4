//! Partitioning of wireless links into groups that share a radio.

use crate::view::TopologyView;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Group name to the names of its member links.
pub type GroupNameToLinkNames = BTreeMap<String, BTreeSet<String>>;

/// Builds link groups: maximal sets of wireless links chained through
/// shared radios (point-to-multipoint fan-out).
pub struct LinkGroupHelper;

impl LinkGroupHelper {
    /// Partition every wireless link with both radio MACs set.
    ///
    /// Each group is named after the first link found in it, in topology
    /// order. Wired links and links without radio MACs are left out.
    pub fn get_link_groups(topology: &dyn TopologyView) -> GroupNameToLinkNames {
        let mut groups = GroupNameToLinkNames::new();
        let mut visited: HashSet<&str> = HashSet::new();

        for link in topology.links() {
            if !link.has_radio_macs() || visited.contains(link.name.as_str()) {
                continue;
            }

            let mut members = BTreeSet::new();
            let mut queue = VecDeque::from([link]);
            visited.insert(&link.name);
            while let Some(current) = queue.pop_front() {
                members.insert(current.name.clone());
                for dependent in topology.same_radio_links(current) {
                    if visited.insert(&dependent.name) {
                        queue.push_back(dependent);
                    }
                }
            }

            tracing::trace!(group = %link.name, size = members.len(), "Built link group");
            groups.insert(link.name.clone(), members);
        }

        groups
    }

    /// Group containing a link, if the link belongs to any.
    pub fn group_of<'a>(groups: &'a GroupNameToLinkNames, link_name: &str) -> Option<&'a str> {
        groups
            .iter()
            .find(|(_, links)| links.contains(link_name))
            .map(|(name, _)| name.as_str())
    }
}
