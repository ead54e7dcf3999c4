//! Read-only access to a topology snapshot.

use crate::model::{Link, Node, Site};
use meshplan_core::Location;

/// Read-only topology queries used by every planner algorithm.
///
/// Implementors provide the entity lists and name lookups; the derived
/// queries have default implementations that scan the lists.
pub trait TopologyView {
    /// All nodes.
    fn nodes(&self) -> &[Node];

    /// All links.
    fn links(&self) -> &[Link];

    /// All sites.
    fn sites(&self) -> &[Site];

    /// Node by name.
    fn node(&self, name: &str) -> Option<&Node>;

    /// Link by name.
    fn link(&self, name: &str) -> Option<&Link>;

    /// Site by name.
    fn site(&self, name: &str) -> Option<&Site>;

    /// Links touching a node.
    fn links_by_node(&self, node_name: &str) -> Vec<&Link> {
        self.links()
            .iter()
            .filter(|link| link.involves_node(node_name))
            .collect()
    }

    /// Links terminating on a radio.
    fn links_by_radio_mac(&self, mac: &str) -> Vec<&Link> {
        self.links()
            .iter()
            .filter(|link| link.involves_mac(mac))
            .collect()
    }

    /// Nodes mounted on a site.
    fn nodes_by_site(&self, site_name: &str) -> Vec<&Node> {
        self.nodes()
            .iter()
            .filter(|node| node.site_name == site_name)
            .collect()
    }

    /// Node owning a radio.
    fn node_by_mac(&self, mac: &str) -> Option<&Node> {
        if mac.is_empty() {
            return None;
        }
        self.nodes()
            .iter()
            .find(|node| node.mac_addr == mac || node.wlan_macs.iter().any(|m| m == mac))
    }

    /// Site a node is mounted on.
    fn site_of_node(&self, node_name: &str) -> Option<&Site> {
        self.node(node_name)
            .and_then(|node| self.site(&node.site_name))
    }

    /// Location of a node's site.
    fn location_of_node(&self, node_name: &str) -> Option<Location> {
        self.site_of_node(node_name).map(|site| site.location)
    }

    /// Other wireless links sharing either radio of `link`.
    ///
    /// Only links with both radio MACs populated are considered, on either
    /// side: a wired or half-configured `link` has no siblings.
    fn same_radio_links(&self, link: &Link) -> Vec<&Link> {
        if !link.has_radio_macs() {
            return Vec::new();
        }
        let mut result: Vec<&Link> = Vec::new();
        for mac in [&link.a_node_mac, &link.z_node_mac] {
            for other in self.links_by_radio_mac(mac) {
                if other.name == link.name || !other.has_radio_macs() {
                    continue;
                }
                if !result.iter().any(|seen| seen.name == other.name) {
                    result.push(other);
                }
            }
        }
        result
    }
}
