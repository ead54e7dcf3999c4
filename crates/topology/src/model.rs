//! Topology entities: nodes, links and sites.

use meshplan_core::{LinkType, Location, NodeType};
use serde::{Deserialize, Serialize};

/// A radio-bearing node mounted on a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node name
    pub name: String,
    /// Distribution or client node
    pub node_type: NodeType,
    /// Site the node is mounted on
    pub site_name: String,
    /// Node MAC address
    #[serde(default)]
    pub mac_addr: String,
    /// MAC addresses of the node's wireless radios
    #[serde(default)]
    pub wlan_macs: Vec<String>,
}

impl Node {
    /// Whether the node is a client node.
    pub fn is_cn(&self) -> bool {
        self.node_type == NodeType::Cn
    }
}

/// A link between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Unique link name
    pub name: String,
    /// First endpoint
    pub a_node_name: String,
    /// Radio MAC on the first endpoint
    #[serde(default)]
    pub a_node_mac: String,
    /// Second endpoint
    pub z_node_name: String,
    /// Radio MAC on the second endpoint
    #[serde(default)]
    pub z_node_mac: String,
    /// Medium
    pub link_type: LinkType,
}

impl Link {
    /// Wireless link named after its endpoints.
    pub fn wireless(
        a_node_name: &str,
        a_node_mac: &str,
        z_node_name: &str,
        z_node_mac: &str,
    ) -> Self {
        Self {
            name: link_name(a_node_name, z_node_name),
            a_node_name: a_node_name.to_string(),
            a_node_mac: a_node_mac.to_string(),
            z_node_name: z_node_name.to_string(),
            z_node_mac: z_node_mac.to_string(),
            link_type: LinkType::Wireless,
        }
    }

    /// Whether the link is a radio link.
    pub fn is_wireless(&self) -> bool {
        self.link_type == LinkType::Wireless
    }

    /// Wireless with both radio MACs known.
    pub fn has_radio_macs(&self) -> bool {
        self.is_wireless() && !self.a_node_mac.is_empty() && !self.z_node_mac.is_empty()
    }

    /// Whether either end uses the given radio.
    pub fn involves_mac(&self, mac: &str) -> bool {
        !mac.is_empty() && (self.a_node_mac == mac || self.z_node_mac == mac)
    }

    /// Whether either end is the given node.
    pub fn involves_node(&self, node_name: &str) -> bool {
        self.a_node_name == node_name || self.z_node_name == node_name
    }

    /// MAC at the far end from `mac`.
    pub fn peer_mac(&self, mac: &str) -> Option<&str> {
        if self.a_node_mac == mac {
            Some(&self.z_node_mac)
        } else if self.z_node_mac == mac {
            Some(&self.a_node_mac)
        } else {
            None
        }
    }

    /// Node name at the far end from `node_name`.
    pub fn peer_node(&self, node_name: &str) -> Option<&str> {
        if self.a_node_name == node_name {
            Some(&self.z_node_name)
        } else if self.z_node_name == node_name {
            Some(&self.a_node_name)
        } else {
            None
        }
    }

    /// Whether the two links share an endpoint node.
    pub fn shares_node_with(&self, other: &Link) -> bool {
        other.involves_node(&self.a_node_name) || other.involves_node(&self.z_node_name)
    }
}

/// A physical pole hosting one or more nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Unique site name
    pub name: String,
    /// Geographic location
    pub location: Location,
}

impl Site {
    /// Site at the given coordinates.
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Self {
            name: name.into(),
            location,
        }
    }
}

/// Canonical link name: endpoints ordered by name.
pub fn link_name(a_node_name: &str, z_node_name: &str) -> String {
    if a_node_name <= z_node_name {
        format!("link-{}-{}", a_node_name, z_node_name)
    } else {
        format!("link-{}-{}", z_node_name, a_node_name)
    }
}

/// Lower-case, colon-separated, two digits per octet.
///
/// Input that does not look like a six-octet MAC is only lower-cased.
pub fn standardize_mac(mac: &str) -> String {
    let trimmed = mac.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let octets: Vec<&str> = trimmed.split([':', '-']).collect();
    let well_formed = octets.len() == 6
        && octets
            .iter()
            .all(|o| (1..=2).contains(&o.len()) && o.chars().all(|c| c.is_ascii_hexdigit()));
    if !well_formed {
        return trimmed.to_ascii_lowercase();
    }
    octets
        .iter()
        .map(|o| format!("{:0>2}", o.to_ascii_lowercase()))
        .collect::<Vec<_>>()
        .join(":")
}
