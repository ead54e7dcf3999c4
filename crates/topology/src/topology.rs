//! Validated in-memory topology snapshot.

use crate::error::{TopologyError, TopologyResult};
use crate::model::{standardize_mac, Link, Node, Site};
use crate::view::TopologyView;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serialized form of a topology snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyDocument {
    /// Network name
    #[serde(default)]
    pub name: String,
    /// Nodes
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Links
    #[serde(default)]
    pub links: Vec<Link>,
    /// Sites
    #[serde(default)]
    pub sites: Vec<Site>,
}

/// Immutable topology snapshot with name indexes.
///
/// Construction validates that every reference resolves and every site
/// location is in range, so algorithms can treat lookups of entities
/// reached through the snapshot as present.
#[derive(Debug, Clone)]
pub struct Topology {
    name: String,
    nodes: Vec<Node>,
    links: Vec<Link>,
    sites: Vec<Site>,
    node_index: HashMap<String, usize>,
    link_index: HashMap<String, usize>,
    site_index: HashMap<String, usize>,
}

impl Topology {
    /// Validate and index a topology.
    pub fn new(
        name: impl Into<String>,
        mut nodes: Vec<Node>,
        mut links: Vec<Link>,
        sites: Vec<Site>,
    ) -> TopologyResult<Self> {
        for node in &mut nodes {
            node.mac_addr = standardize_mac(&node.mac_addr);
            for mac in &mut node.wlan_macs {
                *mac = standardize_mac(mac);
            }
        }
        for link in &mut links {
            link.a_node_mac = standardize_mac(&link.a_node_mac);
            link.z_node_mac = standardize_mac(&link.z_node_mac);
        }

        let site_index = index_by_name("site", sites.iter().map(|s| s.name.as_str()))?;
        let node_index = index_by_name("node", nodes.iter().map(|n| n.name.as_str()))?;
        let link_index = index_by_name("link", links.iter().map(|l| l.name.as_str()))?;

        for site in &sites {
            validate_site(site)?;
        }
        for node in &nodes {
            if !site_index.contains_key(&node.site_name) {
                return Err(TopologyError::UnknownSite(node.site_name.clone()));
            }
        }
        for link in &links {
            validate_link(link, &nodes, &node_index)?;
        }

        Ok(Self {
            name: name.into(),
            nodes,
            links,
            sites,
            node_index,
            link_index,
            site_index,
        })
    }

    /// Build from a deserialized document.
    pub fn from_document(document: TopologyDocument) -> TopologyResult<Self> {
        Self::new(document.name, document.nodes, document.links, document.sites)
    }

    /// Parse a JSON topology document.
    pub fn from_json(json: &str) -> TopologyResult<Self> {
        let document: TopologyDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    /// Serialize back to a JSON document.
    pub fn to_json(&self) -> TopologyResult<String> {
        let document = TopologyDocument {
            name: self.name.clone(),
            nodes: self.nodes.clone(),
            links: self.links.clone(),
            sites: self.sites.clone(),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Network name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TopologyView for Topology {
    fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    fn links(&self) -> &[Link] {
        &self.links
    }

    fn sites(&self) -> &[Site] {
        &self.sites
    }

    fn node(&self, name: &str) -> Option<&Node> {
        self.node_index.get(name).map(|&i| &self.nodes[i])
    }

    fn link(&self, name: &str) -> Option<&Link> {
        self.link_index.get(name).map(|&i| &self.links[i])
    }

    fn site(&self, name: &str) -> Option<&Site> {
        self.site_index.get(name).map(|&i| &self.sites[i])
    }
}

fn index_by_name<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> TopologyResult<HashMap<String, usize>> {
    let mut index = HashMap::new();
    for (i, name) in names.enumerate() {
        if index.insert(name.to_string(), i).is_some() {
            return Err(TopologyError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(index)
}

fn validate_site(site: &Site) -> TopologyResult<()> {
    let location = &site.location;
    let reason = if !(-90.0..=90.0).contains(&location.latitude) {
        Some(format!("latitude {} out of range", location.latitude))
    } else if !(-180.0..=180.0).contains(&location.longitude) {
        Some(format!("longitude {} out of range", location.longitude))
    } else if !(location.accuracy >= 0.0) {
        Some(format!("accuracy {} is negative", location.accuracy))
    } else {
        None
    };
    match reason {
        Some(reason) => Err(TopologyError::InvalidLocation {
            site: site.name.clone(),
            reason,
        }),
        None => Ok(()),
    }
}

fn validate_link(
    link: &Link,
    nodes: &[Node],
    node_index: &HashMap<String, usize>,
) -> TopologyResult<()> {
    if link.a_node_name == link.z_node_name {
        return Err(TopologyError::InvalidLink {
            link: link.name.clone(),
            reason: "both ends on the same node".to_string(),
        });
    }
    for (node_name, mac) in [
        (&link.a_node_name, &link.a_node_mac),
        (&link.z_node_name, &link.z_node_mac),
    ] {
        let node = node_index
            .get(node_name)
            .map(|&i| &nodes[i])
            .ok_or_else(|| TopologyError::UnknownNode(node_name.clone()))?;
        if !mac.is_empty() && !node.wlan_macs.is_empty() && !node.wlan_macs.contains(mac) {
            return Err(TopologyError::InvalidLink {
                link: link.name.clone(),
                reason: format!("radio {} is not on node {}", mac, node_name),
            });
        }
    }
    Ok(())
}
