//! Synthetic topologies for unit and integration tests.
//!
//! Node `i` is named `node-i` and carries a single radio whose MAC repeats
//! `i` in every octet. Site `j` is `pole-j`, placed `(j + 1) * 0.001`
//! degrees north-east of the origin so neighbouring poles are ~150 m apart.

use crate::model::{link_name, Link, Node, Site};
use crate::topology::Topology;
use meshplan_core::{Location, NodeType};

/// Name of node `i`.
pub fn node_name(i: usize) -> String {
    format!("node-{}", i)
}

/// MAC of the radio on node `i`.
pub fn mac_for(i: usize) -> String {
    let octet = format!("{:02x}", i % 256);
    vec![octet; 6].join(":")
}

/// Name of site `j`.
pub fn site_name(j: usize) -> String {
    format!("pole-{}", j)
}

/// Name of the link between nodes `i` and `j`.
pub fn link_name_for(i: usize, j: usize) -> String {
    link_name(&node_name(i), &node_name(j))
}

/// `num_sites` poles on a diagonal line.
pub fn create_sites(num_sites: usize) -> Vec<Site> {
    (0..num_sites.max(1))
        .map(|j| {
            let offset = (j + 1) as f64 * 0.001;
            Site::new(
                site_name(j),
                Location {
                    latitude: offset,
                    longitude: offset,
                    altitude: offset,
                    accuracy: offset,
                },
            )
        })
        .collect()
}

/// Nodes with one radio each.
///
/// Nodes missing from `node_site_map` are placed on site `i % num_sites`.
pub fn create_nodes(
    num_nodes: usize,
    num_sites: usize,
    node_site_map: &[(usize, usize)],
    cn_nodes: &[usize],
) -> Vec<Node> {
    let num_sites = num_sites.max(1);
    (0..num_nodes)
        .map(|i| {
            let site = node_site_map
                .iter()
                .find(|(node, _)| *node == i)
                .map_or(i % num_sites, |(_, site)| *site);
            Node {
                name: node_name(i),
                node_type: if cn_nodes.contains(&i) {
                    NodeType::Cn
                } else {
                    NodeType::Dn
                },
                site_name: site_name(site),
                mac_addr: mac_for(i),
                wlan_macs: vec![mac_for(i)],
            }
        })
        .collect()
}

/// Wireless links between the given node pairs.
pub fn create_links(links: &[(usize, usize)]) -> Vec<Link> {
    links
        .iter()
        .map(|&(a, z)| {
            let (a, z) = if node_name(a) <= node_name(z) { (a, z) } else { (z, a) };
            Link::wireless(&node_name(a), &mac_for(a), &node_name(z), &mac_for(z))
        })
        .collect()
}

/// Build a complete topology; panics on inconsistent fixtures.
pub fn create_topology(
    num_nodes: usize,
    links: &[(usize, usize)],
    num_sites: usize,
    node_site_map: &[(usize, usize)],
    cn_nodes: &[usize],
) -> Topology {
    Topology::new(
        "test",
        create_nodes(num_nodes, num_sites, node_site_map, cn_nodes),
        create_links(links),
        create_sites(num_sites),
    )
    .expect("fixture topology must be valid")
}

/// Topology with default node placement and the given link list.
pub fn rebuild_with_links(num_nodes: usize, num_sites: usize, links: Vec<Link>) -> Topology {
    Topology::new(
        "test",
        create_nodes(num_nodes, num_sites, &[], &[]),
        links,
        create_sites(num_sites),
    )
    .expect("fixture topology must be valid")
}
