//! TDMA polarity assignment.
//!
//! Both ends of a wireless link must transmit in opposite slots, so radio
//! polarities 2-colour the link graph. Odd cycles are broken by making
//! whole sites hybrid; the sites are picked by an odd cycle cover over the
//! site graph, weighted so that point-to-multipoint sites avoid becoming
//! hybrid and operator-chosen hybrids are preferred.

use crate::error::{AssignError, AssignResult};
use crate::occ::{
    OccSolver, VertexWeights, BIAS_DOWN_VERTEX_WEIGHT, HIGH_VERTEX_WEIGHT, LOW_VERTEX_WEIGHT,
};
use meshplan_core::{NodeType, Polarity};
use meshplan_topology::{ConfigLayer, ConfigStore, Link, MacToPolarity, ReadMode, TopologyView};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Outcome of a network-wide polarity optimisation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolarityPlan {
    /// New polarity for every radio reached
    pub polarities: MacToPolarity,
    /// One message per unsolvable conflict
    pub errors: Vec<String>,
}

impl PolarityPlan {
    /// Whether propagation finished without conflicts.
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Polarity validation, optimisation and single-link repair.
pub struct PolarityHelper;

impl PolarityHelper {
    /// Whether two radio polarities can form a link: opposite parity, not
    /// both hybrid.
    pub fn is_valid_link_polarity(a: Option<Polarity>, z: Option<Polarity>) -> bool {
        match (a, z) {
            (Some(a), Some(z)) => !a.same_parity(z) && !(a.is_hybrid() && z.is_hybrid()),
            _ => false,
        }
    }

    /// Whether the radio `node_name` uses on `link` also serves another
    /// wireless link.
    pub fn has_other_wireless_links(
        topology: &dyn TopologyView,
        link: &Link,
        node_name: &str,
    ) -> bool {
        let mac = if node_name == link.a_node_name {
            &link.a_node_mac
        } else {
            &link.z_node_mac
        };
        if mac.is_empty() {
            return false;
        }

        topology.links_by_node(node_name).into_iter().any(|other| {
            other.name != link.name
                && other.is_wireless()
                && other.has_radio_macs()
                && other.involves_mac(mac)
        })
    }

    /// Plain polarity of the first radio on a site that has one.
    pub fn site_polarity(
        topology: &dyn TopologyView,
        config: &dyn ConfigStore,
        site_name: &str,
    ) -> Option<Polarity> {
        let nodes: Vec<_> = topology
            .nodes_by_site(site_name)
            .into_iter()
            .cloned()
            .collect();
        config
            .polarities(&nodes, ReadMode::Merged)
            .values()
            .next()
            .map(|p| if p.is_odd() { Polarity::Odd } else { Polarity::Even })
    }

    /// DN radios terminating two or more DN-DN wireless links.
    pub fn y_street_macs(topology: &dyn TopologyView) -> BTreeSet<String> {
        let is_dn = |name: &str| {
            topology
                .node(name)
                .is_some_and(|node| node.node_type == NodeType::Dn)
        };

        let mut seen = BTreeSet::new();
        let mut y_street = BTreeSet::new();
        for link in topology.links() {
            if !link.is_wireless()
                || !link.has_radio_macs()
                || !is_dn(&link.a_node_name)
                || !is_dn(&link.z_node_name)
            {
                continue;
            }
            for mac in [&link.a_node_mac, &link.z_node_mac] {
                if !seen.insert(mac.clone()) {
                    y_street.insert(mac.clone());
                }
            }
        }
        y_street
    }

    /// Compute polarities for every radio in the network.
    ///
    /// `user` overrides are honoured where the topology allows it; `old`
    /// values keep existing hybrid sites stable. Conflicts do not stop the
    /// run; they are collected in the returned plan.
    pub fn optimize_polarity(
        topology: &dyn TopologyView,
        user: &MacToPolarity,
        old: &MacToPolarity,
    ) -> PolarityPlan {
        let mut allocator = Allocator::new(topology, user, old);

        let mut user_hybrid_sites = BTreeSet::new();
        let mut old_hybrid_sites = BTreeSet::new();
        for site in topology.sites() {
            let Some(macs) = allocator.site_macs.get(&site.name) else {
                continue;
            };
            if mixes_parity(macs.iter().filter_map(|mac| user.get(mac))) {
                user_hybrid_sites.insert(site.name.clone());
            }
            if mixes_parity(macs.iter().filter_map(|mac| old.get(mac))) {
                old_hybrid_sites.insert(site.name.clone());
            }
        }

        let mut weights = VertexWeights::new();
        for mac in Self::y_street_macs(topology) {
            if let Some(site) = allocator.mac_site.get(&mac) {
                tracing::trace!(site = %site, weight = HIGH_VERTEX_WEIGHT, "Y-street site weight");
                weights.insert(site.clone(), HIGH_VERTEX_WEIGHT);
            }
        }
        for site in &user_hybrid_sites {
            tracing::trace!(site = %site, weight = LOW_VERTEX_WEIGHT, "User hybrid site weight");
            weights.insert(site.clone(), LOW_VERTEX_WEIGHT);
        }
        for site in &old_hybrid_sites {
            weights
                .entry(site.clone())
                .or_insert(BIAS_DOWN_VERTEX_WEIGHT);
        }

        let hybrid_sites = OccSolver::from_topology(topology, weights).get_occ_solution();
        for site in &hybrid_sites {
            if let Some(macs) = allocator.site_macs.get(site) {
                allocator.hybrid_macs.extend(macs.iter().cloned());
            }
        }
        tracing::debug!(hybrid_sites = ?hybrid_sites, "Selected hybrid sites");

        allocator.allocate();
        let plan = PolarityPlan {
            polarities: allocator.assigned,
            errors: allocator.errors,
        };
        tracing::info!(
            radios = plan.polarities.len(),
            conflicts = plan.errors.len(),
            "Polarity optimization finished"
        );
        plan
    }

    /// Make one link's polarities valid with as few changes as possible.
    ///
    /// Returns whether the link ends up valid.
    pub fn assign_link_polarity(
        topology: &dyn TopologyView,
        config: &mut dyn ConfigStore,
        link: &Link,
    ) -> AssignResult<bool> {
        if !link.is_wireless() || !link.has_radio_macs() {
            return Ok(true);
        }

        let a = config.radio_polarity(&link.a_node_name, &link.a_node_mac, ReadMode::Merged);
        let z = config.radio_polarity(&link.z_node_name, &link.z_node_mac, ReadMode::Merged);
        if Self::is_valid_link_polarity(a, z) {
            return Ok(true);
        }

        let (mut a_new, mut z_new) = (None, None);
        match (a, z) {
            (None, None) => {
                let a_site = topology.node(&link.a_node_name).map(|n| n.site_name.as_str());
                let z_site = topology.node(&link.z_node_name).map(|n| n.site_name.as_str());
                if let Some(p) = a_site.and_then(|s| Self::site_polarity(topology, config, s)) {
                    a_new = Some(p);
                    z_new = Some(p.complement());
                } else if let Some(p) = z_site.and_then(|s| Self::site_polarity(topology, config, s))
                {
                    z_new = Some(p);
                    a_new = Some(p.complement());
                } else {
                    a_new = Some(Polarity::Odd);
                    z_new = Some(Polarity::Even);
                }
            }
            (Some(a), None) => z_new = Some(a.complement()),
            (None, Some(z)) => a_new = Some(z.complement()),
            (Some(a), Some(z)) => {
                let a_user =
                    config.radio_polarity(&link.a_node_name, &link.a_node_mac, ReadMode::UserOnly);
                let z_user =
                    config.radio_polarity(&link.z_node_name, &link.z_node_mac, ReadMode::UserOnly);
                if a_user.is_none()
                    && !Self::has_other_wireless_links(topology, link, &link.a_node_name)
                {
                    a_new = Some(z.complement());
                } else if z_user.is_none()
                    && !Self::has_other_wireless_links(topology, link, &link.z_node_name)
                {
                    z_new = Some(a.complement());
                } else {
                    tracing::warn!(link = %link.name, "Unable to repair link polarity");
                }
            }
        }

        if let Some(p) = a_new {
            tracing::info!(mac = %link.a_node_mac, polarity = %p, "Assigned polarity");
            config.set_radio_polarity(&link.a_node_name, &link.a_node_mac, Some(p), ConfigLayer::Auto)?;
        }
        if let Some(p) = z_new {
            tracing::info!(mac = %link.z_node_mac, polarity = %p, "Assigned polarity");
            config.set_radio_polarity(&link.z_node_name, &link.z_node_mac, Some(p), ConfigLayer::Auto)?;
        }

        Ok(Self::is_valid_link_polarity(a_new.or(a), z_new.or(z)))
    }

    /// Optimise the whole network and write the result to the auto layer.
    ///
    /// Nothing is written unless the optimisation succeeds and, when user
    /// overrides are kept, every one of them survives unchanged.
    pub fn apply_polarity_optimization(
        topology: &dyn TopologyView,
        config: &mut dyn ConfigStore,
        clear_user: bool,
    ) -> AssignResult<MacToPolarity> {
        let nodes = topology.nodes();
        let user = config.polarities(nodes, ReadMode::UserOnly);
        let old = config.polarities(nodes, ReadMode::Merged);

        let empty = MacToPolarity::new();
        let plan = Self::optimize_polarity(topology, if clear_user { &empty } else { &user }, &old);
        if !plan.succeeded() {
            return Err(AssignError::UnsolvableOddCycle {
                messages: plan.errors,
            });
        }

        if clear_user {
            config.clear_user_polarities(nodes)?;
        } else {
            let conflicts: Vec<String> = plan
                .polarities
                .iter()
                .filter(|(mac, polarity)| user.get(*mac).is_some_and(|u| u != *polarity))
                .map(|(mac, _)| mac.clone())
                .collect();
            if !conflicts.is_empty() {
                return Err(AssignError::UserPolarityConflict { macs: conflicts });
            }
        }

        for (mac, polarity) in &plan.polarities {
            let Some(node) = topology.node_by_mac(mac) else {
                continue;
            };
            config.set_radio_polarity(&node.name, mac, Some(*polarity), ConfigLayer::Auto)?;
        }
        Ok(plan.polarities)
    }
}

/// Whether a set of polarities contains both parities.
fn mixes_parity<'a>(polarities: impl Iterator<Item = &'a Polarity>) -> bool {
    let (mut odd, mut even) = (false, false);
    for p in polarities {
        odd |= p.is_odd();
        even |= p.is_even();
    }
    odd && even
}

/// Propagation state for one optimisation run.
struct Allocator<'a> {
    topology: &'a dyn TopologyView,
    user: &'a MacToPolarity,
    old: &'a MacToPolarity,
    assigned: MacToPolarity,
    hybrid_macs: BTreeSet<String>,
    mac_node: BTreeMap<String, String>,
    mac_site: BTreeMap<String, String>,
    site_macs: BTreeMap<String, BTreeSet<String>>,
    errors: Vec<String>,
}

impl<'a> Allocator<'a> {
    fn new(topology: &'a dyn TopologyView, user: &'a MacToPolarity, old: &'a MacToPolarity) -> Self {
        let mut mac_node = BTreeMap::new();
        let mut mac_site = BTreeMap::new();
        let mut site_macs: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for node in topology.nodes() {
            for mac in &node.wlan_macs {
                mac_node.insert(mac.clone(), node.name.clone());
                mac_site.insert(mac.clone(), node.site_name.clone());
                site_macs
                    .entry(node.site_name.clone())
                    .or_default()
                    .insert(mac.clone());
            }
        }

        Self {
            topology,
            user,
            old,
            assigned: MacToPolarity::new(),
            hybrid_macs: BTreeSet::new(),
            mac_node,
            mac_site,
            site_macs,
            errors: Vec::new(),
        }
    }

    /// User radios first, then sites grown from what is already placed,
    /// then untouched radios, and hybrid radios last.
    fn allocate(&mut self) {
        let user_macs: Vec<String> = self.user.keys().cloned().collect();
        for mac in user_macs {
            self.assign_and_follow(&mac, false);
        }

        let populated: Vec<String> = self.assigned.keys().cloned().collect();
        for mac in populated {
            if !self.hybrid_macs.contains(&mac) {
                self.assign_and_follow(&mac, true);
            }
        }

        let all_macs: Vec<String> = self.mac_node.keys().cloned().collect();
        for mac in all_macs {
            if !self.assigned.contains_key(&mac) && !self.hybrid_macs.contains(&mac) {
                self.assign_and_follow(&mac, true);
            }
        }

        let hybrid: Vec<String> = self.hybrid_macs.iter().cloned().collect();
        for mac in hybrid {
            if !self.assigned.contains_key(&mac) {
                self.assign_and_follow(&mac, false);
            }
        }
    }

    fn preferred(&self, mac: &str) -> Polarity {
        if let Some(p) = self.user.get(mac) {
            return *p;
        }

        let old = self.old.get(mac).copied();
        if self.hybrid_macs.contains(mac) {
            if let Some(p) = old {
                return p;
            }
        }

        let (mut odd, mut even) = (0usize, 0usize);
        let site_macs = self
            .mac_site
            .get(mac)
            .and_then(|site| self.site_macs.get(site));
        for other in site_macs.into_iter().flatten() {
            if let Some(p) = self.assigned.get(other) {
                odd += usize::from(p.is_odd());
                even += usize::from(p.is_even());
            }
        }

        match old {
            Some(p) if odd == even => p,
            _ if odd >= even => Polarity::Odd,
            _ => Polarity::Even,
        }
    }

    /// Place `start` and everything reachable from it over wireless links,
    /// optionally pulling in the rest of each non-hybrid site.
    fn assign_and_follow(&mut self, start: &str, follow_same_site: bool) {
        let mut queue = VecDeque::from([start.to_string()]);
        while let Some(mac) = queue.pop_front() {
            let Some(node_name) = self.mac_node.get(&mac).cloned() else {
                continue;
            };

            if !self.assigned.contains_key(&mac) {
                let polarity = self.preferred(&mac);
                tracing::trace!(node = %node_name, mac = %mac, polarity = %polarity, "Polarity assigned");
                self.assigned.insert(mac.clone(), polarity);
            }

            if follow_same_site && !self.hybrid_macs.contains(&mac) {
                let siblings = self
                    .mac_site
                    .get(&mac)
                    .and_then(|site| self.site_macs.get(site));
                for sibling in siblings.into_iter().flatten() {
                    if !self.assigned.contains_key(sibling) {
                        queue.push_back(sibling.clone());
                    }
                }
            }

            let Some(polarity) = self.assigned.get(&mac).copied() else {
                continue;
            };
            let desired = polarity.complement();
            for link in self.topology.links_by_node(&node_name) {
                if !link.is_wireless() || !link.has_radio_macs() || !link.involves_mac(&mac) {
                    continue;
                }
                let Some(peer) = link.peer_mac(&mac) else {
                    continue;
                };

                match self.assigned.get(peer) {
                    Some(existing) if !existing.same_parity(desired) => {
                        tracing::error!(
                            mac = %peer,
                            existing = %existing,
                            desired = %desired,
                            "Polarity mismatch"
                        );
                        self.errors
                            .push(format!("Unsolvable odd cycle exists at {}", peer));
                    }
                    Some(_) => {}
                    None => {
                        tracing::trace!(mac = %peer, polarity = %desired, "Polarity assigned across link");
                        self.assigned.insert(peer.to_string(), desired);
                        queue.push_front(peer.to_string());
                    }
                }
            }
        }
    }
}
