//! Interference-aware colouring of link groups.
//!
//! Channels and Golay codes are both "colours" handed out per link group.
//! Groups that would interfere are kept apart where possible: an
//! interference matrix between groups is estimated from site geometry and
//! radio polarity, an odd cycle cover picks the groups that cannot be
//! coloured conflict-free, and the rest are coloured by a neighbour-first
//! walk. Newly ignited links get a colour from angle-based heuristics.

use crate::occ::{OccSolver, VertexWeights};
use crate::polarity::PolarityHelper;
use meshplan_core::{Color, InterferenceConfig};
use meshplan_topology::{
    approx_distance, compute_angle, ConfigStore, Graph, GroupNameToLinkNames, Link, ReadMode,
    Site, TopologyView,
};
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Group name to its colour.
pub type GroupName2Color = BTreeMap<String, Color>;

/// Symmetric group-to-group interference power (linear, 60 dB biased).
/// Only strictly positive entries are stored.
pub type InterferenceMatrix = BTreeMap<String, BTreeMap<String, f64>>;

/// Link to the links sharing a site with it and their angular separation.
pub type LinkAngleGraph = BTreeMap<String, Vec<(String, f64)>>;

/// Power ratio under which two interference levels count as equal (1 dB).
const ALMOST_EQUAL_RATIO: f64 = 1.2589;

/// Bias keeping power ratios finite.
const POWER_EPSILON: f64 = 0.0001;

/// Estimates group interference and picks colours.
#[derive(Debug, Clone, Default)]
pub struct InterferenceHelper {
    config: InterferenceConfig,
}

impl InterferenceHelper {
    /// Helper with the given thresholds.
    pub fn new(config: InterferenceConfig) -> Self {
        Self { config }
    }

    /// Thresholds in use.
    pub fn config(&self) -> &InterferenceConfig {
        &self.config
    }

    /// Angle between two undirected link bearings, folded into [0, 90].
    ///
    /// `flip` marks links that meet head to tail; the base bearing is turned
    /// around before folding.
    pub fn compute_undirected_link_angle_diff(angle: f64, angle_base: f64, flip: bool) -> f64 {
        let base = if flip { angle_base + 180.0 } else { angle_base };
        let mut diff = (angle - base).rem_euclid(360.0);
        if diff > 180.0 {
            diff = 360.0 - diff;
        }
        if diff > 90.0 {
            diff = 180.0 - diff;
        }
        diff
    }

    /// Angle between two directed bearings, in [0, 180].
    pub fn compute_directed_link_angle_diff(angle1: f64, angle2: f64) -> f64 {
        let mut diff = (angle1 - angle2).abs();
        if diff > 360.0 {
            diff -= 360.0;
        }
        180.0 - (diff - 180.0).abs()
    }

    /// Antenna array loss in dB at the given scan angle.
    pub fn array_loss_db(angle: f64) -> f64 {
        if angle > 90.0 {
            -45.0
        } else if angle > 16.0 {
            -20.0
        } else if angle > 10.0 {
            -17.0
        } else if angle > 5.0 {
            -13.0
        } else {
            0.0
        }
    }

    /// Received interference power between one transmitter and one
    /// receiver, in linear units with a 60 dB bias. Zero when the sites are
    /// out of range or the power is below the floor.
    pub fn estimate_interference(&self, distance: f64, angle_tx: f64, angle_rx: f64) -> f64 {
        if distance <= 0.0 || distance > self.config.max_distance_m {
            return 0.0;
        }

        let irsp = -8.0 - 20.0 * distance.log10() - 36e-3 * distance
            + Self::array_loss_db(angle_tx)
            + Self::array_loss_db(angle_rx);
        if irsp < self.config.min_power_dbm {
            return 0.0;
        }

        10f64.powf((irsp + 60.0) / 10.0)
    }

    /// Adjacency between wireless links that share at least one site.
    pub fn create_graph_with_link_angles(topology: &dyn TopologyView) -> LinkAngleGraph {
        let wireless: Vec<(&Link, &Site, &Site)> = topology
            .links()
            .iter()
            .filter(|link| link.is_wireless())
            .filter_map(|link| {
                link_sites(topology, link).map(|(a_site, z_site)| (link, a_site, z_site))
            })
            .collect();

        let mut graph = LinkAngleGraph::new();
        for (a_link, a_a, a_z) in &wireless {
            let a_angle = compute_angle(&a_a.location, &a_z.location);
            for (b_link, b_a, b_z) in &wireless {
                if a_link.name == b_link.name {
                    continue;
                }
                if a_a.name != b_a.name
                    && a_a.name != b_z.name
                    && a_z.name != b_a.name
                    && a_z.name != b_z.name
                {
                    continue;
                }

                let b_angle = compute_angle(&b_a.location, &b_z.location);
                let flip = !(a_a.name == b_a.name || a_z.name == b_z.name);
                let diff = Self::compute_undirected_link_angle_diff(a_angle, b_angle, flip);
                graph
                    .entry(a_link.name.clone())
                    .or_default()
                    .push((b_link.name.clone(), diff));
            }
        }
        graph
    }

    /// Total interference between the links of two groups.
    ///
    /// Every transmitter/receiver combination across the two links is
    /// considered; pairs that transmit in the same slots (equal parity)
    /// cannot hear each other. With `account_for_channel`, links already on
    /// different channels are skipped.
    pub fn estimate_group_to_group_interference(
        &self,
        topology: &dyn TopologyView,
        config: &dyn ConfigStore,
        group1: &BTreeSet<String>,
        group2: &BTreeSet<String>,
        account_for_channel: bool,
    ) -> f64 {
        let mut total = 0.0;
        for name1 in group1 {
            for name2 in group2 {
                let (Some(link1), Some(link2)) = (topology.link(name1), topology.link(name2)) else {
                    continue;
                };

                if account_for_channel {
                    let channel1 = config.link_channel(link1, ReadMode::Merged);
                    let channel2 = config.link_channel(link2, ReadMode::Merged);
                    if let (Some(c1), Some(c2)) = (channel1, channel2) {
                        if c1 != c2 {
                            continue;
                        }
                    }
                }

                let (Some((site11, site12)), Some((site21, site22))) =
                    (link_sites(topology, link1), link_sites(topology, link2))
                else {
                    continue;
                };

                let polarity = |node: &str, mac: &str| config.radio_polarity(node, mac, ReadMode::Merged);
                let p11 = polarity(&link1.a_node_name, &link1.a_node_mac);
                let p12 = polarity(&link1.z_node_name, &link1.z_node_mac);
                let p21 = polarity(&link2.a_node_name, &link2.a_node_mac);
                let p22 = polarity(&link2.z_node_name, &link2.z_node_mac);

                let base1 = compute_angle(&site12.location, &site11.location);
                let base2 = compute_angle(&site22.location, &site21.location);

                // (tx site, rx site, tx polarity, rx polarity, tx bearing, rx bearing)
                let cases = [
                    (site11, site21, p11, p21, base1, base2),
                    (site11, site22, p11, p22, base1, base2 + 180.0),
                    (site12, site21, p12, p21, base1 + 180.0, base2),
                    (site12, site22, p12, p22, base1 + 180.0, base2 + 180.0),
                ];
                for (tx, rx, p_tx, p_rx, tx_base, rx_base) in cases {
                    if tx.name == rx.name || !PolarityHelper::is_valid_link_polarity(p_tx, p_rx) {
                        continue;
                    }
                    let cross = compute_angle(&rx.location, &tx.location);
                    let distance = approx_distance(&tx.location, &rx.location);
                    let angle_tx = Self::compute_directed_link_angle_diff(tx_base, cross);
                    let angle_rx = Self::compute_directed_link_angle_diff(rx_base, cross + 180.0);
                    total += self.estimate_interference(distance, angle_tx, angle_rx);
                }
            }
        }
        total
    }

    /// Interference between every pair of groups.
    pub fn interference_matrix(
        &self,
        topology: &dyn TopologyView,
        config: &dyn ConfigStore,
        groups: &GroupNameToLinkNames,
        account_for_channel: bool,
    ) -> InterferenceMatrix {
        let mut matrix = InterferenceMatrix::new();
        let entries: Vec<_> = groups.iter().collect();
        for (i, (name_a, links_a)) in entries.iter().enumerate() {
            for (name_b, links_b) in entries.iter().skip(i + 1) {
                let interference = self.estimate_group_to_group_interference(
                    topology,
                    config,
                    links_a,
                    links_b,
                    account_for_channel,
                );
                if interference > 0.0 {
                    tracing::debug!(
                        group_a = %name_a,
                        group_b = %name_b,
                        interference,
                        "Group interference"
                    );
                    matrix
                        .entry((*name_a).clone())
                        .or_default()
                        .insert((*name_b).clone(), interference);
                    matrix
                        .entry((*name_b).clone())
                        .or_default()
                        .insert((*name_a).clone(), interference);
                }
            }
        }
        matrix
    }

    /// Whether two powers lie within 1 dB of each other.
    pub fn almost_equal_power(value1: f64, value2: f64) -> bool {
        value1.max(value2) / (value1.min(value2) + POWER_EPSILON) < ALMOST_EQUAL_RATIO
    }

    /// Group graph with an edge per interfering pair, weighted by each
    /// group's total interference.
    pub fn build_graph(
        groups: &GroupNameToLinkNames,
        matrix: &InterferenceMatrix,
    ) -> (Graph, VertexWeights) {
        let mut graph = Graph::undirected();
        for name in groups.keys() {
            graph.add_vertex(name.as_str());
        }

        let mut weights = VertexWeights::new();
        for (group, row) in matrix {
            let mut weight = 0.0;
            for (other, interference) in row {
                if *interference > 0.0 {
                    graph.add_edge(group, other);
                    weight += interference;
                }
            }
            weights.insert(group.clone(), weight);
        }
        (graph, weights)
    }

    /// Colour for a group minimising interference with already coloured
    /// neighbours. The previous auto colour wins near-ties.
    pub fn preferred_color(
        group: &str,
        assigned: &GroupName2Color,
        matrix: &InterferenceMatrix,
        auto_colors: &GroupName2Color,
        colors: &BTreeSet<Color>,
    ) -> Option<Color> {
        let first = *colors.iter().next()?;
        if colors.len() == 1 {
            return Some(first);
        }

        let previous = auto_colors.get(group).copied();
        let Some(row) = matrix.get(group) else {
            return Some(previous.filter(|c| colors.contains(c)).unwrap_or(first));
        };

        let mut cost: BTreeMap<Color, f64> = colors.iter().map(|&c| (c, 0.0)).collect();
        for (neighbor, interference) in row {
            if let Some(color) = assigned.get(neighbor) {
                *cost.entry(*color).or_insert(0.0) += interference;
            }
        }

        let (mut best, mut best_cost) = (first, cost.get(&first).copied().unwrap_or(0.0));
        for (&color, &c) in &cost {
            if c < best_cost {
                best = color;
                best_cost = c;
            }
        }

        if let Some(prev) = previous {
            if let Some(&prev_cost) = cost.get(&prev) {
                if Self::almost_equal_power(prev_cost, best_cost) {
                    return Some(prev);
                }
            }
        }
        Some(best)
    }

    /// Colour every group.
    ///
    /// User colours are fixed. Groups outside the odd cycle cover are
    /// coloured first, walking interference neighbours before anything
    /// else so that part of the assignment is conflict free. Cover groups
    /// follow, heaviest interferers first.
    #[allow(clippy::too_many_arguments)]
    pub fn allocate_new_link_colors(
        &self,
        groups: &GroupNameToLinkNames,
        topology: &dyn TopologyView,
        config: &dyn ConfigStore,
        user_colors: &GroupName2Color,
        auto_colors: &GroupName2Color,
        account_for_channel: bool,
        colors: &BTreeSet<Color>,
    ) -> GroupName2Color {
        let matrix = self.interference_matrix(topology, config, groups, account_for_channel);
        let (graph, weights) = Self::build_graph(groups, &matrix);
        let cover = OccSolver::new(graph, weights.clone()).get_occ_solution();

        let mut assigned = GroupName2Color::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        for (group, color) in user_colors {
            assigned.insert(group.clone(), *color);
            queue.push_front(group.clone());
        }
        queue.extend(groups.keys().cloned());

        let mut visited: HashSet<String> = HashSet::new();
        while let Some(group) = queue.pop_front() {
            if visited.contains(&group) || (cover.contains(&group) && !assigned.contains_key(&group))
            {
                continue;
            }
            visited.insert(group.clone());

            if !assigned.contains_key(&group) {
                if let Some(color) =
                    Self::preferred_color(&group, &assigned, &matrix, auto_colors, colors)
                {
                    assigned.insert(group.clone(), color);
                }
            }

            if let Some(row) = matrix.get(&group) {
                for neighbor in row.keys() {
                    if !assigned.contains_key(neighbor) {
                        queue.push_front(neighbor.clone());
                    }
                }
            }
        }

        let mut remaining: Vec<(&String, f64)> = cover
            .iter()
            .map(|group| (group, weights.get(group).copied().unwrap_or(0.0)))
            .collect();
        remaining.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (group, weight) in remaining {
            if assigned.contains_key(group) {
                continue;
            }
            if let Some(color) =
                Self::preferred_color(group, &assigned, &matrix, auto_colors, colors)
            {
                tracing::debug!(group = %group, weight, color, "Coloured cover group");
                assigned.insert(group.clone(), color);
            }
        }

        assigned
    }

    /// Colour for a single new link, chosen from angle heuristics around
    /// its already coloured neighbours.
    ///
    /// Links sharing a node with a coloured neighbour take that colour.
    /// Wide neighbours bias towards their colour, narrow neighbours exclude
    /// it, and a neighbour's neighbour of the same colour is excluded to
    /// avoid three consecutive links on one colour. The final pick is
    /// random among the weighted choices. `None` only when `colors` is
    /// empty.
    pub fn get_new_link_color<R, F>(
        &self,
        link: &Link,
        topology: &dyn TopologyView,
        config: &dyn ConfigStore,
        get_color: F,
        colors: &BTreeSet<Color>,
        rng: &mut R,
    ) -> Option<Color>
    where
        R: Rng + ?Sized,
        F: Fn(&Link, &dyn ConfigStore) -> Option<Color>,
    {
        let weight = self.config.color_weight;
        let mut choices: Vec<Color> = colors.iter().copied().collect();

        let graph = Self::create_graph_with_link_angles(topology);
        let empty = Vec::new();
        let adjacent = graph.get(&link.name).unwrap_or(&empty);

        for (adj_name, angle) in adjacent {
            let Some(adj_link) = topology.link(adj_name) else {
                continue;
            };
            let Some(adj_color) = get_color(adj_link, config).filter(|c| colors.contains(c)) else {
                continue;
            };

            if *angle > self.config.large_angle_deg {
                choices.extend(std::iter::repeat(adj_color).take(weight));
            }

            if adj_link.shares_node_with(link) {
                choices = vec![adj_color];
                break;
            }

            if *angle < self.config.narrow_angle_deg {
                choices.retain(|c| *c != adj_color);
            }

            for (next_name, _) in graph.get(adj_name).unwrap_or(&empty) {
                if *next_name == link.name || adjacent.iter().any(|(n, _)| n == next_name) {
                    continue;
                }
                let Some(next_link) = topology.link(next_name) else {
                    continue;
                };
                let Some(next_color) = get_color(next_link, config).filter(|c| colors.contains(c))
                else {
                    continue;
                };

                if next_color == adj_color {
                    choices.retain(|c| *c != next_color);
                } else {
                    choices.extend(std::iter::repeat(next_color).take(weight));
                }
            }
        }

        if choices.is_empty() {
            choices.extend(colors.iter().copied());
        }
        if choices.is_empty() {
            return None;
        }

        let pick = choices[rng.gen_range(0..choices.len())];
        tracing::trace!(link = %link.name, choices = choices.len(), color = pick, "Picked new link colour");
        Some(pick)
    }
}

/// Sites of both ends of a link.
fn link_sites<'a>(topology: &'a dyn TopologyView, link: &Link) -> Option<(&'a Site, &'a Site)> {
    let a = topology.site_of_node(&link.a_node_name)?;
    let z = topology.site_of_node(&link.z_node_name)?;
    Some((a, z))
}
