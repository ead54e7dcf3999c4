//! Minimum-weight odd cycle cover.
//!
//! Finds a set of vertices of least total weight whose removal leaves the
//! graph bipartite. The graph is first turned into a tree decomposition by
//! greedy min-fill elimination; a dynamic program over the tree then
//! decides, bag by bag, which vertices go left, right, or into the cover.
//! The program runs on an explicit worklist so its depth does not depend on
//! the size of the topology.

use meshplan_topology::{Graph, TopologyView};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Weight for vertices that should almost never be picked.
pub const HIGH_VERTEX_WEIGHT: f64 = 10000.0;
/// Weight for vertices that should be picked first.
pub const LOW_VERTEX_WEIGHT: f64 = 1.0;
/// Weight of vertices with no explicit weight.
pub const DEFAULT_VERTEX_WEIGHT: f64 = 100.0;
/// Slightly discourages picking a vertex.
pub const BIAS_UP_VERTEX_WEIGHT: f64 = 100.1;
/// Slightly encourages picking a vertex.
pub const BIAS_DOWN_VERTEX_WEIGHT: f64 = 99.9;

/// Vertex name to weight.
pub type VertexWeights = HashMap<String, f64>;

/// Properties of one tree decomposition vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeVertex {
    /// Elimination step, starting at 1
    pub step: usize,
    /// The vertex plus its neighbours at elimination time
    pub bag: BTreeSet<String>,
}

/// Tree decomposition produced by greedy elimination.
#[derive(Debug, Clone, Default)]
pub struct TreeDecomposition {
    /// Directed tree, edges point from parent to child
    pub tree: Graph,
    /// Per-vertex bag and step
    pub vertices: BTreeMap<String, TreeVertex>,
    /// Last eliminated vertex
    pub root: Option<String>,
}

impl TreeDecomposition {
    /// Children of a tree vertex.
    pub fn children(&self, vertex: &str) -> impl Iterator<Item = &String> + '_ {
        self.tree.neighbors(vertex)
    }

    fn bag(&self, vertex: &str) -> Option<&BTreeSet<String>> {
        self.vertices.get(vertex).map(|v| &v.bag)
    }
}

/// DP state: an assignment of the vertices relevant to `node`'s subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct SubProblem {
    /// Tree vertex this state belongs to
    pub node: String,
    /// Vertices on the left side of the bipartition
    pub left: BTreeSet<String>,
    /// Vertices on the right side
    pub right: BTreeSet<String>,
    /// Vertices removed into the cover
    pub pick: BTreeSet<String>,
    /// Cost of the best completion of this state
    pub cost: f64,
    /// Child vertex to signature of the best child state
    pub chosen: BTreeMap<String, String>,
}

impl SubProblem {
    fn new(
        node: &str,
        left: BTreeSet<String>,
        right: BTreeSet<String>,
        pick: BTreeSet<String>,
    ) -> Self {
        Self {
            node: node.to_string(),
            left,
            right,
            pick,
            cost: 0.0,
            chosen: BTreeMap::new(),
        }
    }

    /// Canonical memoization key over node and the three sets.
    pub fn signature(&self) -> String {
        let join = |set: &BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>().join(", ");
        format!(
            "({})=>({})({})({})",
            self.node,
            join(&self.left),
            join(&self.right),
            join(&self.pick)
        )
    }

    /// Cost without the picks inherited from the parent, which the parent
    /// already pays for.
    fn modified_cost(&self, solver: &OccSolver) -> f64 {
        self.cost
            - self
                .pick
                .iter()
                .filter(|v| **v != self.node)
                .map(|v| solver.weight(v))
                .sum::<f64>()
    }
}

/// Odd cycle cover solver over a weighted graph.
#[derive(Debug, Clone)]
pub struct OccSolver {
    graph: Graph,
    weights: VertexWeights,
}

impl OccSolver {
    /// Solver over an arbitrary undirected graph.
    pub fn new(graph: Graph, weights: VertexWeights) -> Self {
        Self { graph, weights }
    }

    /// Solver over the site graph of a topology.
    pub fn from_topology(topology: &dyn TopologyView, site_weights: VertexWeights) -> Self {
        Self::new(Self::site_graph(topology), site_weights)
    }

    /// Sites as vertices, one edge per pair of sites joined by a wireless link.
    pub fn site_graph(topology: &dyn TopologyView) -> Graph {
        let mut graph = Graph::undirected();
        for site in topology.sites() {
            graph.add_vertex(site.name.as_str());
        }
        for link in topology.links() {
            if !link.is_wireless() {
                continue;
            }
            let a_site = topology.node(&link.a_node_name).map(|n| n.site_name.as_str());
            let z_site = topology.node(&link.z_node_name).map(|n| n.site_name.as_str());
            if let (Some(a), Some(z)) = (a_site, z_site) {
                if a != z {
                    graph.add_edge(a, z);
                }
            }
        }
        graph
    }

    /// The graph being covered.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    fn weight(&self, vertex: &str) -> f64 {
        self.weights
            .get(vertex)
            .copied()
            .unwrap_or(DEFAULT_VERTEX_WEIGHT)
    }

    /// Compute a minimum-weight odd cycle cover.
    pub fn get_occ_solution(&self) -> BTreeSet<String> {
        let decomposition = self.greedy_tree_decomp();
        let Some(root) = decomposition.root.as_deref() else {
            return BTreeSet::new();
        };

        let memo = self.solve_occ(&decomposition, root);
        let best = Self::root_problems(root)
            .iter()
            .filter_map(|p| memo.get(&p.signature()))
            .fold(None::<&SubProblem>, |best, p| match best {
                Some(b) if b.cost <= p.cost => Some(b),
                _ => Some(p),
            });

        let mut solution = BTreeSet::new();
        let Some(best) = best else {
            return solution;
        };
        tracing::trace!(signature = %best.signature(), cost = best.cost, "Best root problem");

        let mut stack = vec![best];
        while let Some(problem) = stack.pop() {
            solution.extend(problem.pick.iter().cloned());
            stack.extend(problem.chosen.values().filter_map(|sig| memo.get(sig)));
        }

        tracing::debug!(solution = ?solution, "OCC solution");
        solution
    }

    /// Greedy min-fill elimination into a tree decomposition.
    pub fn greedy_tree_decomp(&self) -> TreeDecomposition {
        let mut graph = self.graph.clone();
        let mut decomposition = TreeDecomposition {
            tree: Graph::new(true),
            ..TreeDecomposition::default()
        };
        let mut elimination_order: Vec<String> = Vec::new();

        let mut step = 0;
        while let Some(vertex) = Self::min_priority_vertex(&graph) {
            step += 1;
            let mut bag: BTreeSet<String> = graph.neighbors(&vertex).cloned().collect();
            for (a, b) in Self::fillin(&graph, &bag) {
                graph.add_edge(&a, &b);
            }
            graph.remove_vertex(&vertex);
            bag.insert(vertex.clone());

            tracing::trace!(step, vertex = %vertex, bag = ?bag, "Eliminated vertex");
            decomposition.tree.add_vertex(vertex.as_str());
            decomposition
                .vertices
                .insert(vertex.clone(), TreeVertex { step, bag });
            elimination_order.push(vertex);
        }

        let Some(root) = elimination_order.pop() else {
            return decomposition;
        };

        // attach each vertex below the next-eliminated member of its bag
        for child in elimination_order.iter().rev() {
            let parent = decomposition.vertices[child]
                .bag
                .iter()
                .filter(|v| *v != child)
                .min_by_key(|v| decomposition.vertices[v.as_str()].step)
                .cloned()
                .unwrap_or_else(|| root.clone());
            decomposition.tree.add_edge(&parent, child);
        }
        decomposition.root = Some(root);
        decomposition
    }

    /// Missing edges among `vertices`.
    fn fillin(graph: &Graph, vertices: &BTreeSet<String>) -> Vec<(String, String)> {
        let mut fill = Vec::new();
        for (i, a) in vertices.iter().enumerate() {
            for b in vertices.iter().skip(i + 1) {
                if !graph.is_neighbor(a, b) {
                    fill.push((a.clone(), b.clone()));
                }
            }
        }
        fill
    }

    fn priority(graph: &Graph, vertex: &str) -> usize {
        graph
            .neighbor_set(vertex)
            .map_or(0, |neighbors| Self::fillin(graph, neighbors).len())
    }

    fn min_priority_vertex(graph: &Graph) -> Option<String> {
        let mut best: Option<(usize, &String)> = None;
        for vertex in graph.vertices() {
            let priority = Self::priority(graph, vertex);
            // ties keep the smallest name, so elimination order is fixed by
            // vertex names alone; a last-wins rule gives different but
            // equally valid decompositions
            if best.map_or(true, |(p, _)| priority < p) {
                best = Some((priority, vertex));
            }
        }
        best.map(|(_, v)| v.clone())
    }

    fn root_problems(root: &str) -> [SubProblem; 3] {
        let only = || BTreeSet::from([root.to_string()]);
        [
            SubProblem::new(root, only(), BTreeSet::new(), BTreeSet::new()),
            SubProblem::new(root, BTreeSet::new(), only(), BTreeSet::new()),
            SubProblem::new(root, BTreeSet::new(), BTreeSet::new(), only()),
        ]
    }

    /// Child states a state needs before its cost is known.
    ///
    /// A child may join a side only if none of its graph neighbours already
    /// sits on that side; it may always be picked.
    fn dependencies(&self, decomposition: &TreeDecomposition, problem: &SubProblem) -> Vec<SubProblem> {
        let mut dependencies = Vec::new();
        for child in decomposition.children(&problem.node) {
            let Some(bag) = decomposition.bag(child) else {
                continue;
            };
            let restrict = |set: &BTreeSet<String>| -> BTreeSet<String> {
                set.intersection(bag).cloned().collect()
            };
            let left = restrict(&problem.left);
            let right = restrict(&problem.right);
            let pick = restrict(&problem.pick);

            let connected_left = self.graph.neighbors(child).any(|n| problem.left.contains(n));
            let connected_right = self.graph.neighbors(child).any(|n| problem.right.contains(n));

            if !connected_left {
                let mut with_child = left.clone();
                with_child.insert(child.clone());
                dependencies.push(SubProblem::new(child, with_child, right.clone(), pick.clone()));
            }
            if !connected_right {
                let mut with_child = right.clone();
                with_child.insert(child.clone());
                dependencies.push(SubProblem::new(child, left.clone(), with_child, pick.clone()));
            }
            let mut with_child = pick;
            with_child.insert(child.clone());
            dependencies.push(SubProblem::new(child, left, right, with_child));
        }
        dependencies
    }

    /// Bottom-up evaluation of every reachable state, memoized by signature.
    fn solve_occ(&self, decomposition: &TreeDecomposition, root: &str) -> HashMap<String, SubProblem> {
        let mut memo: HashMap<String, SubProblem> = HashMap::new();
        let mut stack: Vec<SubProblem> = Self::root_problems(root).into();

        while let Some(mut problem) = stack.pop() {
            let signature = problem.signature();
            if memo.contains_key(&signature) {
                continue;
            }

            let dependencies = self.dependencies(decomposition, &problem);
            let missing: Vec<SubProblem> = dependencies
                .iter()
                .filter(|d| !memo.contains_key(&d.signature()))
                .cloned()
                .collect();
            if !missing.is_empty() {
                tracing::trace!(signature = %signature, pending = missing.len(), "Deferring subproblem");
                stack.push(problem);
                stack.extend(missing);
                continue;
            }

            let mut best_per_child: BTreeMap<String, (String, f64)> = BTreeMap::new();
            for dependency in &dependencies {
                let dep_signature = dependency.signature();
                let Some(solved) = memo.get(&dep_signature) else {
                    continue;
                };
                let cost = solved.modified_cost(self);
                let better = best_per_child
                    .get(&solved.node)
                    .map_or(true, |(_, best)| cost < *best);
                if better {
                    best_per_child.insert(solved.node.clone(), (dep_signature, cost));
                }
            }

            problem.cost = problem.pick.iter().map(|v| self.weight(v)).sum::<f64>()
                + best_per_child.values().map(|(_, cost)| cost).sum::<f64>();
            problem.chosen = best_per_child
                .into_iter()
                .map(|(child, (sig, _))| (child, sig))
                .collect();
            memo.insert(signature, problem);
        }

        memo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshplan_topology::test_utils::{create_topology, site_name};

    fn pole(i: usize) -> String {
        site_name(i)
    }

    fn graph_from(num_vertices: usize, edges: &[(usize, usize)]) -> Graph {
        let mut graph = Graph::undirected();
        for i in 0..num_vertices {
            graph.add_vertex(pole(i));
        }
        for &(a, b) in edges {
            graph.add_edge(&pole(a), &pole(b));
        }
        graph
    }

    fn wheel() -> Graph {
        graph_from(
            5,
            &[(0, 1), (0, 2), (0, 3), (0, 4), (1, 2), (2, 3), (3, 4), (4, 1)],
        )
    }

    #[test]
    fn test_min_priority_ties_pick_first_name() {
        // both path ends need no fill-in
        let path = graph_from(3, &[(0, 1), (1, 2)]);
        assert_eq!(OccSolver::min_priority_vertex(&path), Some(pole(0)));

        let mut graph = graph_from(4, &[(0, 1), (1, 2), (2, 0), (2, 3)]);
        assert_eq!(OccSolver::min_priority_vertex(&graph), Some(pole(0)));
        graph.remove_vertex(&pole(0));
        assert_eq!(OccSolver::min_priority_vertex(&graph), Some(pole(1)));
        assert_eq!(OccSolver::min_priority_vertex(&Graph::undirected()), None);
    }

    fn solve(graph: Graph, weights: &[(usize, f64)]) -> BTreeSet<String> {
        let weights = weights.iter().map(|&(v, w)| (pole(v), w)).collect();
        OccSolver::new(graph, weights).get_occ_solution()
    }

    fn set_of(vertices: &[usize]) -> BTreeSet<String> {
        vertices.iter().map(|&v| pole(v)).collect()
    }

    #[test]
    fn test_empty_graph() {
        assert!(solve(Graph::undirected(), &[]).is_empty());
    }

    #[test]
    fn test_single_vertex() {
        assert!(solve(graph_from(1, &[]), &[]).is_empty());
    }

    #[test]
    fn test_single_edge() {
        assert!(solve(graph_from(2, &[(0, 1)]), &[]).is_empty());
    }

    #[test]
    fn test_grid_is_bipartite() {
        // 3x3 grid
        let edges = [
            (0, 1), (1, 2), (3, 4), (4, 5), (6, 7), (7, 8),
            (0, 3), (3, 6), (1, 4), (4, 7), (2, 5), (5, 8),
        ];
        assert!(solve(graph_from(9, &edges), &[]).is_empty());
    }

    #[test]
    fn test_tree_is_bipartite() {
        let edges = [(0, 1), (0, 2), (1, 3), (1, 4), (2, 5)];
        assert!(solve(graph_from(6, &edges), &[]).is_empty());
    }

    #[test]
    fn test_uniform_triangle_picks_one_vertex() {
        let solution = solve(graph_from(3, &[(0, 1), (1, 2), (2, 0)]), &[]);
        assert_eq!(solution.len(), 1);
    }

    #[test]
    fn test_weighted_triangle_picks_lightest() {
        let solution = solve(
            graph_from(3, &[(0, 1), (1, 2), (2, 0)]),
            &[(0, 0.5), (1, 1.0), (2, 1.0)],
        );
        assert_eq!(solution, set_of(&[0]));
    }

    #[test]
    fn test_uniform_wheel_picks_hub() {
        assert_eq!(solve(wheel(), &[]), set_of(&[0]));
    }

    #[test]
    fn test_wheel_hub_weight_tradeoff() {
        let rim: Vec<(usize, f64)> = (1..5).map(|v| (v, 1.0)).collect();

        let mut weights = rim.clone();
        weights.push((0, 1.9));
        assert_eq!(solve(wheel(), &weights), set_of(&[0]));

        let mut weights = rim;
        weights.push((0, 2.1));
        let solution = solve(wheel(), &weights);
        assert!(
            solution == set_of(&[1, 3]) || solution == set_of(&[2, 4]),
            "unexpected solution {:?}",
            solution
        );
    }

    #[test]
    fn test_two_disjoint_triangles() {
        let edges = [(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)];
        let solution = solve(graph_from(6, &edges), &[(1, 500.0), (4, 500.0)]);
        assert_eq!(solution.len(), 2);
        assert!(!solution.contains(&pole(1)));
        assert!(!solution.contains(&pole(4)));
    }

    #[test]
    fn test_tree_decomposition_covers_every_edge() {
        let solver = OccSolver::new(wheel(), VertexWeights::new());
        let decomposition = solver.greedy_tree_decomp();

        assert_eq!(decomposition.vertices.len(), 5);
        assert_eq!(decomposition.tree.num_edges(), 4);
        let root = decomposition.root.clone().unwrap();
        let root_step = decomposition.vertices[&root].step;
        assert!(decomposition.vertices.values().all(|v| v.step <= root_step));

        for a in solver.graph().vertices() {
            for b in solver.graph().neighbors(a) {
                assert!(
                    decomposition
                        .vertices
                        .values()
                        .any(|v| v.bag.contains(a) && v.bag.contains(b)),
                    "edge {}-{} not in any bag",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_signature_format() {
        let problem = SubProblem::new(
            "b",
            BTreeSet::from(["a".to_string(), "b".to_string()]),
            BTreeSet::new(),
            BTreeSet::from(["c".to_string()]),
        );
        assert_eq!(problem.signature(), "(b)=>(a, b)()(c)");
    }

    #[test]
    fn test_site_graph_skips_intra_site_links() {
        // nodes 0 and 1 share pole-0; 1-2 and 2-0 cross sites
        let topology = create_topology(3, &[(0, 1), (1, 2), (2, 0)], 2, &[(0, 0), (1, 0), (2, 1)], &[]);
        let graph = OccSolver::site_graph(&topology);
        assert_eq!(graph.num_vertices(), 2);
        assert_eq!(graph.num_edges(), 1);
        assert!(OccSolver::from_topology(&topology, VertexWeights::new())
            .get_occ_solution()
            .is_empty());
    }
}
