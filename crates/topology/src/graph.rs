//! Minimal adjacency-set graph used for site graphs, link-group graphs and
//! tree decompositions.

use std::collections::{BTreeMap, BTreeSet};

/// Directed or undirected graph over string vertices.
///
/// Undirected graphs store every edge in both adjacency sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    directed: bool,
    adjacency: BTreeMap<String, BTreeSet<String>>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new(directed: bool) -> Self {
        Self {
            directed,
            adjacency: BTreeMap::new(),
        }
    }

    /// Create an empty undirected graph.
    pub fn undirected() -> Self {
        Self::new(false)
    }

    /// Whether edges are one-way.
    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// Add a vertex; existing vertices keep their edges.
    pub fn add_vertex(&mut self, vertex: impl Into<String>) {
        self.adjacency.entry(vertex.into()).or_default();
    }

    /// Remove a vertex and every edge touching it.
    pub fn remove_vertex(&mut self, vertex: &str) {
        if self.adjacency.remove(vertex).is_none() {
            return;
        }
        for neighbors in self.adjacency.values_mut() {
            neighbors.remove(vertex);
        }
    }

    /// Add an edge. Does nothing unless both endpoints exist.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        if !self.has_vertex(from) || !self.has_vertex(to) {
            return;
        }
        if let Some(neighbors) = self.adjacency.get_mut(from) {
            neighbors.insert(to.to_string());
        }
        if !self.directed {
            if let Some(neighbors) = self.adjacency.get_mut(to) {
                neighbors.insert(from.to_string());
            }
        }
    }

    /// Add every `(from, to)` pair.
    pub fn add_edges<'a, I>(&mut self, edges: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (from, to) in edges {
            self.add_edge(from, to);
        }
    }

    /// Remove an edge if present.
    pub fn remove_edge(&mut self, from: &str, to: &str) {
        if let Some(neighbors) = self.adjacency.get_mut(from) {
            neighbors.remove(to);
        }
        if !self.directed {
            if let Some(neighbors) = self.adjacency.get_mut(to) {
                neighbors.remove(from);
            }
        }
    }

    /// Whether the vertex exists.
    pub fn has_vertex(&self, vertex: &str) -> bool {
        self.adjacency.contains_key(vertex)
    }

    /// Vertices in ascending order.
    pub fn vertices(&self) -> impl Iterator<Item = &String> + '_ {
        self.adjacency.keys()
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of edges (each undirected edge counted once).
    pub fn num_edges(&self) -> usize {
        let arcs: usize = self.adjacency.values().map(BTreeSet::len).sum();
        if self.directed {
            arcs
        } else {
            arcs / 2
        }
    }

    /// Neighbours of a vertex; unknown vertices have none.
    pub fn neighbors(&self, vertex: &str) -> impl Iterator<Item = &String> + '_ {
        self.adjacency.get(vertex).into_iter().flatten()
    }

    /// Neighbour set of a vertex, if it exists.
    pub fn neighbor_set(&self, vertex: &str) -> Option<&BTreeSet<String>> {
        self.adjacency.get(vertex)
    }

    /// Whether `to` is adjacent from `from`.
    pub fn is_neighbor(&self, from: &str, to: &str) -> bool {
        self.adjacency
            .get(from)
            .map_or(false, |neighbors| neighbors.contains(to))
    }

    /// Drop all vertices and edges.
    pub fn clear(&mut self) {
        self.adjacency.clear();
    }
}
