use crate::report::{frame_name, Frame, Stack};
use crate::Granularity;
use profscope_model::Profile;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Index of a [Node] within [Graph::nodes].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// The identity of a graph node. Fields that are irrelevant for the granularity of the graph
/// are left empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeInfo {
    pub name: String,
    pub file: Option<String>,
    pub line: u32,
    pub address: u64,
}

impl NodeInfo {
    fn new(profile: &Profile, frame: &Frame, granularity: Granularity) -> Self {
        let name = frame_name(profile, frame);
        let file = frame
            .function
            .and_then(|id| profile.function(id).filename.as_ref())
            .map(|path| path.display().to_string());

        match granularity {
            Granularity::Functions => Self {
                name,
                file: None,
                line: 0,
                address: 0,
            },
            Granularity::FileFunctions => Self {
                name,
                file,
                line: 0,
                address: 0,
            },
            Granularity::Files => Self {
                name: file.unwrap_or_else(|| "<unknown>".to_owned()),
                file: None,
                line: 0,
                address: 0,
            },
            Granularity::Lines => Self {
                name,
                file,
                line: frame.line,
                address: 0,
            },
            Granularity::Addresses => Self {
                name,
                file,
                line: frame.line,
                address: frame.address,
            },
        }
    }

    /// The name shown for the node, e.g. `app::main lib.rs:12`.
    pub fn printable_name(&self) -> String {
        let mut parts = Vec::new();
        if self.address != 0 {
            parts.push(format!("{:#x}", self.address));
        }
        if !self.name.is_empty() {
            parts.push(self.name.clone());
        }
        if let Some(file) = &self.file {
            let file = Path::new(file)
                .file_name()
                .map_or_else(|| file.clone(), |name| name.to_string_lossy().into_owned());
            if self.line == 0 {
                parts.push(file);
            } else {
                parts.push(format!("{file}:{}", self.line));
            }
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub info: NodeInfo,
    /// Value of the samples where this node is the leaf.
    pub flat: i64,
    /// Value of the samples that contain this node.
    pub cum: i64,
    /// Indices into [Graph::edges].
    pub in_edges: Vec<usize>,
    /// Indices into [Graph::edges].
    pub out_edges: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub src: NodeId,
    pub dest: NodeId,
    pub weight: i64,
    /// The edge replaces a path through nodes that were trimmed from the graph.
    pub residual: bool,
}

/// Describes how a trimmed graph was derived from the full graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimSummary {
    /// Nodes above the node cutoff.
    pub candidate_nodes: usize,
    pub shown_nodes: usize,
    /// Sum of the flat values of the shown nodes.
    pub shown_value: i64,
    pub dropped_nodes: usize,
    pub node_cutoff: i64,
    pub dropped_edges: usize,
    pub edge_cutoff: i64,
}

impl TrimSummary {
    pub(crate) fn untrimmed(graph: &Graph) -> Self {
        Self {
            candidate_nodes: graph.nodes.len(),
            shown_nodes: graph.nodes.len(),
            shown_value: graph.nodes.iter().map(|n| n.flat).sum(),
            ..Self::default()
        }
    }
}

/// A call graph. Edges point from callers to callees.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    /// Builds a graph from leaf-first stacks.
    ///
    /// In call tree mode, nodes are distinguished by their call path. With `keep`, all other
    /// nodes are dropped and the edges bridging them are marked as residual.
    pub(crate) fn build(
        stacks: &[Stack],
        profile: &Profile,
        granularity: Granularity,
        call_tree: bool,
        keep: Option<&HashSet<NodeInfo>>,
    ) -> Self {
        let mut graph = Self::default();
        let mut node_index = HashMap::<(Option<usize>, NodeInfo), usize>::new();
        let mut edge_index = HashMap::<(usize, usize), usize>::new();

        for stack in stacks {
            let mut seen_nodes = HashSet::new();
            let mut seen_edges = HashSet::new();
            let mut parent: Option<usize> = None;
            let mut residual = false;

            for (position, frame) in stack.frames.iter().enumerate().rev() {
                let info = NodeInfo::new(profile, frame, granularity);
                if keep.is_some_and(|keep| !keep.contains(&info)) {
                    residual = parent.is_some();
                    continue;
                }

                let key = (if call_tree { parent } else { None }, info);
                let id = *node_index.entry(key).or_insert_with_key(|(_, info)| {
                    let id = graph.nodes.len();
                    graph.nodes.push(Node {
                        id: NodeId(id),
                        info: info.clone(),
                        flat: 0,
                        cum: 0,
                        in_edges: Vec::new(),
                        out_edges: Vec::new(),
                    });
                    id
                });

                if seen_nodes.insert(id) {
                    graph.nodes[id].cum += stack.value;
                }
                if position == 0 {
                    graph.nodes[id].flat += stack.value;
                }

                if let Some(src) = parent {
                    if seen_edges.insert((src, id)) {
                        let edge = *edge_index.entry((src, id)).or_insert_with(|| {
                            graph.edges.push(Edge {
                                src: NodeId(src),
                                dest: NodeId(id),
                                weight: 0,
                                residual,
                            });
                            graph.edges.len() - 1
                        });
                        let edge = &mut graph.edges[edge];
                        edge.weight += stack.value;
                        edge.residual &= residual;
                    }
                }
                parent = Some(id);
                residual = false;
            }
        }

        graph.link();
        graph
    }

    /// Keeps the edges matching `predicate` and returns the number of removed edges.
    pub(crate) fn retain_edges(&mut self, predicate: impl Fn(&Edge) -> bool) -> usize {
        let before = self.edges.len();
        self.edges.retain(predicate);
        self.link();
        before - self.edges.len()
    }

    fn link(&mut self) {
        for node in &mut self.nodes {
            node.in_edges.clear();
            node.out_edges.clear();
        }
        for (index, edge) in self.edges.iter().enumerate() {
            self.nodes[edge.src.0].out_edges.push(index);
            self.nodes[edge.dest.0].in_edges.push(index);
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn edge(&self, index: usize) -> &Edge {
        &self.edges[index]
    }

    /// Nodes without callers.
    pub fn roots(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.in_edges.is_empty())
    }

    /// Node ids ordered by decreasing flat value, then decreasing cumulative value and name.
    pub fn nodes_by_flat(&self) -> Vec<NodeId> {
        let mut ids = self.nodes.iter().map(|n| n.id).collect::<Vec<_>>();
        ids.sort_by(|a, b| {
            let (a, b) = (self.node(*a), self.node(*b));
            b.flat
                .abs()
                .cmp(&a.flat.abs())
                .then_with(|| b.cum.abs().cmp(&a.cum.abs()))
                .then_with(|| a.info.cmp(&b.info))
        });
        ids
    }

    /// Edges sorted by decreasing weight.
    pub(crate) fn sorted_edges<'a>(&'a self, edges: &'a [usize]) -> Vec<&'a Edge> {
        let mut edges = edges.iter().map(|e| self.edge(*e)).collect::<Vec<_>>();
        edges.sort_by(|a, b| {
            b.weight
                .abs()
                .cmp(&a.weight.abs())
                .then_with(|| (a.src, a.dest).cmp(&(b.src, b.dest)))
        });
        edges
    }
}

#[cfg(test)]
mod tests {
    use crate::report::tests::report_for;

    fn names(graph: &super::Graph) -> Vec<String> {
        graph
            .nodes_by_flat()
            .into_iter()
            .map(|id| graph.node(id).info.printable_name())
            .collect()
    }

    #[test]
    fn computes_flat_and_cumulative_values() {
        let (graph, _) = report_for(&["svg"], &[]).graph();
        assert_eq!(graph.nodes.len(), 5);
        assert_eq!(graph.edges.len(), 4);

        let by_name = |name: &str| {
            graph
                .nodes
                .iter()
                .find(|n| n.info.name == name)
                .unwrap()
        };
        let main = by_name("app::main");
        assert_eq!((main.flat, main.cum), (0, 100));
        let work = by_name("app::work");
        assert_eq!((work.flat, work.cum), (0, 90));
        assert_eq!(work.in_edges.len(), 1);
        assert_eq!(work.out_edges.len(), 2);
        assert_eq!(graph.roots().count(), 1);

        assert_eq!(
            names(&graph),
            ["app::compute", "app::alloc", "app::idle", "app::main", "app::work"]
        );
    }

    #[test]
    fn aggregates_by_line() {
        let (graph, _) = report_for(&["svg"], &[("granularity", "lines")]).graph();
        assert_eq!(graph.nodes_by_flat().len(), 5);
        assert_eq!(
            graph.node(graph.nodes_by_flat()[0]).info.printable_name(),
            "app::compute app.rs:30"
        );
    }

    #[test]
    fn bridges_dropped_nodes_with_residual_edges() {
        let (graph, _) = report_for(&["svg"], &[("nodecount", "3")]).graph();
        let names = graph
            .nodes
            .iter()
            .map(|n| n.info.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["app::main", "app::work", "app::compute"]);
        assert!(graph.edges.iter().all(|e| !e.residual));

        let (graph, _) = report_for(&["svg"], &[("h", "work")]).graph();
        assert_eq!(graph.nodes.len(), 4);
        assert!(graph.edges.iter().all(|e| graph.node(e.src).info.name == "app::main"));
    }
}
