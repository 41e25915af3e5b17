use crate::{shorten_function_name, Graph};
use profscope_model::percentage;
use serde::Serialize;
use std::cmp::Reverse;

/// A node of a flame graph, serialized with the short keys expected by the flame graph page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlameNode {
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "f")]
    pub full_name: String,
    #[serde(rename = "v")]
    pub cum: i64,
    #[serde(rename = "l")]
    pub cum_format: String,
    #[serde(rename = "p")]
    pub percent: String,
    #[serde(rename = "c")]
    pub children: Vec<FlameNode>,
}

/// Re-expands a call graph into a flame tree below a synthetic `root` node.
///
/// Every node is linked below each of its callers, so nodes with several callers appear several
/// times. Expansion stops at nodes that are already on the current path.
pub fn build_flame_tree(
    graph: &Graph,
    total: i64,
    format_value: impl Fn(i64) -> String,
) -> FlameNode {
    let templates = graph
        .nodes
        .iter()
        .map(|node| {
            let full_name = node.info.printable_name();
            FlameNode {
                name: shorten_function_name(&full_name),
                full_name,
                cum: node.cum,
                cum_format: format_value(node.cum),
                percent: percentage(node.cum, total).trim().to_owned(),
                children: Vec::new(),
            }
        })
        .collect::<Vec<_>>();

    let mut order = (0..graph.nodes.len()).collect::<Vec<_>>();
    let mut root_count = 0;
    let mut root_value = 0;
    for i in 0..order.len() {
        let node = &graph.nodes[order[i]];
        if node.in_edges.is_empty() {
            order.swap(i, root_count);
            root_count += 1;
            root_value += node.cum;
        }
    }

    let mut children = vec![Vec::new(); graph.nodes.len()];
    for node in &graph.nodes {
        for edge in &node.out_edges {
            children[node.id.0].push(graph.edge(*edge).dest.0);
        }
    }
    for list in &mut children {
        list.sort_by_key(|id| Reverse(graph.nodes[*id].cum));
    }

    let mut on_path = vec![false; graph.nodes.len()];
    let roots = order[..root_count]
        .iter()
        .map(|id| expand(*id, &templates, &children, &mut on_path))
        .collect();

    FlameNode {
        name: "root".to_owned(),
        full_name: "root".to_owned(),
        cum: root_value,
        cum_format: format_value(root_value),
        percent: percentage(root_value, total).trim().to_owned(),
        children: roots,
    }
}

fn expand(
    id: usize,
    templates: &[FlameNode],
    children: &[Vec<usize>],
    on_path: &mut [bool],
) -> FlameNode {
    let mut node = templates[id].clone();
    on_path[id] = true;
    for child in &children[id] {
        if !on_path[*child] {
            node.children.push(expand(*child, templates, children, on_path));
        }
    }
    on_path[id] = false;
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::report_for;
    use crate::{Edge, Node, NodeId, NodeInfo};

    fn flame(query: &[(&str, &str)]) -> FlameNode {
        let report = report_for(&["svg"], query);
        let (graph, _) = report.graph();
        build_flame_tree(&graph, report.total(), |v| report.format_value(v))
    }

    fn count(node: &FlameNode) -> usize {
        1 + node.children.iter().map(count).sum::<usize>()
    }

    #[test]
    fn builds_a_tree_below_a_synthetic_root() {
        let root = flame(&[("call_tree", "true"), ("trim", "false")]);
        assert_eq!(root.name, "root");
        assert_eq!(root.cum, 100);
        assert_eq!(root.percent, "100%");
        assert_eq!(root.children.len(), 1);

        let main = &root.children[0];
        assert_eq!(main.full_name, "app::main");
        assert_eq!(main.cum_format, "100ns");
        let names = main
            .children
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["app::work", "app::idle"]);
        assert_eq!(main.children[0].children[0].full_name, "app::compute");
        assert_eq!(count(&root), 6);
    }

    #[test]
    fn serializes_with_short_keys() {
        let root = flame(&[("f", "idle")]);
        let json = serde_json::to_value(&root).unwrap();
        assert_eq!(json["n"], "root");
        assert_eq!(json["v"], 10);
        assert_eq!(json["c"][0]["f"], "app::main");
        assert_eq!(json["c"][0]["c"][0]["l"], "10ns");
        assert_eq!(json["c"][0]["c"][0]["p"], "100%");
    }

    fn node(id: usize, name: &str, cum: i64) -> Node {
        Node {
            id: NodeId(id),
            info: NodeInfo {
                name: name.to_owned(),
                file: None,
                line: 0,
                address: 0,
            },
            flat: 0,
            cum,
            in_edges: Vec::new(),
            out_edges: Vec::new(),
        }
    }

    fn edge(src: usize, dest: usize, weight: i64) -> Edge {
        Edge {
            src: NodeId(src),
            dest: NodeId(dest),
            weight,
            residual: false,
        }
    }

    fn graph(nodes: Vec<Node>, edges: Vec<Edge>) -> Graph {
        let mut graph = Graph { nodes, edges };
        for (index, edge) in graph.edges.iter().enumerate() {
            graph.nodes[edge.src.0].out_edges.push(index);
            graph.nodes[edge.dest.0].in_edges.push(index);
        }
        graph
    }

    #[test]
    fn links_shared_callees_below_every_caller() {
        // a -> c, b -> c, c -> a (a cycle through a)
        let graph = graph(
            vec![node(0, "c", 5), node(1, "a", 10), node(2, "b", 20)],
            vec![edge(1, 0, 3), edge(2, 0, 2), edge(0, 1, 1)],
        );
        let root = build_flame_tree(&graph, 30, |v| v.to_string());

        assert_eq!(root.cum, 20);
        assert_eq!(root.children.len(), 1);
        let b = &root.children[0];
        assert_eq!(b.name, "b");

        // b -> c -> a, and a stops before revisiting c.
        assert_eq!(b.children[0].name, "c");
        assert_eq!(b.children[0].children[0].name, "a");
        assert!(b.children[0].children[0].children.is_empty());
    }

    #[test]
    fn sums_the_values_of_all_roots() {
        let graph = graph(
            vec![node(0, "x", 7), node(1, "y", 5), node(2, "z", 3)],
            vec![edge(0, 2, 3), edge(1, 2, 0)],
        );
        let root = build_flame_tree(&graph, 12, |v| v.to_string());
        assert_eq!(root.cum, 12);
        let names = root
            .children
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["x", "y"]);
        assert!(root.children.iter().all(|c| c.children[0].name == "z"));
    }
}
