//! The views of a profile and how each one is derived from a report.

use crate::error::ProfScopeServerError;
use crate::render::ViewBody;
use crate::state::AppState;
use profscope::reporting::{
    build_flame_tree, compose_dot, print_assembly, print_call_sites, print_web_list, text_items,
    to_graph_and_config, Graph, Report, ReportError, MAX_LISTING_ENTRIES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Graph,
    Top,
    Disasm,
    Source,
    Peek,
    Flamegraph,
}

/// A transformed report, ready to be placed into a page.
#[derive(Debug)]
pub struct ViewOutput {
    pub legend: Vec<String>,
    /// Node names, indexed like the nodes of the rendered graph.
    pub nodes: Vec<String>,
    pub body: ViewBody,
}

impl ViewKind {
    /// The report command of this view. Listing views take the symbol regex `f`.
    pub fn command(self, symbol: &str) -> Vec<&str> {
        match self {
            Self::Graph | Self::Flamegraph => vec!["svg"],
            Self::Top => vec!["top"],
            Self::Disasm => vec!["disasm", symbol],
            Self::Source => vec!["weblist", symbol],
            Self::Peek => vec!["peek", symbol],
        }
    }

    /// Report variables that this view always sets, whatever the request says.
    pub fn overrides(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Top => &[("nodecount", "500")],
            Self::Peek => &[("granularity", "lines")],
            Self::Flamegraph => &[("call_tree", "true"), ("trim", "false")],
            Self::Graph | Self::Disasm | Self::Source => &[],
        }
    }

    pub fn template(self) -> &'static str {
        match self {
            Self::Graph => "graph.html",
            Self::Top => "top.html",
            Self::Disasm | Self::Peek => "plaintext.html",
            Self::Source => "sourcelisting.html",
            Self::Flamegraph => "flamegraph.html",
        }
    }

    pub fn transform(
        self,
        report: &Report,
        state: &AppState,
    ) -> Result<ViewOutput, ProfScopeServerError> {
        match self {
            Self::Graph => {
                let (graph, config) = to_graph_and_config(report);
                let mut dot = String::new();
                compose_dot(&mut dot, &graph, &config)
                    .map_err(|error| ProfScopeServerError::Internal(error.to_string()))?;
                let svg = state.graph_converter().to_svg(&dot)?;
                // DOT node ids start at 1.
                let nodes = std::iter::once(String::new())
                    .chain(node_names(&graph))
                    .collect();
                Ok(ViewOutput {
                    legend: config.labels,
                    nodes,
                    body: ViewBody::Graph { svg },
                })
            }
            Self::Top => {
                let (items, legend) = text_items(report);
                let nodes = items.iter().map(|item| item.name.clone()).collect();
                Ok(ViewOutput {
                    legend,
                    nodes,
                    body: ViewBody::Top { items },
                })
            }
            Self::Disasm => {
                let mut text = String::new();
                print_assembly(&mut text, report, state.obj_tool(), MAX_LISTING_ENTRIES)
                    .map_err(bad_listing)?;
                Ok(listing(report, ViewBody::Text { text }))
            }
            Self::Source => {
                let mut html = String::new();
                print_web_list(&mut html, report, MAX_LISTING_ENTRIES).map_err(bad_listing)?;
                Ok(listing(report, ViewBody::Html { html }))
            }
            Self::Peek => {
                let mut text = String::new();
                print_call_sites(&mut text, report).map_err(bad_listing)?;
                Ok(listing(report, ViewBody::Text { text }))
            }
            Self::Flamegraph => {
                let (graph, config) = to_graph_and_config(report);
                let flame =
                    build_flame_tree(&graph, report.total(), |value| report.format_value(value));
                Ok(ViewOutput {
                    legend: config.labels,
                    nodes: node_names(&graph).collect(),
                    body: ViewBody::Flame { flame },
                })
            }
        }
    }
}

fn node_names(graph: &Graph) -> impl Iterator<Item = String> + '_ {
    graph.nodes.iter().map(|node| node.info.name.clone())
}

fn listing(report: &Report, body: ViewBody) -> ViewOutput {
    ViewOutput {
        legend: report.profile_labels(),
        nodes: Vec::new(),
        body,
    }
}

fn bad_listing(error: ReportError) -> ProfScopeServerError {
    ProfScopeServerError::BadRequest(error.to_string())
}
