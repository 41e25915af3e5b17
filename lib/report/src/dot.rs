use crate::{Graph, Report};
use profscope_model::{format_value, percentage};
use std::fmt::{self, Write};

const BASE_FONT_SIZE: f64 = 8.0;
const MAX_FONT_GROWTH: f64 = 16.0;

/// Presentation settings for [compose_dot].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotConfig {
    pub title: String,
    pub labels: Vec<String>,
    pub total: i64,
    pub unit: String,
}

impl DotConfig {
    pub fn format_value(&self, value: i64) -> String {
        format_value(value, &self.unit)
    }
}

/// Builds the trimmed graph of a report together with the settings to render it.
pub fn to_graph_and_config(report: &Report) -> (Graph, DotConfig) {
    let (graph, summary) = report.graph();
    let title = report
        .profile()
        .main_binary()
        .and_then(|mapping| mapping.file.file_name())
        .map_or_else(
            || "unnamed".to_owned(),
            |name| name.to_string_lossy().into_owned(),
        );
    let config = DotConfig {
        title,
        labels: report.legend_labels(Some(&summary)),
        total: report.total(),
        unit: report.sample_type().unit.clone(),
    };
    (graph, config)
}

/// Writes `graph` in the Graphviz DOT language.
#[allow(clippy::cast_precision_loss, reason = "Only used for styling")]
pub fn compose_dot(out: &mut impl Write, graph: &Graph, config: &DotConfig) -> fmt::Result {
    writeln!(out, "digraph \"{}\" {{", escape(&config.title))?;
    writeln!(out, "node [style=filled fillcolor=\"#f8f8f8\"]")?;

    let legend = config
        .labels
        .iter()
        .map(|label| format!("{}\\l", escape(label)))
        .collect::<String>();
    writeln!(
        out,
        "subgraph cluster_L {{ \"{title}\" [shape=box fontsize=16 label=\"{legend}\" tooltip=\"{title}\"] }}",
        title = escape(&config.title),
    )?;

    let total = config.total.abs().max(1) as f64;
    let max_flat = graph
        .nodes
        .iter()
        .map(|n| n.flat.abs())
        .max()
        .unwrap_or(0)
        .max(1) as f64;

    for node in &graph.nodes {
        let name = node.info.printable_name();
        let mut label = name.split(' ').map(escape).collect::<Vec<_>>().join("\\n");
        let flat = format!(
            "{} ({})",
            config.format_value(node.flat),
            percentage(node.flat, config.total).trim()
        );
        let cum = format!(
            "{} ({})",
            config.format_value(node.cum),
            percentage(node.cum, config.total).trim()
        );
        if node.flat == 0 {
            write!(label, "\\nof {cum}")?;
        } else {
            write!(label, "\\n{flat}\\nof {cum}")?;
        }

        let font_size = BASE_FONT_SIZE
            + (MAX_FONT_GROWTH * (node.flat.abs() as f64 / max_flat).sqrt()).ceil();
        let score = node.cum as f64 / total;
        writeln!(
            out,
            "N{id} [label=\"{label}\" id=\"node{id}\" fontsize={font_size} shape=box tooltip=\"{tooltip} ({cum_value})\" color=\"{color}\" fillcolor=\"{fill}\"]",
            id = node.id.0 + 1,
            tooltip = escape(&name),
            cum_value = config.format_value(node.cum),
            color = dot_color(score, false),
            fill = dot_color(score, true),
        )?;
    }

    for edge in &graph.edges {
        let ratio = edge.weight.abs() as f64 / total;
        let weight = 1.0 + 100.0 * ratio;
        let pen_width = 1.0 + 5.0 * ratio;
        let value = config.format_value(edge.weight);
        let tooltip = format!(
            "{} -> {} ({value})",
            graph.node(edge.src).info.printable_name(),
            graph.node(edge.dest).info.printable_name()
        );
        let style = if edge.residual { " style=\"dotted\"" } else { "" };
        writeln!(
            out,
            "N{src} -> N{dest} [label=\" {value}\" weight={weight:.0} penwidth={pen_width:.2} color=\"{color}\" tooltip=\"{tooltip}\" labeltooltip=\"{tooltip}\"{style}]",
            src = edge.src.0 + 1,
            dest = edge.dest.0 + 1,
            color = dot_color(ratio, false),
            tooltip = escape(&tooltip),
        )?;
    }

    writeln!(out, "}}")
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Maps a score in `[-1, 1]` to a color, gray for values close to zero and increasingly red
/// (positive) or green (negative) otherwise.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "Channels are clamped to [0, 255]"
)]
fn dot_color(score: f64, background: bool) -> String {
    const SHIFT: f64 = 0.7;
    let (mut saturation, value) = if background { (0.1, 0.93) } else { (1.0, 0.7) };

    let score = score.clamp(-1.0, 1.0);
    if score.abs() < 0.2 {
        saturation *= score.abs() / 0.2;
    }
    let score = score.signum() * score.abs().powf(1.0 - SHIFT);

    let (r, g) = if score < 0.0 {
        (value * (1.0 + saturation * score), value)
    } else {
        (value, value * (1.0 - saturation * score))
    };
    let b = value * (1.0 - saturation);
    let channel = |c: f64| (c * 255.0).clamp(0.0, 255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", channel(r), channel(g), channel(b))
}
