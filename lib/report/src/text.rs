use crate::Report;
use profscope_model::percentage;
use serde::Serialize;

/// One row of the hot list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextItem {
    pub name: String,
    pub flat: i64,
    pub cum: i64,
    pub flat_format: String,
    pub cum_format: String,
    pub flat_percent: String,
    /// Running total of the flat percentages up to and including this row.
    pub sum_percent: String,
    pub cum_percent: String,
}

/// Computes the hot list of a report, ordered by flat value, together with its legend labels.
pub fn text_items(report: &Report) -> (Vec<TextItem>, Vec<String>) {
    let (graph, summary) = report.graph();
    let labels = report.legend_labels(Some(&summary));
    let total = report.total();

    let mut sum = 0;
    let items = graph
        .nodes_by_flat()
        .into_iter()
        .map(|id| {
            let node = graph.node(id);
            sum += node.flat;
            TextItem {
                name: node.info.printable_name(),
                flat: node.flat,
                cum: node.cum,
                flat_format: report.format_value(node.flat),
                cum_format: report.format_value(node.cum),
                flat_percent: percentage(node.flat, total),
                sum_percent: percentage(sum, total),
                cum_percent: percentage(node.cum, total),
            }
        })
        .collect();
    (items, labels)
}
