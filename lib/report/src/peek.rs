use crate::{Report, ReportError};
use profscope_model::percentage;
use std::fmt::Write;

const SEPARATOR: &str = "----------------------------------------------------------+-------------";

/// Prints the callers and callees of every graph node matching the symbol of a peek command.
pub fn print_call_sites(out: &mut impl Write, report: &Report) -> Result<(), ReportError> {
    let symbol = report
        .command()
        .symbol()
        .ok_or_else(|| ReportError::MissingFocus("peek".to_owned()))?;
    let (graph, _) = report.graph();
    let total = report.total();

    let matches = graph
        .nodes_by_flat()
        .into_iter()
        .map(|id| graph.node(id))
        .filter(|node| symbol.is_match(&node.info.printable_name()))
        .collect::<Vec<_>>();
    if matches.is_empty() {
        return Err(ReportError::NoMatches(symbol.as_str().to_owned()));
    }

    writeln!(out, "{SEPARATOR}")?;
    writeln!(
        out,
        "      flat  flat%   sum%        cum   cum%   calls calls% + context"
    )?;
    writeln!(out, "{SEPARATOR}")?;

    let mut sum = 0;
    for node in matches {
        sum += node.flat;
        for edge in graph.sorted_edges(&node.in_edges) {
            writeln!(
                out,
                "{:>50} {:>6} |   {}",
                report.format_value(edge.weight),
                percentage(edge.weight, node.cum),
                graph.node(edge.src).info.printable_name()
            )?;
        }
        writeln!(
            out,
            "{:>10} {:>6} {:>6} {:>10} {:>6}                | {}",
            report.format_value(node.flat),
            percentage(node.flat, total),
            percentage(sum, total),
            report.format_value(node.cum),
            percentage(node.cum, total),
            node.info.printable_name()
        )?;
        for edge in graph.sorted_edges(&node.out_edges) {
            writeln!(
                out,
                "{:>50} {:>6} |   {}",
                report.format_value(edge.weight),
                percentage(edge.weight, node.cum),
                graph.node(edge.dest).info.printable_name()
            )?;
        }
        writeln!(out, "{SEPARATOR}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::report_for;

    #[test]
    fn prints_callers_and_callees() {
        let report = report_for(&["peek", "app::work"], &[]);
        let mut out = String::new();
        print_call_sites(&mut out, &report).unwrap();

        let lines = out.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], SEPARATOR);
        assert!(lines[3].ends_with("|   app::main"));
        assert!(lines[3].contains("  100% |"));
        assert!(lines[4].ends_with("| app::work"));
        assert!(lines[5].ends_with("|   app::compute"));
        assert!(lines[6].ends_with("|   app::alloc"));
        assert_eq!(lines[7], SEPARATOR);
    }

    #[test]
    fn fails_without_matches() {
        let report = report_for(&["peek", "nothing"], &[]);
        let result = print_call_sites(&mut String::new(), &report);
        assert!(matches!(result, Err(ReportError::NoMatches(re)) if re == "nothing"));
    }
}
