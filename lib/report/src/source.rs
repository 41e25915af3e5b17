use crate::html::escape;
use crate::{Report, ReportError};
use profscope_model::{percentage, FunctionId};
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write;
use std::path::Path;

/// Lines of context printed around the sampled lines of a function.
const CONTEXT_LINES: u32 = 5;

#[derive(Debug, Default)]
struct FunctionSamples {
    flat: i64,
    cum: i64,
    /// `(flat, cum)` per source line.
    lines: BTreeMap<u32, (i64, i64)>,
}

/// Aggregates the samples of all functions whose name matches `symbol`.
fn function_samples(report: &Report, symbol: &Regex) -> HashMap<FunctionId, FunctionSamples> {
    let profile = report.profile();
    let mut functions = HashMap::<FunctionId, FunctionSamples>::new();
    for stack in report.stacks() {
        let mut seen_functions = HashSet::new();
        let mut seen_lines = HashSet::new();
        for (position, frame) in stack.frames.iter().enumerate() {
            let Some(id) = frame.function else {
                continue;
            };
            if !symbol.is_match(&profile.function(id).name) {
                continue;
            }
            let samples = functions.entry(id).or_default();
            let line = samples.lines.entry(frame.line).or_default();
            if position == 0 {
                samples.flat += stack.value;
                line.0 += stack.value;
            }
            if seen_lines.insert((id, frame.line)) {
                line.1 += stack.value;
            }
            if seen_functions.insert(id) {
                samples.cum += stack.value;
            }
        }
    }
    functions
}

/// Writes an HTML listing of the source of every function matching the symbol of a weblist
/// command, annotated with the flat and cumulative value of each line.
pub fn print_web_list(
    out: &mut impl Write,
    report: &Report,
    limit: usize,
) -> Result<(), ReportError> {
    let symbol = report
        .command()
        .symbol()
        .ok_or_else(|| ReportError::MissingFocus("weblist".to_owned()))?;
    let profile = report.profile();
    let total = report.total();

    let mut functions = function_samples(report, symbol)
        .into_iter()
        .collect::<Vec<_>>();
    if functions.is_empty() {
        return Err(ReportError::NoMatches(symbol.as_str().to_owned()));
    }
    functions.sort_by(|(a_id, a), (b_id, b)| {
        b.flat
            .cmp(&a.flat)
            .then_with(|| b.cum.cmp(&a.cum))
            .then_with(|| profile.function(*a_id).name.cmp(&profile.function(*b_id).name))
    });

    for (id, samples) in functions.into_iter().take(limit) {
        let function = profile.function(id);
        writeln!(out, "<h2>{}</h2>", escape(&function.name))?;
        let Some(filename) = &function.filename else {
            writeln!(out, "<p class=\"error\">source file unknown</p>")?;
            continue;
        };
        writeln!(
            out,
            "<p class=\"filename\">{}</p>",
            escape(&filename.display().to_string())
        )?;
        writeln!(out, "<pre>")?;
        writeln!(
            out,
            "  Total:  {:>10} {:>10} (flat, cum) {}",
            report.format_value(samples.flat),
            report.format_value(samples.cum),
            percentage(samples.cum, total)
        )?;
        write_source_lines(out, report, filename, &samples)?;
        writeln!(out, "</pre>")?;
    }
    Ok(())
}

fn write_source_lines(
    out: &mut impl Write,
    report: &Report,
    filename: &Path,
    samples: &FunctionSamples,
) -> Result<(), ReportError> {
    let source = match std::fs::read_to_string(filename) {
        Ok(source) => source,
        Err(error) => {
            tracing::debug!("cannot read {}: {error}", filename.display());
            writeln!(
                out,
                "<span class=\"error\">cannot read {}: {}</span>",
                escape(&filename.display().to_string()),
                escape(&error.to_string())
            )?;
            return Ok(());
        }
    };

    let sampled = samples.lines.keys().copied().filter(|line| *line > 0);
    let (Some(first), Some(last)) = (sampled.clone().min(), sampled.max()) else {
        return Ok(());
    };
    let start = first.saturating_sub(CONTEXT_LINES).max(1);
    let end = last.saturating_add(CONTEXT_LINES);

    let value = |v: i64| {
        if v == 0 {
            ".".to_owned()
        } else {
            report.format_value(v)
        }
    };
    for (number, text) in (1_u32..).zip(source.lines()) {
        if number < start {
            continue;
        }
        if number > end {
            break;
        }
        let (flat, cum) = samples.lines.get(&number).copied().unwrap_or_default();
        let class = if cum == 0 { "nop" } else { "hot" };
        writeln!(
            out,
            "<span class=\"{class}\">{number:>6} {:>10} {:>10} {}</span>",
            value(flat),
            value(cum),
            escape(text)
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::report_for;
    use crate::{build_report, Command, Diagnostics, ReportOptions};
    use profscope_model::{Line, ProfileBuilder, ValueType};
    use std::sync::Arc;

    #[test]
    fn annotates_source_lines() {
        let dir = std::env::temp_dir().join(format!("profscope-source-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("lib.rs");
        let source = (1..=20)
            .map(|i| format!("line {i} <code>"))
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(&file, source).unwrap();

        let mut builder = ProfileBuilder::new(vec![ValueType::new("cpu", "nanoseconds")]);
        let function = builder.function("lib::hot", "_ZN3lib3hotE", Some(file.clone()));
        let first = builder.location(0, vec![Line { function, line: 8 }]);
        let second = builder.location(0, vec![Line { function, line: 9 }]);
        builder
            .add_sample(vec![first], vec![30], BTreeMap::new())
            .unwrap();
        builder
            .add_sample(vec![second], vec![10], BTreeMap::new())
            .unwrap();
        let report = build_report(
            Arc::new(builder.build()),
            Command::parse(&["weblist", "hot"]).unwrap(),
            ReportOptions::default(),
            &mut Diagnostics::default(),
        )
        .unwrap();

        let mut out = String::new();
        print_web_list(&mut out, &report, 10).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert!(out.contains("<h2>lib::hot</h2>"));
        assert!(out.contains("(flat, cum)   100%"));
        assert!(out.contains(&format!("{:>6} {:>10} {:>10} line 3 &lt;code&gt;", 3, ".", ".")));
        assert!(out.contains(&format!("{:>6} {:>10} {:>10} line 8", 8, "30ns", "30ns")));
        assert!(out.contains(&format!("{:>6} {:>10} {:>10} line 9", 9, "10ns", "10ns")));
        assert!(!out.contains("line 2 "));
        assert!(!out.contains("line 15"));
    }

    #[test]
    fn reports_unreadable_files_inline() {
        let report = report_for(&["weblist", "app::compute"], &[]);
        let mut out = String::new();
        print_web_list(&mut out, &report, 10).unwrap();
        assert!(out.contains("<h2>app::compute</h2>"));
        assert!(out.contains("<span class=\"error\">cannot read src/app.rs"));
    }

    #[test]
    fn fails_without_matches() {
        let report = report_for(&["list", "nothing"], &[]);
        assert!(matches!(
            print_web_list(&mut String::new(), &report, 10),
            Err(ReportError::NoMatches(_))
        ));
    }
}
