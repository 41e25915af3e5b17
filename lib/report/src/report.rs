use crate::graph::{Graph, NodeInfo, TrimSummary};
use crate::{Command, ReportError, ReportOptions};
use chrono::{DateTime, Local};
use profscope_model::{format_value, percentage, FunctionId, LocationId, Profile, ValueType};
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

/// A single (possibly inlined) frame of a sample.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame {
    pub function: Option<FunctionId>,
    pub line: u32,
    pub address: u64,
    pub location: LocationId,
}

/// The frames of one sample, leaf first, and the selected sample value.
#[derive(Debug, Clone)]
pub(crate) struct Stack {
    pub frames: Vec<Frame>,
    pub value: i64,
}

/// Non-fatal messages collected while building a report.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    messages: Vec<String>,
}

impl Diagnostics {
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("report diagnostic: {message}");
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

/// A filtered view of a profile for a single command.
#[derive(Debug, Clone)]
pub struct Report {
    profile: Arc<Profile>,
    command: Command,
    options: ReportOptions,
    sample_index: usize,
    stacks: Vec<Stack>,
    total: i64,
}

/// Builds a report for `command` from `profile`.
///
/// The sample filters of `options` are applied in the order focus, ignore, hide, show. Filters
/// that match no frame are reported through `diagnostics`.
pub fn build_report(
    profile: Arc<Profile>,
    command: Command,
    options: ReportOptions,
    diagnostics: &mut Diagnostics,
) -> Result<Report, ReportError> {
    let sample_index = profile.sample_index(&options.sample_index)?;

    let mut stacks = profile
        .samples
        .iter()
        .filter_map(|sample| {
            let value = sample.values.get(sample_index).copied().unwrap_or(0);
            (value != 0).then(|| Stack {
                frames: expand_frames(&profile, &sample.locations),
                value,
            })
        })
        .collect::<Vec<_>>();

    let name_of = |frame: &Frame| frame_name(&profile, frame);
    if let Some(focus) = &options.focus {
        let mut matched = false;
        stacks.retain(|stack| {
            let keep = stack.frames.iter().any(|f| focus.is_match(&name_of(f)));
            matched |= keep;
            keep
        });
        report_unmatched(diagnostics, focus, matched);
    }
    if let Some(ignore) = &options.ignore {
        let mut matched = false;
        stacks.retain(|stack| {
            let drop = stack.frames.iter().any(|f| ignore.is_match(&name_of(f)));
            matched |= drop;
            !drop
        });
        report_unmatched(diagnostics, ignore, matched);
    }
    if let Some(hide) = &options.hide {
        let mut matched = false;
        for stack in &mut stacks {
            stack.frames.retain(|f| {
                let hidden = hide.is_match(&name_of(f));
                matched |= hidden;
                !hidden
            });
        }
        report_unmatched(diagnostics, hide, matched);
    }
    if let Some(show) = &options.show {
        let mut matched = false;
        for stack in &mut stacks {
            stack.frames.retain(|f| {
                let shown = show.is_match(&name_of(f));
                matched |= shown;
                shown
            });
        }
        report_unmatched(diagnostics, show, matched);
    }

    let total = stacks.iter().map(|s| s.value).sum();
    tracing::debug!(
        "built report over {} of {} samples, total {total}",
        stacks.len(),
        profile.samples.len()
    );

    Ok(Report {
        profile,
        command,
        options,
        sample_index,
        stacks,
        total,
    })
}

fn report_unmatched(diagnostics: &mut Diagnostics, re: &Regex, matched: bool) {
    if !matched {
        diagnostics.push(format!("no matches found for regexp: {}", re.as_str()));
    }
}

/// Expands the locations of a sample into frames, innermost inlined frame first.
fn expand_frames(profile: &Profile, locations: &[LocationId]) -> Vec<Frame> {
    let mut frames = Vec::with_capacity(locations.len());
    for id in locations {
        let location = profile.location(*id);
        if location.lines.is_empty() {
            frames.push(Frame {
                function: None,
                line: 0,
                address: location.address,
                location: *id,
            });
        }
        frames.extend(location.lines.iter().map(|line| Frame {
            function: Some(line.function),
            line: line.line,
            address: location.address,
            location: *id,
        }));
    }
    frames
}

pub(crate) fn frame_name(profile: &Profile, frame: &Frame) -> String {
    match frame.function {
        Some(id) => profile.function(id).name.clone(),
        None => format!("{:#x}", frame.address),
    }
}

impl Report {
    pub fn profile(&self) -> &Arc<Profile> {
        &self.profile
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    pub fn sample_index(&self) -> usize {
        self.sample_index
    }

    pub fn sample_type(&self) -> &ValueType {
        &self.profile.sample_types[self.sample_index]
    }

    /// The sum of the selected sample values after filtering.
    pub fn total(&self) -> i64 {
        self.total
    }

    /// Formats a value in the unit of the selected sample type.
    pub fn format_value(&self, value: i64) -> String {
        format_value(value, &self.sample_type().unit)
    }

    pub(crate) fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    /// Builds the call graph of this report and trims it according to the report options.
    pub fn graph(&self) -> (Graph, TrimSummary) {
        let options = &self.options;
        let full = Graph::build(
            &self.stacks,
            &self.profile,
            options.granularity,
            options.call_tree,
            None,
        );
        if !options.trim {
            let summary = TrimSummary::untrimmed(&full);
            return (full, summary);
        }

        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_precision_loss,
            reason = "Cutoffs are approximations"
        )]
        let cutoff = |fraction: f64| (self.total.abs() as f64 * fraction) as i64;
        let node_cutoff = cutoff(options.node_fraction);
        let edge_cutoff = cutoff(options.edge_fraction);

        let mut kept = full
            .nodes
            .iter()
            .filter(|node| node.cum.abs() > node_cutoff)
            .collect::<Vec<_>>();
        let dropped_nodes = full.nodes.len() - kept.len();
        kept.sort_by(|a, b| {
            b.cum
                .abs()
                .cmp(&a.cum.abs())
                .then_with(|| b.flat.abs().cmp(&a.flat.abs()))
                .then_with(|| a.info.cmp(&b.info))
        });
        let candidates = kept.len();
        if let Some(count) = options.node_count.or(self.command.default_node_count()) {
            kept.truncate(count);
        }
        let keep = kept
            .into_iter()
            .map(|node| node.info.clone())
            .collect::<HashSet<NodeInfo>>();

        let mut graph = Graph::build(
            &self.stacks,
            &self.profile,
            options.granularity,
            options.call_tree,
            Some(&keep),
        );
        let dropped_edges = graph.retain_edges(|edge| edge.weight.abs() > edge_cutoff);

        let summary = TrimSummary {
            candidate_nodes: candidates,
            shown_nodes: graph.nodes.len(),
            shown_value: graph.nodes.iter().map(|n| n.flat).sum(),
            dropped_nodes,
            node_cutoff,
            dropped_edges,
            edge_cutoff,
        };
        (graph, summary)
    }

    /// Labels describing the profile and the applied filters.
    pub fn profile_labels(&self) -> Vec<String> {
        let profile = &self.profile;
        let mut labels = vec![format!("Type: {}", self.sample_type().kind)];

        let time = DateTime::<Local>::from(profile.time);
        labels.push(format!(
            "Time: {}",
            time.format("%b %-d, %Y at %-I:%M%P (%Z)")
        ));

        let total = self.format_value(self.total);
        if profile.duration.is_zero() {
            labels.push(format!("Total samples = {total}"));
        } else {
            let nanos = i64::try_from(profile.duration.as_nanos()).unwrap_or(i64::MAX);
            let duration = format_value(nanos, "nanoseconds");
            if self.sample_type().unit == "nanoseconds" {
                labels.push(format!(
                    "Duration: {duration}, Total samples = {total} ({})",
                    percentage(self.total, nanos).trim()
                ));
            } else {
                labels.push(format!("Duration: {duration}, Total samples = {total}"));
            }
        }

        let mut filters = self.options.filters().peekable();
        if filters.peek().is_some() {
            labels.push("Active filters:".to_owned());
            labels.extend(filters.map(|(name, re)| format!("   {name}={}", re.as_str())));
        }
        labels
    }

    /// Labels summarizing how a graph of this report was trimmed.
    pub fn graph_labels(&self, summary: &TrimSummary) -> Vec<String> {
        let mut labels = vec![format!(
            "Showing nodes accounting for {}, {} of {} total",
            self.format_value(summary.shown_value),
            percentage(summary.shown_value, self.total).trim(),
            self.format_value(self.total)
        )];
        if summary.dropped_nodes > 0 {
            labels.push(format!(
                "Dropped {} nodes (cum <= {})",
                summary.dropped_nodes,
                self.format_value(summary.node_cutoff)
            ));
        }
        if summary.dropped_edges > 0 {
            labels.push(format!(
                "Dropped {} edges (freq <= {})",
                summary.dropped_edges,
                self.format_value(summary.edge_cutoff)
            ));
        }
        if summary.shown_nodes < summary.candidate_nodes {
            labels.push(format!(
                "Showing top {} nodes out of {}",
                summary.shown_nodes, summary.candidate_nodes
            ));
        }
        labels
    }

    /// All legend labels, optionally including the trimming summary of a graph.
    pub fn legend_labels(&self, summary: Option<&TrimSummary>) -> Vec<String> {
        let mut labels = self.profile_labels();
        if let Some(summary) = summary {
            labels.extend(self.graph_labels(summary));
        }
        labels
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::Variables;
    use profscope_model::{Line, ProfileBuilder};
    use std::collections::BTreeMap;
    use std::time::{Duration, SystemTime};

    /// A small CPU profile:
    ///
    /// ```text
    /// main -> work -> compute   (60)
    /// main -> work -> alloc     (30)
    /// main -> idle              (10)
    /// ```
    pub(crate) fn sample_profile() -> Arc<Profile> {
        let mut builder = ProfileBuilder::new(vec![
            profscope_model::ValueType::new("samples", "count"),
            profscope_model::ValueType::new("cpu", "nanoseconds"),
        ])
        .period(profscope_model::ValueType::new("cpu", "nanoseconds"), 1)
        .time(SystemTime::UNIX_EPOCH, Duration::from_nanos(200));

        let location = |builder: &mut ProfileBuilder, name: &str, line: u32| {
            let function = builder.function(
                format!("app::{name}"),
                format!("_ZN3app{}{name}E", name.len()),
                Some("src/app.rs".into()),
            );
            builder.location(0, vec![Line { function, line }])
        };
        let main = location(&mut builder, "main", 10);
        let work = location(&mut builder, "work", 20);
        let compute = location(&mut builder, "compute", 30);
        let alloc = location(&mut builder, "alloc", 40);
        let idle = location(&mut builder, "idle", 50);

        for (stack, value) in [
            (vec![compute, work, main], 60),
            (vec![alloc, work, main], 30),
            (vec![idle, main], 10),
        ] {
            builder
                .add_sample(stack, vec![value / 10, value], BTreeMap::new())
                .unwrap();
        }
        Arc::new(builder.build())
    }

    pub(crate) fn report_for(command: &[&str], query: &[(&str, &str)]) -> Report {
        let options = Variables::from_query(query.iter().copied())
            .to_options()
            .unwrap();
        build_report(
            sample_profile(),
            Command::parse(command).unwrap(),
            options,
            &mut Diagnostics::default(),
        )
        .unwrap()
    }

    #[test]
    fn selects_the_last_sample_type_by_default() {
        let report = report_for(&["top"], &[]);
        assert_eq!(report.sample_type().kind, "cpu");
        assert_eq!(report.total(), 100);

        let report = report_for(&["top"], &[("si", "samples")]);
        assert_eq!(report.total(), 10);
    }

    #[test]
    fn applies_sample_filters() {
        assert_eq!(report_for(&["top"], &[("f", "work")]).total(), 90);
        assert_eq!(report_for(&["top"], &[("i", "alloc")]).total(), 70);

        let report = report_for(&["top"], &[("h", "compute")]);
        assert_eq!(report.total(), 100);
        assert_eq!(report.stacks()[0].frames.len(), 2);
    }

    #[test]
    fn reports_filters_without_matches() {
        let options = Variables::from_query([("f", "nothing")]).to_options().unwrap();
        let mut diagnostics = Diagnostics::default();
        let report = build_report(
            sample_profile(),
            Command::Top,
            options,
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(report.total(), 0);
        assert_eq!(
            diagnostics.messages(),
            ["no matches found for regexp: nothing"]
        );
    }

    #[test]
    fn rejects_unknown_sample_types() {
        let options = Variables::from_query([("si", "wall")]).to_options().unwrap();
        let result = build_report(
            sample_profile(),
            Command::Top,
            options,
            &mut Diagnostics::default(),
        );
        assert!(matches!(result, Err(ReportError::Model(_))));
    }

    #[test]
    fn describes_the_report_in_labels() {
        let report = report_for(&["svg"], &[("f", "work")]);
        let (_, summary) = report.graph();
        let labels = report.legend_labels(Some(&summary));
        assert_eq!(labels[0], "Type: cpu");
        assert!(labels[1].starts_with("Time: "));
        assert_eq!(labels[2], "Duration: 200ns, Total samples = 90ns (45.00%)");
        assert_eq!(labels[3], "Active filters:");
        assert_eq!(labels[4], "   focus=work");
        assert_eq!(
            labels[5],
            "Showing nodes accounting for 90ns, 100% of 90ns total"
        );
    }

    #[test]
    fn trims_graphs_by_node_count() {
        let report = report_for(&["svg"], &[("nodecount", "2")]);
        let (graph, summary) = report.graph();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(summary.candidate_nodes, 5);
        assert!(report
            .graph_labels(&summary)
            .contains(&"Showing top 2 nodes out of 5".to_owned()));
    }
}
