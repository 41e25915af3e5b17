//! Builds reports for cached profiles from request parameters.

use profscope_model::Profile;
use profscope_report::{build_report, Command, Diagnostics, Report, ReportError, Variables};
use std::sync::Arc;

/// A report together with the non-fatal problems found while building it.
#[derive(Debug)]
pub struct ReportOutput {
    pub report: Report,
    pub diagnostics: Vec<String>,
}

/// The error that prevented a report, and the problems found before it.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ReportFailure {
    #[source]
    pub error: ReportError,
    pub diagnostics: Vec<String>,
}

/// Builds a report for `command`.
///
/// Report variables are taken from the query pairs (short aliases such as `f` for `focus` are
/// accepted, unknown keys are ignored) and then from `overrides`, which always win.
pub fn make_report<K, V>(
    profile: Arc<Profile>,
    command: &[&str],
    query: impl IntoIterator<Item = (K, V)>,
    overrides: &[(&str, &str)],
) -> Result<ReportOutput, ReportFailure>
where
    K: AsRef<str>,
    V: Into<String>,
{
    let mut diagnostics = Diagnostics::default();
    match build(profile, command, query, overrides, &mut diagnostics) {
        Ok(report) => Ok(ReportOutput {
            report,
            diagnostics: diagnostics.into_messages(),
        }),
        Err(error) => {
            tracing::warn!("Cannot build {} report: {error}", command.join(" "));
            Err(ReportFailure {
                error,
                diagnostics: diagnostics.into_messages(),
            })
        }
    }
}

fn build<K, V>(
    profile: Arc<Profile>,
    command: &[&str],
    query: impl IntoIterator<Item = (K, V)>,
    overrides: &[(&str, &str)],
    diagnostics: &mut Diagnostics,
) -> Result<Report, ReportError>
where
    K: AsRef<str>,
    V: Into<String>,
{
    let mut variables = Variables::from_query(query);
    for (name, value) in overrides {
        variables.set(name, *value)?;
    }
    let options = variables.to_options()?;
    let command = Command::parse(command)?;
    build_report(profile, command, options, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use profscope_model::{Line, ProfileBuilder, ValueType};
    use std::collections::BTreeMap;

    fn profile() -> Arc<Profile> {
        let mut builder = ProfileBuilder::new(vec![
            ValueType::new("samples", "count"),
            ValueType::new("cpu", "nanoseconds"),
        ]);
        let main = builder.function("app::main", "main", None);
        let work = builder.function("app::work", "work", None);
        let main = builder.location(0, vec![Line { function: main, line: 1 }]);
        let work = builder.location(0, vec![Line { function: work, line: 2 }]);
        builder
            .add_sample(vec![work, main], vec![1, 10], BTreeMap::new())
            .unwrap();
        builder
            .add_sample(vec![main], vec![1, 5], BTreeMap::new())
            .unwrap();
        Arc::new(builder.build())
    }

    #[test]
    fn reads_variables_from_the_query() {
        let output = make_report(
            profile(),
            &["top"],
            [("f", "work"), ("pn", "ignored")],
            &[],
        )
        .unwrap();
        assert_eq!(output.report.total(), 10);
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn overrides_win_over_the_query() {
        let output = make_report(
            profile(),
            &["top"],
            [("nodecount", "1"), ("si", "samples")],
            &[("nodecount", "500"), ("sample_index", "cpu")],
        )
        .unwrap();
        assert_eq!(output.report.options().node_count, Some(500));
        assert_eq!(output.report.total(), 15);
    }

    #[test]
    fn collects_diagnostics() {
        let output = make_report(profile(), &["svg"], [("i", "nothing")], &[]).unwrap();
        assert_eq!(
            output.diagnostics,
            ["no matches found for regexp: nothing"]
        );
    }

    #[test]
    fn reports_failures() {
        let failure =
            make_report(profile(), &["disasm", ""], Vec::<(String, String)>::new(), &[])
                .unwrap_err();
        assert!(matches!(failure.error, ReportError::MissingFocus(_)));

        let failure = make_report(profile(), &["top"], [("si", "wall")], &[]).unwrap_err();
        assert!(failure.to_string().contains("wall"));
    }
}
