use crate::ReportError;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const FOCUS: &str = "focus";
const IGNORE: &str = "ignore";
const HIDE: &str = "hide";
const SHOW: &str = "show";
const SAMPLE_INDEX: &str = "sample_index";
const NODE_COUNT: &str = "nodecount";
const NODE_FRACTION: &str = "nodefraction";
const EDGE_FRACTION: &str = "edgefraction";
const CALL_TREE: &str = "call_tree";
const TRIM: &str = "trim";
const GRANULARITY: &str = "granularity";

const VARIABLES: [&str; 11] = [
    FOCUS,
    IGNORE,
    HIDE,
    SHOW,
    SAMPLE_INDEX,
    NODE_COUNT,
    NODE_FRACTION,
    EDGE_FRACTION,
    CALL_TREE,
    TRIM,
    GRANULARITY,
];

/// Maps short URL parameter names to report variables.
fn canonical_name(name: &str) -> Option<&'static str> {
    match name {
        "f" => Some(FOCUS),
        "i" => Some(IGNORE),
        "h" => Some(HIDE),
        "s" => Some(SHOW),
        "si" => Some(SAMPLE_INDEX),
        other => VARIABLES.iter().copied().find(|v| *v == other),
    }
}

/// The level at which samples are aggregated into graph nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Granularity {
    #[default]
    Functions,
    FileFunctions,
    Files,
    Lines,
    Addresses,
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "functions" => Ok(Self::Functions),
            "filefunctions" => Ok(Self::FileFunctions),
            "files" => Ok(Self::Files),
            "lines" => Ok(Self::Lines),
            "addresses" => Ok(Self::Addresses),
            _ => Err(
                "expected one of functions, filefunctions, files, lines or addresses".to_owned(),
            ),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Functions => "functions",
            Self::FileFunctions => "filefunctions",
            Self::Files => "files",
            Self::Lines => "lines",
            Self::Addresses => "addresses",
        };
        f.write_str(name)
    }
}

/// Raw, string-valued report variables as they arrive from a request.
///
/// Unset variables keep their defaults when converted with [Variables::to_options].
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: BTreeMap<&'static str, String>,
}

impl Variables {
    /// Collects the known variables from query parameters. Unknown keys (e.g. the profile name)
    /// are ignored.
    pub fn from_query<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut variables = Self::default();
        for (key, value) in pairs {
            if let Some(name) = canonical_name(key.as_ref()) {
                variables.values.insert(name, value.into());
            }
        }
        variables
    }

    /// Sets a variable, replacing any previous value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<(), ReportError> {
        let name = canonical_name(name).ok_or_else(|| ReportError::UnknownOption(name.to_owned()))?;
        self.values.insert(name, value.into());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        canonical_name(name)
            .and_then(|name| self.values.get(name))
            .map(String::as_str)
    }

    pub fn to_options(&self) -> Result<ReportOptions, ReportError> {
        let mut options = ReportOptions::default();
        for (name, value) in &self.values {
            let value = value.trim();
            match *name {
                FOCUS => options.focus = parse_regex(value)?,
                IGNORE => options.ignore = parse_regex(value)?,
                HIDE => options.hide = parse_regex(value)?,
                SHOW => options.show = parse_regex(value)?,
                SAMPLE_INDEX => value.clone_into(&mut options.sample_index),
                NODE_COUNT => options.node_count = parse_node_count(value)?,
                NODE_FRACTION => options.node_fraction = parse_fraction(name, value)?,
                EDGE_FRACTION => options.edge_fraction = parse_fraction(name, value)?,
                CALL_TREE => options.call_tree = parse_bool(name, value)?,
                TRIM => options.trim = parse_bool(name, value)?,
                GRANULARITY => {
                    options.granularity = value
                        .parse()
                        .map_err(|reason| invalid(GRANULARITY, value, reason))?;
                }
                other => return Err(ReportError::UnknownOption(other.to_owned())),
            }
        }
        Ok(options)
    }
}

/// Typed report options.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub focus: Option<Regex>,
    pub ignore: Option<Regex>,
    pub hide: Option<Regex>,
    pub show: Option<Regex>,
    /// Sample type selector, resolved with [Profile::sample_index](profscope_model::Profile).
    pub sample_index: String,
    /// `None` uses the default of the command.
    pub node_count: Option<usize>,
    pub node_fraction: f64,
    pub edge_fraction: f64,
    pub call_tree: bool,
    pub trim: bool,
    pub granularity: Granularity,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            focus: None,
            ignore: None,
            hide: None,
            show: None,
            sample_index: String::new(),
            node_count: None,
            node_fraction: 0.005,
            edge_fraction: 0.001,
            call_tree: false,
            trim: true,
            granularity: Granularity::Functions,
        }
    }
}

impl ReportOptions {
    /// The active sample filters, in the order they are applied.
    pub fn filters(&self) -> impl Iterator<Item = (&'static str, &Regex)> {
        [
            (FOCUS, &self.focus),
            (IGNORE, &self.ignore),
            (HIDE, &self.hide),
            (SHOW, &self.show),
        ]
        .into_iter()
        .filter_map(|(name, re)| re.as_ref().map(|re| (name, re)))
    }
}

fn invalid(option: &str, value: &str, reason: impl Into<String>) -> ReportError {
    ReportError::InvalidOption {
        option: option.to_owned(),
        value: value.to_owned(),
        reason: reason.into(),
    }
}

fn parse_regex(value: &str) -> Result<Option<Regex>, ReportError> {
    if value.is_empty() {
        return Ok(None);
    }
    Regex::new(value)
        .map(Some)
        .map_err(|e| ReportError::InvalidRegex(value.to_owned(), e))
}

fn parse_node_count(value: &str) -> Result<Option<usize>, ReportError> {
    match value {
        "" | "-1" => Ok(None),
        value => value
            .parse()
            .map(Some)
            .map_err(|e: std::num::ParseIntError| invalid(NODE_COUNT, value, e.to_string())),
    }
}

fn parse_fraction(option: &str, value: &str) -> Result<f64, ReportError> {
    let fraction: f64 = value
        .parse()
        .map_err(|e: std::num::ParseFloatError| invalid(option, value, e.to_string()))?;
    if !(0.0..=1.0).contains(&fraction) {
        return Err(invalid(option, value, "expected a fraction between 0 and 1"));
    }
    Ok(fraction)
}

fn parse_bool(option: &str, value: &str) -> Result<bool, ReportError> {
    match value.to_ascii_lowercase().as_str() {
        "" | "t" | "true" | "1" | "yes" => Ok(true),
        "f" | "false" | "0" | "no" => Ok(false),
        _ => Err(invalid(option, value, "expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_url_aliases() {
        let variables = Variables::from_query([
            ("f", "main"),
            ("i", "runtime"),
            ("si", "alloc_space"),
            ("pn", "ignored"),
        ]);
        assert_eq!(variables.get(FOCUS), Some("main"));
        assert_eq!(variables.get("i"), Some("runtime"));
        assert_eq!(variables.get(SAMPLE_INDEX), Some("alloc_space"));
        assert_eq!(variables.get("pn"), None);

        let options = variables.to_options().unwrap();
        assert_eq!(options.focus.unwrap().as_str(), "main");
        assert_eq!(options.sample_index, "alloc_space");
    }

    #[test]
    fn later_values_override_earlier_ones() {
        let mut variables = Variables::from_query([("nodecount", "12")]);
        variables.set(NODE_COUNT, "500").unwrap();
        variables.set(GRANULARITY, "lines").unwrap();
        let options = variables.to_options().unwrap();
        assert_eq!(options.node_count, Some(500));
        assert_eq!(options.granularity, Granularity::Lines);
    }

    #[test]
    fn uses_defaults() {
        let options = Variables::default().to_options().unwrap();
        assert_eq!(options.node_count, None);
        assert!(options.trim);
        assert!(!options.call_tree);
        assert_eq!(options.filters().count(), 0);
    }

    #[test]
    fn rejects_invalid_values() {
        let mut variables = Variables::default();
        assert!(matches!(
            variables.set("colour", "red"),
            Err(ReportError::UnknownOption(_))
        ));

        for (name, value) in [
            (NODE_COUNT, "many"),
            (NODE_FRACTION, "2"),
            (CALL_TREE, "maybe"),
            (GRANULARITY, "modules"),
        ] {
            let variables = Variables::from_query([(name, value)]);
            assert!(
                matches!(variables.to_options(), Err(ReportError::InvalidOption { .. })),
                "{name}={value} should be rejected"
            );
        }

        let variables = Variables::from_query([("f", "(")]);
        assert!(matches!(
            variables.to_options(),
            Err(ReportError::InvalidRegex(..))
        ));
    }
}
