use crate::ReportError;
use regex::Regex;

/// The kind of output requested from the report engine.
#[derive(Debug, Clone)]
pub enum Command {
    /// A call graph, later rendered as DOT or SVG.
    Graph,
    /// A list of the hottest entries.
    Top,
    /// Annotated disassembly of the functions matching the regex.
    Disassembly(Regex),
    /// Annotated source of the functions matching the regex.
    WebList(Regex),
    /// Callers and callees of the functions matching the regex.
    Peek(Regex),
}

impl Command {
    /// Parses a command from its tokens, e.g. `["peek", "main"]`.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Self, ReportError> {
        let (name, args) = tokens.split_first().ok_or(ReportError::EmptyCommand)?;
        let name = name.as_ref();
        let symbol = || -> Result<Regex, ReportError> {
            let pattern = args
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<&str>>()
                .join(" ");
            let pattern = pattern.trim();
            if pattern.is_empty() {
                return Err(ReportError::MissingFocus(name.to_owned()));
            }
            Regex::new(pattern).map_err(|e| ReportError::InvalidRegex(pattern.to_owned(), e))
        };

        match name {
            "svg" | "dot" | "graph" => Ok(Self::Graph),
            "top" => Ok(Self::Top),
            "disasm" => Ok(Self::Disassembly(symbol()?)),
            "weblist" | "list" => Ok(Self::WebList(symbol()?)),
            "peek" => Ok(Self::Peek(symbol()?)),
            other => Err(ReportError::UnknownCommand(other.to_owned())),
        }
    }

    /// The number of nodes kept when no explicit node count is configured.
    pub fn default_node_count(&self) -> Option<usize> {
        match self {
            Self::Graph => Some(80),
            _ => None,
        }
    }

    /// The symbol regex of the listing commands.
    pub fn symbol(&self) -> Option<&Regex> {
        match self {
            Self::Disassembly(re) | Self::WebList(re) | Self::Peek(re) => Some(re),
            Self::Graph | Self::Top => None,
        }
    }
}
