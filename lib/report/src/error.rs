use profscope_model::ModelError;

/// An error that prevents a report from being generated.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ReportError {
    #[error("no command given")]
    EmptyCommand,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("missing focus target for '{0}'")]
    MissingFocus(String),
    #[error("unknown option '{0}'")]
    UnknownOption(String),
    #[error("invalid value '{value}' for option '{option}': {reason}")]
    InvalidOption {
        option: String,
        value: String,
        reason: String,
    },
    #[error("invalid regexp '{0}': {1}")]
    InvalidRegex(String, #[source] regex::Error),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("no matches found for regexp: {0}")]
    NoMatches(String),
    #[error("{0}")]
    ObjTool(String),
    #[error("cannot write report: {0}")]
    Format(#[from] std::fmt::Error),
}
