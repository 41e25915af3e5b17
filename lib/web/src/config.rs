use profscope::config::CaptureConfig;
use std::path::PathBuf;

/// Holds the configuration for a profscope web server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The IP address or DNS name that the socket binds to.
    pub bind: String,
    /// The path below which all pages are served, e.g. `/debug/pprof`.
    pub prefix: String,
    /// Whether CORS is enabled.
    pub cors: bool,
    /// Settings for captures of the serving process.
    pub capture: CaptureConfig,
    /// The objdump executable used by the disassembly view.
    pub objdump: PathBuf,
    /// The Graphviz executable used by the graph view.
    pub dot: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "localhost:7878".to_owned(),
            prefix: String::new(),
            cors: false,
            capture: CaptureConfig::default(),
            objdump: PathBuf::from("objdump"),
            dot: PathBuf::from("dot"),
        }
    }
}

/// Brings a path prefix into the form `/a/b`. The root prefix is empty.
pub(crate) fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_prefixes() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix("debug/pprof/"), "/debug/pprof");
        assert_eq!(normalize_prefix("/pprof"), "/pprof");
    }
}
