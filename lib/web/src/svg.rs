//! Conversion of DOT graphs into SVG images.

use crate::error::ProfScopeServerError;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

const DOT_UNAVAILABLE: &str = "Could not execute dot; may need to install graphviz.";

/// Renders a graph in the DOT language as an SVG image.
pub trait GraphConverter: Send + Sync {
    fn to_svg(&self, dot: &str) -> Result<String, ProfScopeServerError>;
}

/// Runs the Graphviz `dot` executable.
#[derive(Debug, Clone)]
pub struct Graphviz {
    executable: PathBuf,
}

impl Graphviz {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl Default for Graphviz {
    fn default() -> Self {
        Self::new("dot")
    }
}

impl GraphConverter for Graphviz {
    fn to_svg(&self, dot: &str) -> Result<String, ProfScopeServerError> {
        let unavailable = || ProfScopeServerError::NotImplemented(DOT_UNAVAILABLE.to_owned());

        let mut child = Command::new(&self.executable)
            .arg("-Tsvg")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| {
                tracing::warn!("Cannot run {}: {error}", self.executable.display());
                unavailable()
            })?;
        let mut stdin = child.stdin.take().ok_or_else(unavailable)?;

        // stdin is written concurrently so that dot never blocks on a full stdout pipe.
        let output = std::thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(dot.as_bytes()));
            let output = child.wait_with_output();
            match writer.join() {
                Ok(Err(error)) => tracing::warn!("Cannot write graph to dot: {error}"),
                Err(_) => tracing::warn!("Graph writer panicked"),
                Ok(Ok(())) => {}
            }
            output
        })
        .map_err(|error| {
            tracing::warn!("Cannot wait for dot: {error}");
            unavailable()
        })?;

        if !output.status.success() {
            tracing::warn!(
                "dot exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(unavailable());
        }
        Ok(strip_prolog(&String::from_utf8_lossy(&output.stdout)).to_owned())
    }
}

/// Removes the XML declaration and doctype in front of the `<svg>` element so that the image
/// can be embedded in a page.
fn strip_prolog(svg: &str) -> &str {
    svg.find("<svg").map_or(svg, |start| &svg[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_the_prolog() {
        let svg = "<?xml version=\"1.0\"?>\n<!DOCTYPE svg>\n<svg width=\"1\"></svg>\n";
        assert_eq!(strip_prolog(svg), "<svg width=\"1\"></svg>\n");
        assert_eq!(strip_prolog("not an image"), "not an image");
    }

    #[test]
    fn reports_missing_executables() {
        let converter = Graphviz::new("/nonexistent/profscope-dot");
        let error = converter.to_svg("digraph {}").unwrap_err();
        assert!(matches!(error, ProfScopeServerError::NotImplemented(_)));
        assert_eq!(error.to_string(), format!("Not implemented: {DOT_UNAVAILABLE}"));
    }
}
