//! Page templates.

use crate::error::ProfScopeServerError;
use minijinja::Environment;
use profscope::reporting::{FlameNode, TextItem};
use serde::Serialize;

const TEMPLATES: [(&str, &str); 6] = [
    ("base.html", include_str!("../templates/base.html")),
    ("graph.html", include_str!("../templates/graph.html")),
    ("top.html", include_str!("../templates/top.html")),
    ("plaintext.html", include_str!("../templates/plaintext.html")),
    (
        "sourcelisting.html",
        include_str!("../templates/sourcelisting.html"),
    ),
    ("flamegraph.html", include_str!("../templates/flamegraph.html")),
];

/// The view specific part of a page.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ViewBody {
    Graph { svg: String },
    Top { items: Vec<TextItem> },
    Text { text: String },
    Html { html: String },
    Flame { flame: FlameNode },
}

/// Everything a page template can refer to.
#[derive(Debug, Serialize)]
pub struct PageModel {
    pub title: String,
    /// Non-fatal problems found while building the report.
    pub errors: Vec<String>,
    pub total: String,
    pub legend: Vec<String>,
    pub profile_names: Vec<String>,
    pub active_profile: String,
    pub sample_types: Vec<String>,
    /// The sample type the report was built for.
    pub sample_index: String,
    pub nodes: Vec<String>,
    /// The path prefix of all links.
    pub path: String,
    pub body: ViewBody,
}

pub struct Renderer {
    environment: Environment<'static>,
}

impl Renderer {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut environment = Environment::new();
        for (name, source) in TEMPLATES {
            environment.add_template(name, source)?;
        }
        Ok(Self { environment })
    }

    pub fn render(&self, template: &str, page: &PageModel) -> Result<String, ProfScopeServerError> {
        Ok(self.environment.get_template(template)?.render(page)?)
    }
}

/// Builds the page title from the `File:` and `Type:` legend labels.
pub fn page_title(legend: &[String]) -> String {
    let label = |prefix: &str| {
        legend
            .iter()
            .find_map(|label| label.strip_prefix(prefix))
            .map_or("unknown", str::trim)
    };
    format!("{} {}", label("File:"), label("Type:"))
}
