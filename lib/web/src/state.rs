use crate::config::normalize_prefix;
use crate::render::Renderer;
use crate::svg::{GraphConverter, Graphviz};
use profscope::capture::CaptureController;
use profscope::reporting::{Binutils, ObjTool};
use std::sync::Arc;

/// Shared state of all handlers.
#[derive(Clone)]
pub struct AppState {
    controller: Arc<CaptureController>,
    renderer: Arc<Renderer>,
    obj_tool: Arc<dyn ObjTool>,
    graph_converter: Arc<dyn GraphConverter>,
    prefix: String,
}

impl AppState {
    /// Creates the state of a server mounted below `prefix`, using `objdump` and `dot` from the
    /// `PATH`.
    pub fn new(controller: Arc<CaptureController>, prefix: &str) -> anyhow::Result<Self> {
        Ok(Self {
            controller,
            renderer: Arc::new(Renderer::new()?),
            obj_tool: Arc::new(Binutils::default()),
            graph_converter: Arc::new(Graphviz::default()),
            prefix: normalize_prefix(prefix),
        })
    }

    #[must_use]
    pub fn with_obj_tool(mut self, obj_tool: Arc<dyn ObjTool>) -> Self {
        self.obj_tool = obj_tool;
        self
    }

    #[must_use]
    pub fn with_graph_converter(mut self, graph_converter: Arc<dyn GraphConverter>) -> Self {
        self.graph_converter = graph_converter;
        self
    }

    pub fn controller(&self) -> &CaptureController {
        &self.controller
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn obj_tool(&self) -> &dyn ObjTool {
        self.obj_tool.as_ref()
    }

    pub fn graph_converter(&self) -> &dyn GraphConverter {
        self.graph_converter.as_ref()
    }

    /// The normalized path prefix, empty when mounted at the root.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The URL of the default view.
    pub fn home(&self) -> String {
        format!("{}/", self.prefix)
    }

    /// The URL of the default view with the given raw query string.
    pub fn home_with_query(&self, query: Option<&str>) -> String {
        match query.filter(|query| !query.is_empty()) {
            Some(query) => format!("{}/?{query}", self.prefix),
            None => self.home(),
        }
    }
}
