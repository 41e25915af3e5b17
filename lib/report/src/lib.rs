//! The profscope reporting engine.
//!
//! A [Report] is built from a [Profile](profscope_model::Profile), a [Command] and a set of
//! [ReportOptions]. Reports can be turned into call [Graph]s, hot lists ([text_items]), DOT
//! graphs ([compose_dot]), caller/callee listings ([print_call_sites]), annotated source
//! ([print_web_list]), annotated disassembly ([print_assembly]) and flame trees
//! ([build_flame_tree]).

mod command;
mod disasm;
mod dot;
mod error;
mod flame;
mod graph;
mod html;
mod names;
mod objtool;
mod options;
mod peek;
mod report;
mod source;
mod text;

pub use command::Command;
pub use disasm::print_assembly;
pub use dot::{compose_dot, to_graph_and_config, DotConfig};
pub use error::ReportError;
pub use flame::{build_flame_tree, FlameNode};
pub use graph::{Edge, Graph, Node, NodeId, NodeInfo, TrimSummary};
pub use names::shorten_function_name;
pub use objtool::{Binutils, Instruction, ObjTool};
pub use options::{Granularity, ReportOptions, Variables};
pub use peek::print_call_sites;
pub use report::{build_report, Diagnostics, Report};
pub use source::print_web_list;
pub use text::{text_items, TextItem};

/// Maximum number of routines printed by the listing commands.
pub const MAX_LISTING_ENTRIES: usize = 50;
