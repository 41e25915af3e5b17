use clap::{Parser, Subcommand, ValueHint};
use profscope::parse_duration;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(about, version, name = "profscope")]
/// Captures CPU and heap profiles of its own process and serves them over HTTP
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the profile HTTP server
    Serve {
        /// Host and port to listen to
        #[arg(short, long, default_value = "localhost:7878", value_hint = ValueHint::Hostname)]
        bind: String,
        /// Path below which the pages are served, e.g. /debug/pprof
        #[arg(long, default_value = "")]
        prefix: String,
        /// Allows cross-origin requests
        #[arg(long)]
        cors: bool,
        /// Capture period used when a request does not give a valid one
        #[arg(long, default_value = "5s", value_parser = parse_duration)]
        default_period: Duration,
        /// Longer capture periods are clamped to this value
        #[arg(long, default_value = "60s", value_parser = parse_duration)]
        max_period: Duration,
        /// CPU sampling frequency in Hz
        #[arg(long, default_value_t = 99)]
        frequency: i32,
        /// Records one out of this many allocations in heap profiles
        #[arg(long, default_value_t = 32)]
        heap_sample_rate: u64,
        /// The objdump executable used for disassembly
        #[arg(long, default_value = "objdump", value_hint = ValueHint::CommandName)]
        objdump: PathBuf,
        /// The Graphviz dot executable used for call graphs
        #[arg(long, default_value = "dot", value_hint = ValueHint::CommandName)]
        dot: PathBuf,
        /// Number of threads generating synthetic CPU and heap load
        ///
        /// Useful to try the server without embedding it into an application.
        #[arg(long, default_value_t = 0)]
        workload: usize,
    },
}
