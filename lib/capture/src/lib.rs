//! Capture primitives used by profscope.
//!
//! CPU profiles are sampled with `pprof`'s signal based profiler ([PprofSource]). Heap profiles
//! require the [heap::ProfiledAllocator] to be registered as the global allocator and the
//! sampler to be enabled with [heap::install].

mod cpu;
mod error;
pub mod heap;
mod mappings;
mod source;

pub use cpu::PprofSource;
pub use error::SamplingError;
pub use mappings::current_mappings;
pub use source::{CpuRecording, ProfileSource};
