use profscope_model::ModelError;

/// An error raised by one of the capture primitives.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SamplingError {
    #[error("failed to start cpu sampling: {0}")]
    Start(#[source] pprof::Error),
    #[error("failed to decode cpu samples: {0}")]
    Decode(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("heap profiling is not enabled")]
    HeapProfilingDisabled,
    #[error("heap profiling is enabled but the profiled allocator is not the global allocator")]
    AllocatorNotInstalled,
    #[error("{0}")]
    Unavailable(String),
}
