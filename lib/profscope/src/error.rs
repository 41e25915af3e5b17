use profscope_capture::SamplingError;

/// An error raised while capturing a profile.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Another capture is running. Captures are never queued.
    #[error("capture already in progress")]
    InProgress,
    /// The sampler failed to start, stop or decode the profile.
    #[error(transparent)]
    Sampling(#[from] SamplingError),
}
