use crate::SamplingError;
use profscope_model::Profile;

/// The primitives a capture is made of.
///
/// Implementations must be usable from several request threads at once. Only one capture runs at
/// a time, which is enforced by the caller.
pub trait ProfileSource: Send + Sync {
    /// Starts continuous CPU sampling. Sampling stops once the returned recording is stopped.
    fn start_cpu(&self) -> Result<Box<dyn CpuRecording>, SamplingError>;

    /// Takes a snapshot of the sampled live heap allocations.
    fn snapshot_heap(&self) -> Result<Profile, SamplingError>;
}

/// A running CPU sampling session.
pub trait CpuRecording {
    /// Stops sampling and decodes the accumulated samples.
    fn stop(self: Box<Self>) -> Result<Profile, SamplingError>;
}
