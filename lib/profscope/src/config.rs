use profscope_capture::PprofSource;
use std::time::Duration;

/// Settings of the [CaptureController](crate::capture::CaptureController).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Used when a request does not specify a valid period and for captures triggered by views.
    pub default_period: Duration,
    /// Longer periods are clamped to this value.
    pub max_period: Duration,
    /// CPU sampling frequency in Hz.
    pub cpu_frequency: i32,
    /// Shared objects whose frames are not unwound.
    pub blocklist: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            default_period: Duration::from_secs(5),
            max_period: Duration::from_secs(60),
            cpu_frequency: 99,
            blocklist: ["libc", "libgcc", "pthread", "vdso"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

impl CaptureConfig {
    /// A sampler configured with the frequency and blocklist of this configuration.
    pub fn pprof_source(&self) -> PprofSource {
        PprofSource::new(self.cpu_frequency, self.blocklist.clone())
    }
}
