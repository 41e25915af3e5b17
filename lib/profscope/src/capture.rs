use crate::cache::ProfileCache;
use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::parse_duration;
use chrono::{DateTime, Local};
use profscope_capture::ProfileSource;
use profscope_model::Profile;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The kind of profile to capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CaptureKind {
    #[default]
    Cpu,
    Heap,
}

impl CaptureKind {
    /// Parses the kind of a request. Anything but `heap` selects a CPU profile.
    pub fn from_query(kind: Option<&str>) -> Self {
        match kind {
            Some("heap") => Self::Heap,
            _ => Self::Cpu,
        }
    }
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Heap => f.write_str("heap"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub kind: CaptureKind,
    /// How long CPU samples are collected. Heap snapshots are taken immediately.
    pub period: Duration,
}

/// A profile that was just captured and inserted into the cache.
#[derive(Debug, Clone)]
pub struct CapturedProfile {
    pub name: String,
    pub profile: Arc<Profile>,
}

/// Derives the cache name of a profile, e.g. `2024-05-01T10:00:00-5Seconds-cpu`.
pub fn profile_name(kind: CaptureKind, period: Duration, time: DateTime<Local>) -> String {
    format!(
        "{}-{:.0}Seconds-{kind}",
        time.format("%Y-%m-%dT%H:%M:%S"),
        period.as_secs_f64()
    )
}

/// Captures profiles of the current process, one at a time.
pub struct CaptureController {
    cache: Arc<ProfileCache>,
    source: Arc<dyn ProfileSource>,
    config: CaptureConfig,
}

impl CaptureController {
    pub fn new(
        cache: Arc<ProfileCache>,
        source: Arc<dyn ProfileSource>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            cache,
            source,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<ProfileCache> {
        &self.cache
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Builds a request from the raw `pt` (kind) and `sd` (period) query values.
    ///
    /// Missing, malformed or non-positive periods fall back to the default period, periods above
    /// the maximum are clamped.
    pub fn request(&self, kind: Option<&str>, period: Option<&str>) -> CaptureRequest {
        let period = match period.map(parse_duration) {
            Some(Ok(period)) if !period.is_zero() => period.min(self.config.max_period),
            Some(Err(error)) => {
                tracing::debug!("{error}, using the default period");
                self.config.default_period
            }
            _ => self.config.default_period,
        };
        CaptureRequest {
            kind: CaptureKind::from_query(kind),
            period,
        }
    }

    /// Captures a profile and inserts it into the cache.
    ///
    /// CPU captures block the calling thread for the requested period. Fails immediately if
    /// another capture is running.
    pub fn capture(&self, request: &CaptureRequest) -> Result<CapturedProfile, CaptureError> {
        let Some(_guard) = self.cache.try_begin_capture() else {
            tracing::warn!("Rejecting {} capture, capture already in progress", request.kind);
            return Err(CaptureError::InProgress);
        };

        tracing::info!(
            "Starting {} capture ({}s)",
            request.kind,
            request.period.as_secs_f64()
        );
        let profile = self.record(request).inspect_err(|error| {
            tracing::warn!("{} capture failed: {error}", request.kind);
        })?;

        let name = profile_name(request.kind, request.period, Local::now());
        let profile = Arc::new(profile);
        self.cache.insert(name.clone(), Arc::clone(&profile));
        tracing::info!(
            "Captured profile {name} with {} samples",
            profile.samples.len()
        );
        Ok(CapturedProfile { name, profile })
    }

    fn record(&self, request: &CaptureRequest) -> Result<Profile, CaptureError> {
        match request.kind {
            CaptureKind::Cpu => {
                let recording = self.source.start_cpu()?;
                std::thread::sleep(request.period);
                Ok(recording.stop()?)
            }
            CaptureKind::Heap => Ok(self.source.snapshot_heap()?),
        }
    }

    /// Finds the profile a view should show: the named profile if it is cached, else the most
    /// recent profile, else a fresh CPU profile over the default period.
    pub fn resolve(&self, name: Option<&str>) -> Result<CapturedProfile, CaptureError> {
        if let Some(name) = name.filter(|name| !name.is_empty()) {
            if let Some(profile) = self.cache.lookup(name) {
                return Ok(CapturedProfile {
                    name: name.to_owned(),
                    profile,
                });
            }
            tracing::debug!("Profile {name} is not cached");
        }
        if let Some((name, profile)) = self.cache.most_recent() {
            return Ok(CapturedProfile { name, profile });
        }
        self.capture(&CaptureRequest {
            kind: CaptureKind::Cpu,
            period: self.config.default_period,
        })
    }
}

impl fmt::Debug for CaptureController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureController")
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn names_profiles_by_time_period_and_kind() {
        let time = Local.with_ymd_and_hms(2024, 5, 1, 9, 3, 7).unwrap();
        assert_eq!(
            profile_name(CaptureKind::Cpu, Duration::from_secs(5), time),
            "2024-05-01T09:03:07-5Seconds-cpu"
        );
        assert_eq!(
            profile_name(CaptureKind::Heap, Duration::from_millis(200), time),
            "2024-05-01T09:03:07-0Seconds-heap"
        );
    }

    #[test]
    fn later_names_sort_first() {
        let earlier = Local.with_ymd_and_hms(2024, 5, 1, 9, 59, 59).unwrap();
        let later = Local.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let period = Duration::from_secs(30);
        assert!(
            profile_name(CaptureKind::Cpu, period, later)
                > profile_name(CaptureKind::Heap, period, earlier)
        );
    }

    #[test]
    fn parses_kinds() {
        assert_eq!(CaptureKind::from_query(Some("heap")), CaptureKind::Heap);
        assert_eq!(CaptureKind::from_query(Some("cpu")), CaptureKind::Cpu);
        assert_eq!(CaptureKind::from_query(Some("goroutine")), CaptureKind::Cpu);
        assert_eq!(CaptureKind::from_query(None), CaptureKind::Cpu);
    }
}
