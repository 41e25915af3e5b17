use crate::{current_mappings, heap, CpuRecording, ProfileSource, SamplingError};
use profscope_model::{Line, Mapping, Profile, ProfileBuilder, ValueType};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

const DEFAULT_FREQUENCY: i32 = 99;
const DEFAULT_BLOCKLIST: [&str; 4] = ["libc", "libgcc", "pthread", "vdso"];

/// A [ProfileSource] that samples the CPU with `pprof` and reads heap profiles from the
/// process-wide heap sampler.
#[derive(Debug, Clone)]
pub struct PprofSource {
    frequency: i32,
    blocklist: Vec<String>,
}

impl PprofSource {
    /// Creates a new source sampling at `frequency` Hz. Frames from shared objects whose name
    /// contains one of the `blocklist` entries are not unwound.
    pub fn new(frequency: i32, blocklist: Vec<String>) -> Self {
        Self {
            frequency,
            blocklist,
        }
    }
}

impl Default for PprofSource {
    fn default() -> Self {
        Self::new(
            DEFAULT_FREQUENCY,
            DEFAULT_BLOCKLIST.iter().map(|s| (*s).to_owned()).collect(),
        )
    }
}

impl ProfileSource for PprofSource {
    fn start_cpu(&self) -> Result<Box<dyn CpuRecording>, SamplingError> {
        let guard = pprof::ProfilerGuardBuilder::default()
            .frequency(self.frequency)
            .blocklist(&self.blocklist)
            .build()
            .map_err(SamplingError::Start)?;
        Ok(Box::new(PprofRecording { guard }))
    }

    fn snapshot_heap(&self) -> Result<Profile, SamplingError> {
        heap::snapshot()
    }
}

struct PprofRecording {
    guard: pprof::ProfilerGuard<'static>,
}

impl CpuRecording for PprofRecording {
    fn stop(self: Box<Self>) -> Result<Profile, SamplingError> {
        let report = self
            .guard
            .report()
            .build()
            .map_err(|e| SamplingError::Decode(e.to_string()))?;
        drop(self.guard);
        decode_report(&report)
    }
}

fn decode_report(report: &pprof::Report) -> Result<Profile, SamplingError> {
    let stacks = report.data.iter().map(|(frames, count)| RawStack {
        thread: frames.thread_name_or_id(),
        count: *count,
        frames: frames
            .frames
            .iter()
            .map(|symbols| {
                symbols
                    .iter()
                    .map(|symbol| RawSymbol {
                        name: symbol.name(),
                        system_name: symbol.sys_name().into_owned(),
                        filename: symbol.filename.clone(),
                        line: symbol.lineno(),
                    })
                    .collect()
            })
            .collect(),
    });
    decode_stacks(
        stacks,
        report.timing.frequency,
        report.timing.start_time,
        report.timing.duration,
        current_mappings(),
    )
}

struct RawSymbol {
    name: String,
    system_name: String,
    filename: Option<PathBuf>,
    line: u32,
}

struct RawStack {
    thread: String,
    count: isize,
    /// Leaf first, each frame lists its inlined symbols innermost first.
    frames: Vec<Vec<RawSymbol>>,
}

fn decode_stacks(
    stacks: impl Iterator<Item = RawStack>,
    frequency: i32,
    start: SystemTime,
    duration: Duration,
    mappings: Vec<Mapping>,
) -> Result<Profile, SamplingError> {
    if frequency <= 0 {
        return Err(SamplingError::Decode(format!(
            "invalid sampling frequency {frequency}"
        )));
    }
    let period = 1_000_000_000 / i64::from(frequency);

    let mut builder = ProfileBuilder::new(vec![
        ValueType::new("samples", "count"),
        ValueType::new("cpu", "nanoseconds"),
    ])
    .period(ValueType::new("cpu", "nanoseconds"), period)
    .time(start, duration)
    .mappings(mappings);

    for stack in stacks {
        let count = i64::try_from(stack.count)
            .map_err(|_| SamplingError::Decode(format!("invalid sample count {}", stack.count)))?;
        let mut locations = Vec::with_capacity(stack.frames.len());
        for frame in stack.frames {
            if frame.is_empty() {
                continue;
            }
            let lines = frame
                .into_iter()
                .map(|symbol| Line {
                    function: builder.function(symbol.name, symbol.system_name, symbol.filename),
                    line: symbol.line,
                })
                .collect();
            // pprof only keeps the entry address of the enclosing symbol, not the sampled pc.
            locations.push(builder.location(0, lines));
        }

        let labels = BTreeMap::from([("thread".to_owned(), stack.thread)]);
        builder.add_sample(locations, vec![count, count * period], labels)?;
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(name: &str, line: u32) -> RawSymbol {
        RawSymbol {
            name: name.to_owned(),
            system_name: format!("_ZN{name}"),
            filename: Some(PathBuf::from("src/main.rs")),
            line,
        }
    }

    #[test]
    fn decodes_stacks_into_a_cpu_profile() {
        let stacks = vec![
            RawStack {
                thread: "main".to_owned(),
                count: 3,
                frames: vec![
                    vec![symbol("app::leaf", 10), symbol("app::inlined_into", 20)],
                    vec![symbol("app::main", 30)],
                ],
            },
            RawStack {
                thread: "worker".to_owned(),
                count: 1,
                frames: vec![vec![symbol("app::main", 30)]],
            },
        ];

        let profile = decode_stacks(
            stacks.into_iter(),
            100,
            SystemTime::UNIX_EPOCH,
            Duration::from_secs(1),
            Vec::new(),
        )
        .unwrap();

        assert_eq!(profile.period, 10_000_000);
        assert_eq!(profile.samples.len(), 2);
        assert_eq!(profile.functions.len(), 3);
        assert_eq!(profile.locations.len(), 2);
        assert_eq!(profile.samples[0].values, vec![3, 30_000_000]);
        assert_eq!(profile.total(1), 40_000_000);

        let leaf = profile.location(profile.samples[0].locations[0]);
        assert_eq!(leaf.lines.len(), 2);
        assert_eq!(profile.function(leaf.lines[0].function).name, "app::leaf");
        assert_eq!(profile.samples[1].labels["thread"], "worker");
    }

    #[test]
    fn rejects_invalid_frequency() {
        let result = decode_stacks(
            std::iter::empty(),
            0,
            SystemTime::UNIX_EPOCH,
            Duration::ZERO,
            Vec::new(),
        );
        assert!(matches!(result, Err(SamplingError::Decode(_))));
    }
}
