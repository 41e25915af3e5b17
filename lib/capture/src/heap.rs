//! Sampling heap profiler.
//!
//! [ProfiledAllocator] forwards to an inner allocator and reports every allocation to the
//! process-wide [HeapProfiler] once it has been enabled with [install]. Every `sample_rate`-th
//! allocation is recorded together with its call stack; recorded values are scaled by the sample
//! rate.
//!
//! ```ignore
//! use profscope_capture::heap::{install, HeapSamplingConfig, ProfiledAllocator};
//! use std::alloc::System;
//!
//! #[global_allocator]
//! static GLOBAL: ProfiledAllocator<System> = ProfiledAllocator::new(System);
//!
//! fn main() {
//!     install(HeapSamplingConfig::default());
//! }
//! ```

use crate::{current_mappings, SamplingError};
use dashmap::DashMap;
use profscope_model::{Line, Profile, ProfileBuilder, ValueType};
use std::alloc::{GlobalAlloc, Layout};
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::ffi::c_void;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

const MAX_STACK_DEPTH: usize = 32;

/// Frames of the sampling machinery itself that are cut off the leaf end of recorded stacks.
const INTERNAL_PREFIXES: [&str; 10] = [
    "profscope_capture::heap::",
    "<profscope_capture::heap::",
    "backtrace::",
    "core::alloc::",
    "alloc::alloc::",
    "alloc::raw_vec::",
    "std::alloc::",
    "dashmap::",
    "hashbrown::",
    "__rust_",
];

#[derive(Debug, Clone, Copy)]
pub struct HeapSamplingConfig {
    /// Records one out of `sample_rate` allocations.
    pub sample_rate: u64,
    /// Allocations smaller than this are never recorded.
    pub min_alloc_bytes: usize,
    /// Upper bound for simultaneously tracked live allocations.
    pub max_tracked_allocations: usize,
}

impl Default for HeapSamplingConfig {
    fn default() -> Self {
        Self {
            sample_rate: 32,
            min_alloc_bytes: 0,
            max_tracked_allocations: 200_000,
        }
    }
}

#[derive(Clone, Copy, Hash, Eq, PartialEq)]
struct StackKey {
    len: u8,
    frames: [usize; MAX_STACK_DEPTH],
}

impl Default for StackKey {
    fn default() -> Self {
        Self {
            len: 0,
            frames: [0; MAX_STACK_DEPTH],
        }
    }
}

impl StackKey {
    fn frames(&self) -> &[usize] {
        &self.frames[..usize::from(self.len)]
    }
}

#[derive(Clone, Copy)]
struct AllocationMeta {
    stack: StackKey,
    weighted_bytes: u64,
}

#[derive(Clone, Copy, Default)]
struct StackStats {
    live_bytes: u64,
    alloc_bytes: u64,
    alloc_count: u64,
    free_count: u64,
}

/// Process-wide record of sampled allocations.
pub struct HeapProfiler {
    config: HeapSamplingConfig,
    started_at: SystemTime,
    allocation_seq: AtomicU64,
    tracked_allocations: AtomicUsize,
    dropped_allocations: AtomicU64,
    allocations: DashMap<usize, AllocationMeta>,
    stacks: DashMap<StackKey, StackStats>,
}

static PROFILER: OnceLock<HeapProfiler> = OnceLock::new();
static ALLOCATOR_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Enables heap sampling. Only the first call configures the sampler.
pub fn install(config: HeapSamplingConfig) -> &'static HeapProfiler {
    PROFILER.get_or_init(|| {
        tracing::info!(
            sample_rate = config.sample_rate,
            min_alloc_bytes = config.min_alloc_bytes,
            "heap sampling enabled"
        );
        HeapProfiler::new(config)
    })
}

/// Returns the heap sampler if it has been installed.
pub fn profiler() -> Option<&'static HeapProfiler> {
    PROFILER.get()
}

/// Snapshots the live heap of the process-wide sampler.
pub fn snapshot() -> Result<Profile, SamplingError> {
    profiler()
        .ok_or(SamplingError::HeapProfilingDisabled)?
        .snapshot()
}

impl HeapProfiler {
    fn new(config: HeapSamplingConfig) -> Self {
        Self {
            config: HeapSamplingConfig {
                sample_rate: config.sample_rate.max(1),
                ..config
            },
            started_at: SystemTime::now(),
            allocation_seq: AtomicU64::new(0),
            tracked_allocations: AtomicUsize::new(0),
            dropped_allocations: AtomicU64::new(0),
            allocations: DashMap::new(),
            stacks: DashMap::new(),
        }
    }

    pub fn config(&self) -> HeapSamplingConfig {
        self.config
    }

    /// Number of sampled allocations that were not recorded because the tracking table was full.
    pub fn dropped_allocations(&self) -> u64 {
        self.dropped_allocations.load(Ordering::Relaxed)
    }

    /// Builds a heap profile from the currently recorded allocation sites.
    ///
    /// The profile carries `alloc_objects`, `alloc_space`, `inuse_objects` and `inuse_space`
    /// values, `inuse_space` being the default.
    pub fn snapshot(&self) -> Result<Profile, SamplingError> {
        if !ALLOCATOR_ACTIVE.load(Ordering::Relaxed) {
            return Err(SamplingError::AllocatorNotInstalled);
        }
        let Some(_guard) = ReentryGuard::enter() else {
            return Err(SamplingError::Unavailable(
                "heap snapshot requested from within the allocator".to_owned(),
            ));
        };

        let rows = self
            .stacks
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .filter(|(_, stats)| stats.alloc_count > 0)
            .collect::<Vec<_>>();

        let rate = i64::try_from(self.config.sample_rate).unwrap_or(i64::MAX);
        let mut builder = ProfileBuilder::new(vec![
            ValueType::new("alloc_objects", "count"),
            ValueType::new("alloc_space", "bytes"),
            ValueType::new("inuse_objects", "count"),
            ValueType::new("inuse_space", "bytes"),
        ])
        .default_sample_type("inuse_space")
        .period(ValueType::new("space", "bytes"), rate)
        .time(
            self.started_at,
            SystemTime::now()
                .duration_since(self.started_at)
                .unwrap_or(Duration::ZERO),
        )
        .mappings(current_mappings());

        let mut symbols = HashMap::new();
        for (stack, stats) in rows {
            let mut locations = Vec::with_capacity(stack.frames().len());
            let mut in_sampler = true;
            for ip in stack.frames() {
                let frame = symbols.entry(*ip).or_insert_with(|| resolve(*ip));
                if in_sampler && frame.iter().all(|s| is_internal_symbol(&s.name)) {
                    continue;
                }
                in_sampler = false;
                let lines = frame
                    .iter()
                    .map(|symbol| Line {
                        function: builder.function(
                            symbol.name.clone(),
                            symbol.system_name.clone(),
                            symbol.filename.clone(),
                        ),
                        line: symbol.line,
                    })
                    .collect();
                locations.push(builder.location(*ip as u64, lines));
            }

            let live_objects = stats.alloc_count.saturating_sub(stats.free_count);
            builder.add_sample(
                locations,
                vec![
                    saturating_i64(stats.alloc_count).saturating_mul(rate),
                    saturating_i64(stats.alloc_bytes),
                    saturating_i64(live_objects).saturating_mul(rate),
                    saturating_i64(stats.live_bytes),
                ],
                BTreeMap::new(),
            )?;
        }

        Ok(builder.build())
    }

    fn on_alloc(&self, ptr: *mut u8, size: usize) {
        if ptr.is_null() {
            return;
        }
        let Some(_guard) = ReentryGuard::enter() else {
            return;
        };
        self.record_allocation(ptr as usize, size);
    }

    fn on_dealloc(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let Some(_guard) = ReentryGuard::enter() else {
            return;
        };
        self.remove_allocation(ptr as usize);
    }

    fn on_realloc(&self, old_ptr: *mut u8, new_ptr: *mut u8, size: usize) {
        if new_ptr.is_null() {
            return;
        }
        let Some(_guard) = ReentryGuard::enter() else {
            return;
        };
        if !old_ptr.is_null() {
            self.remove_allocation(old_ptr as usize);
        }
        self.record_allocation(new_ptr as usize, size);
    }

    fn record_allocation(&self, ptr: usize, size: usize) {
        if size < self.config.min_alloc_bytes {
            return;
        }
        let seq = self.allocation_seq.fetch_add(1, Ordering::Relaxed);
        if seq % self.config.sample_rate != 0 {
            return;
        }
        if self.tracked_allocations.load(Ordering::Relaxed) >= self.config.max_tracked_allocations
        {
            self.dropped_allocations.fetch_add(1, Ordering::Relaxed);
            return;
        }

        // The allocator may hand out an address again before we saw the free.
        self.remove_allocation(ptr);

        let stack = capture_stack();
        let weighted_bytes = (size as u64).saturating_mul(self.config.sample_rate);
        self.allocations.insert(
            ptr,
            AllocationMeta {
                stack,
                weighted_bytes,
            },
        );
        self.tracked_allocations.fetch_add(1, Ordering::Relaxed);

        let mut stats = self.stacks.entry(stack).or_default();
        stats.live_bytes = stats.live_bytes.saturating_add(weighted_bytes);
        stats.alloc_bytes = stats.alloc_bytes.saturating_add(weighted_bytes);
        stats.alloc_count = stats.alloc_count.saturating_add(1);
    }

    fn remove_allocation(&self, ptr: usize) {
        let Some((_, meta)) = self.allocations.remove(&ptr) else {
            return;
        };
        self.tracked_allocations.fetch_sub(1, Ordering::Relaxed);
        if let Some(mut stats) = self.stacks.get_mut(&meta.stack) {
            stats.live_bytes = stats.live_bytes.saturating_sub(meta.weighted_bytes);
            stats.free_count = stats.free_count.saturating_add(1);
        }
    }
}

fn capture_stack() -> StackKey {
    let mut key = StackKey::default();
    let mut index = 0_usize;
    // SAFETY: only the current thread's stack is walked and no symbolization happens here.
    #[allow(unsafe_code, reason = "Unwinding inside the allocator")]
    unsafe {
        backtrace::trace_unsynchronized(|frame| {
            let ip = frame.ip() as usize;
            if ip == 0 {
                return true;
            }
            if index >= MAX_STACK_DEPTH {
                return false;
            }
            key.frames[index] = ip;
            index += 1;
            true
        });
    }
    key.len = u8::try_from(index).unwrap_or(u8::MAX);
    key
}

struct ResolvedSymbol {
    name: String,
    system_name: String,
    filename: Option<PathBuf>,
    line: u32,
}

/// Resolves an instruction pointer to its inlined symbols, innermost first.
fn resolve(ip: usize) -> Vec<ResolvedSymbol> {
    let mut symbols = Vec::new();
    backtrace::resolve(ip as *mut c_void, |symbol| {
        let (name, system_name) = match symbol.name() {
            Some(name) => (
                format!("{name:#}"),
                String::from_utf8_lossy(name.as_bytes()).into_owned(),
            ),
            None => (format!("0x{ip:x}"), String::new()),
        };
        symbols.push(ResolvedSymbol {
            name,
            system_name,
            filename: symbol.filename().map(PathBuf::from),
            line: symbol.lineno().unwrap_or(0),
        });
    });
    if symbols.is_empty() {
        symbols.push(ResolvedSymbol {
            name: format!("0x{ip:x}"),
            system_name: String::new(),
            filename: None,
            line: 0,
        });
    }
    symbols
}

fn is_internal_symbol(symbol: &str) -> bool {
    INTERNAL_PREFIXES
        .iter()
        .any(|prefix| symbol.starts_with(prefix))
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// A global allocator that reports allocations to the heap sampler.
pub struct ProfiledAllocator<A> {
    inner: A,
}

impl<A> ProfiledAllocator<A> {
    pub const fn new(inner: A) -> Self {
        Self { inner }
    }
}

#[allow(unsafe_code, reason = "Implementing GlobalAlloc")]
unsafe impl<A: GlobalAlloc> GlobalAlloc for ProfiledAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc(layout);
        if let Some(profiler) = active_profiler() {
            profiler.on_alloc(ptr, layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc_zeroed(layout);
        if let Some(profiler) = active_profiler() {
            profiler.on_alloc(ptr, layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if let Some(profiler) = active_profiler() {
            profiler.on_dealloc(ptr);
        }
        self.inner.dealloc(ptr, layout);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = self.inner.realloc(ptr, layout, new_size);
        if let Some(profiler) = active_profiler() {
            profiler.on_realloc(ptr, new_ptr, new_size);
        }
        new_ptr
    }
}

fn active_profiler() -> Option<&'static HeapProfiler> {
    let profiler = PROFILER.get()?;
    if !ALLOCATOR_ACTIVE.load(Ordering::Relaxed) {
        ALLOCATOR_ACTIVE.store(true, Ordering::Relaxed);
    }
    Some(profiler)
}

thread_local! {
    static IN_SAMPLER: Cell<bool> = const { Cell::new(false) };
}

/// Prevents the sampler from recording its own allocations.
struct ReentryGuard;

impl ReentryGuard {
    fn enter() -> Option<Self> {
        IN_SAMPLER
            .try_with(|flag| {
                if flag.get() {
                    None
                } else {
                    flag.set(true);
                    Some(Self)
                }
            })
            .ok()
            .flatten()
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        let _ignored = IN_SAMPLER.try_with(|flag| flag.set(false));
    }
}
