//! Load monitoring and insertion batch sizing.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use sysinfo::{System, MINIMUM_CPU_UPDATE_INTERVAL};

/// Instantaneous machine load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSample {
    /// Global CPU utilization, 0 to 100
    pub cpu_percent: f32,
    /// Memory available to new allocations
    pub available_memory_mb: u64,
}

/// Source of load samples.
pub trait LoadProbe: Send + Sync + Debug {
    /// Take a sample. May block for a short, bounded time.
    fn sample(&self) -> LoadSample;
}

#[derive(Debug)]
struct ProbeState {
    system: System,
    last_cpu_refresh: Instant,
}

/// Samples the host through `sysinfo`.
///
/// CPU usage is a delta between two refreshes. When the previous refresh is
/// older than the minimum update interval a single refresh is enough; otherwise
/// the probe sleeps for that interval (~200ms) first.
#[derive(Debug)]
pub struct SystemLoadProbe {
    state: Mutex<ProbeState>,
}

impl SystemLoadProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            state: Mutex::new(ProbeState {
                system,
                last_cpu_refresh: Instant::now(),
            }),
        }
    }
}

impl Default for SystemLoadProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadProbe for SystemLoadProbe {
    fn sample(&self) -> LoadSample {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let since_last = state.last_cpu_refresh.elapsed();
        if since_last < MINIMUM_CPU_UPDATE_INTERVAL {
            std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL - since_last);
        }
        state.system.refresh_cpu_usage();
        state.system.refresh_memory();
        state.last_cpu_refresh = Instant::now();

        LoadSample {
            cpu_percent: state.system.global_cpu_usage(),
            available_memory_mb: state.system.available_memory() / (1024 * 1024),
        }
    }
}

/// Staircase batch size policy.
///
/// - CPU < 50% and more than 1000 MB available: `max_size`
/// - CPU < 75% and more than 500 MB available: `max(max_size / 2, min_size)`
/// - otherwise: `min_size`
///
/// The result always lies in `[min_size, max(min_size, max_size)]`.
pub fn batch_size_for(sample: LoadSample, max_size: usize, min_size: usize) -> usize {
    let max_size = max_size.max(min_size);

    if sample.cpu_percent < 50.0 && sample.available_memory_mb > 1000 {
        max_size
    } else if sample.cpu_percent < 75.0 && sample.available_memory_mb > 500 {
        (max_size / 2).max(min_size)
    } else {
        min_size
    }
}

/// Picks the insertion batch size from current load.
#[derive(Debug, Clone)]
pub struct BatchSizer {
    probe: Arc<dyn LoadProbe>,
}

impl BatchSizer {
    pub fn new(probe: Arc<dyn LoadProbe>) -> Self {
        Self { probe }
    }

    /// Sample the probe and apply [`batch_size_for`]. Blocking.
    pub fn next_batch_size(&self, max_size: usize, min_size: usize) -> usize {
        let sample = self.probe.sample();
        let size = batch_size_for(sample, max_size, min_size);
        tracing::debug!(
            "Load sample cpu={:.1}% available={}MB -> batch size {}",
            sample.cpu_percent,
            sample.available_memory_mb,
            size
        );
        size
    }

    /// [`Self::next_batch_size`] on the blocking thread pool.
    pub async fn next_batch_size_async(&self, max_size: usize, min_size: usize) -> usize {
        let sizer = self.clone();
        match tokio::task::spawn_blocking(move || sizer.next_batch_size(max_size, min_size)).await
        {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!("Load sampling failed ({}), using minimum batch size", e);
                min_size
            }
        }
    }
}

/// Probe returning a fixed sample.
#[derive(Debug, Clone, Copy)]
pub struct FixedLoadProbe(pub LoadSample);

impl LoadProbe for FixedLoadProbe {
    fn sample(&self) -> LoadSample {
        self.0
    }
}
