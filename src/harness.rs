//! Single-shot measurement of one unit of work.
//!
//! Memory is sampled from the harness's own process. For in-process
//! candidates this reflects the work being measured; for subprocess
//! candidates it only reflects the harness waiting on the child, not the
//! child's own footprint.

use std::hint::black_box;
use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Reads the resident set size of the current process.
pub struct MemorySampler {
    system: System,
    pid: Option<Pid>,
}

impl MemorySampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// Current resident memory in MB, or `None` when the platform can't report it.
    pub fn resident_mb(&mut self) -> Option<f64> {
        let pid = self.pid?;
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.system
            .process(pid)
            .map(|p| p.memory() as f64 / BYTES_PER_MB)
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct Measured {
    pub elapsed: Duration,
    /// After minus before, in MB. Not clamped: allocator release can make it negative.
    pub memory_delta_mb: Option<f64>,
    pub resident_after_mb: Option<f64>,
}

impl Measured {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Run `f` once, timing it and sampling memory on either side.
///
/// Sampling happens outside the timed window so the sampler's own cost is
/// not charged to the operation.
pub fn measure_once<T>(sampler: &mut MemorySampler, f: impl FnOnce() -> T) -> (T, Measured) {
    let before = sampler.resident_mb();

    let start = Instant::now();
    let out = black_box(f());
    let elapsed = start.elapsed();

    let after = sampler.resident_mb();
    let memory_delta_mb = match (before, after) {
        (Some(b), Some(a)) => Some(a - b),
        _ => None,
    };

    (
        out,
        Measured {
            elapsed,
            memory_delta_mb,
            resident_after_mb: after,
        },
    )
}
