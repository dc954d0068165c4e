// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! ResourceMonitor: samples CPU and memory to advise the BatchEngine's
//! target concurrency.

use std::time::{Duration, Instant};

use sysinfo::System;

/// A point-in-time read of system load, per §4.8.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSnapshot {
    pub cpu_percent: f64,
    pub free_memory_mb: u64,
    pub total_memory_mb: u64,
}

/// Wraps a `sysinfo::System`, refreshed on each [`ResourceMonitor::sample`]
/// call. Not a background thread of its own — the BatchEngine main loop
/// drives sampling from its own tick.
pub struct ResourceMonitor {
    system: System,
    last_sampled: Option<Instant>,
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceMonitor {
    pub fn new() -> Self {
        Self {
            system: System::new_all(),
            last_sampled: None,
        }
    }

    /// Minimum spacing between real refreshes; callers ticking faster than
    /// this get the previous snapshot's numbers recomputed cheaply rather
    /// than re-querying the OS every 100 ms.
    pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

    pub fn should_resample(&self) -> bool {
        match self.last_sampled {
            Some(t) => t.elapsed() >= Self::SAMPLE_INTERVAL,
            None => true,
        }
    }

    pub fn sample(&mut self) -> ResourceSnapshot {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();
        self.last_sampled = Some(Instant::now());

        let cores = self.system.cpus().len().max(1);
        let load_avg = System::load_average().one;
        let cpu_percent = (load_avg / cores as f64) * 100.0;

        let total_memory_mb = self.system.total_memory() / (1024 * 1024);
        let free_memory_mb = self.system.available_memory() / (1024 * 1024);

        ResourceSnapshot {
            cpu_percent,
            free_memory_mb,
            total_memory_mb,
        }
    }

    pub fn cores(&self) -> usize {
        self.system.cpus().len().max(1)
    }

    /// Advises a new target concurrency given `current_max` and the
    /// per-worker memory budget, per §4.8's four-branch rule.
    pub fn advise(&self, snapshot: &ResourceSnapshot, current_max: usize, worker_memory_limit_mb: u64) -> usize {
        let cores = self.cores();

        let mut target = if snapshot.cpu_percent > 90.0 {
            ((current_max as f64) * 0.5).floor() as usize
        } else if snapshot.cpu_percent > 70.0 {
            ((current_max as f64) * 0.75).floor() as usize
        } else if snapshot.cpu_percent < 30.0 {
            (current_max + 2).min(cores * 2)
        } else {
            current_max
        };
        target = target.max(1);

        let memory_cap = if worker_memory_limit_mb == 0 {
            target
        } else {
            ((snapshot.free_memory_mb / worker_memory_limit_mb) as usize).max(1)
        };

        target.min(memory_cap).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(cpu_percent: f64, free_memory_mb: u64) -> ResourceSnapshot {
        ResourceSnapshot { cpu_percent, free_memory_mb, total_memory_mb: free_memory_mb * 2 }
    }

    #[test]
    fn test_advise_high_cpu_halves_target() {
        let monitor = ResourceMonitor::new();
        let snap = snapshot(95.0, 1_000_000);
        let target = monitor.advise(&snap, 8, 512);
        assert_eq!(target, 4);
    }

    #[test]
    fn test_advise_moderate_cpu_scales_down_75_percent() {
        let monitor = ResourceMonitor::new();
        let snap = snapshot(75.0, 1_000_000);
        let target = monitor.advise(&snap, 8, 512);
        assert_eq!(target, 6);
    }

    #[test]
    fn test_advise_low_cpu_grows_bounded_by_cores() {
        let monitor = ResourceMonitor::new();
        let snap = snapshot(10.0, 1_000_000);
        let target = monitor.advise(&snap, 4, 512);
        assert!(target <= monitor.cores() * 2);
        assert!(target >= 4);
    }

    #[test]
    fn test_advise_memory_clamp_floors_to_one() {
        let monitor = ResourceMonitor::new();
        let snap = snapshot(50.0, 100);
        let target = monitor.advise(&snap, 8, 512);
        assert_eq!(target, 1);
    }

    #[test]
    fn test_should_resample_initially_true() {
        let monitor = ResourceMonitor::new();
        assert!(monitor.should_resample());
    }
}
