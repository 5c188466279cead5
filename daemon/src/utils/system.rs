//! Host capacity lookup and the weight model used by admission control.

use std::sync::OnceLock;

use sysinfo::{MemoryRefreshKind, RefreshKind, System};

/// Host CPU and memory totals. Detected once for the daemon, injected
/// explicitly wherever the weight math has to be reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostResources {
    /// Number of logical CPUs.
    pub cpu: i64,
    /// Total physical memory in bytes.
    pub memory: i64,
}

static DETECTED: OnceLock<HostResources> = OnceLock::new();

impl HostResources {
    /// Reads the host totals, caching the result for the process lifetime.
    pub fn detect() -> Self {
        *DETECTED.get_or_init(|| {
            let system = System::new_with_specifics(
                RefreshKind::new().with_memory(MemoryRefreshKind::new().with_ram()),
            );
            HostResources {
                cpu: num_cpus::get() as i64,
                memory: system.total_memory() as i64,
            }
        })
    }

    /// Share of the host CPUs a limit represents, in `[0, 1]`. Zero and
    /// anything at or above the host total clamp to `1.0`.
    pub fn cpu_weight(&self, cpu: i64) -> f64 {
        if cpu > 0 && cpu < self.cpu {
            cpu as f64 / self.cpu as f64
        } else {
            1.0
        }
    }

    /// Share of the host memory a limit represents, same clamping rules as
    /// [`cpu_weight`](Self::cpu_weight).
    pub fn memory_weight(&self, memory: i64) -> f64 {
        if memory > 0 && memory < self.memory {
            memory as f64 / self.memory as f64
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: i64 = 1024 * 1024 * 1024;

    fn host() -> HostResources {
        HostResources {
            cpu: 4,
            memory: 8 * GIB,
        }
    }

    #[test]
    fn cpu_weight_is_proportional_below_host_total() {
        assert_eq!(host().cpu_weight(1), 0.25);
        assert_eq!(host().cpu_weight(2), 0.5);
        assert_eq!(host().cpu_weight(3), 0.75);
    }

    #[test]
    fn cpu_weight_clamps_at_zero_and_host_total() {
        assert_eq!(host().cpu_weight(0), 1.0);
        assert_eq!(host().cpu_weight(4), 1.0);
        assert_eq!(host().cpu_weight(64), 1.0);
    }

    #[test]
    fn memory_weight_is_monotonic_over_the_meaningful_range() {
        let host = host();
        let mut last = 0.0;
        for gib in 1..8 {
            let weight = host.memory_weight(gib * GIB);
            assert!(weight > last);
            last = weight;
        }
    }

    #[test]
    fn detect_returns_positive_totals() {
        let host = HostResources::detect();
        assert!(host.cpu > 0);
        assert!(host.memory > 0);
    }
}
