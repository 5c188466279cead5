//! The five-axis resource limit tuple and its persisted string encoding.

use serde::{Deserialize, Serialize};

/// Resource quotas for a task or user. A value of `0` means "unbounded on
/// that axis". GPU, GPU memory and storage are bookkeeping-only quotas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub cpu: i64,
    pub gpu: i64,
    pub memory: i64,
    pub gpumemory: i64,
    pub storage: i64,
}

impl Limits {
    pub fn new(cpu: i64, gpu: i64, memory: i64, gpumemory: i64, storage: i64) -> Self {
        Limits {
            cpu,
            gpu,
            memory,
            gpumemory,
            storage,
        }
    }

    /// Parses the persisted form: five decimal integers joined by LF in the
    /// order cpu, gpu, memory, gpumemory, storage. Missing trailing lines
    /// are treated as `0`; malformed lines parse as `0` as well.
    pub fn parse(raw: &str) -> Self {
        let mut fields = raw.split('\n').map(|line| line.trim().parse().unwrap_or(0));
        Limits {
            cpu: fields.next().unwrap_or(0),
            gpu: fields.next().unwrap_or(0),
            memory: fields.next().unwrap_or(0),
            gpumemory: fields.next().unwrap_or(0),
            storage: fields.next().unwrap_or(0),
        }
    }

    /// The persisted (and wire) form of the tuple.
    pub fn encode(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}\n{}",
            self.cpu, self.gpu, self.memory, self.gpumemory, self.storage
        )
    }
}

/// Ordering for the per-axis minimum where `0` means "no constraint": zero
/// loses to any positive value, so `first` sorts below `second` only when it
/// is a real (non-zero) bound that is tighter.
fn limit_compare(first: i64, second: i64) -> bool {
    if first == 0 {
        false
    } else {
        second == 0 || first < second
    }
}

fn minimal_axis(task: i64, user: i64, default: i64) -> i64 {
    let mut smallest = task;
    for candidate in [user, default] {
        if limit_compare(candidate, smallest) {
            smallest = candidate;
        }
    }
    smallest
}

/// Per-axis minimum across the task request, the owner's limits and the
/// configured defaults, treating `0` as +∞ (all three zero yields `0`).
pub fn minimal_limits(task: Limits, user: Limits, default: Limits) -> Limits {
    Limits {
        cpu: minimal_axis(task.cpu, user.cpu, default.cpu),
        gpu: minimal_axis(task.gpu, user.gpu, default.gpu),
        memory: minimal_axis(task.memory, user.memory, default.memory),
        gpumemory: minimal_axis(task.gpumemory, user.gpumemory, default.gpumemory),
        storage: minimal_axis(task.storage, user.storage, default.storage),
    }
}

/// Parses a memory-style literal: `K`, `M` and `G` suffixes scale by powers
/// of 1024, anything else must be a plain decimal integer.
pub fn convert_memory(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let (digits, multiplier) = match trimmed.strip_suffix(['K', 'k']) {
        Some(rest) => (rest, 1024),
        None => match trimmed.strip_suffix(['M', 'm']) {
            Some(rest) => (rest, 1024 * 1024),
            None => match trimmed.strip_suffix(['G', 'g']) {
                Some(rest) => (rest, 1024 * 1024 * 1024),
                None => (trimmed, 1),
            },
        },
    };
    digits.trim().parse::<i64>().ok().map(|v| v * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pads_missing_fields_with_zero() {
        assert_eq!(Limits::parse("1\n2"), Limits::new(1, 2, 0, 0, 0));
        assert_eq!(Limits::parse(""), Limits::default());
    }

    #[test]
    fn encode_parse_roundtrip() {
        let limits = Limits::new(4, 0, 1 << 30, 0, 512);
        assert_eq!(Limits::parse(&limits.encode()), limits);
    }

    #[test]
    fn minimal_limits_prefers_the_tightest_real_bound() {
        let task = Limits::new(4, 0, 0, 0, 0);
        let user = Limits::new(2, 0, 1024, 0, 0);
        let default = Limits::new(0, 0, 2048, 0, 100);
        let min = minimal_limits(task, user, default);
        assert_eq!(min, Limits::new(2, 0, 1024, 0, 100));
    }

    #[test]
    fn minimal_limits_keeps_zero_when_every_source_is_unbounded() {
        let min = minimal_limits(Limits::default(), Limits::default(), Limits::default());
        assert_eq!(min, Limits::default());
    }

    #[test]
    fn minimal_limits_is_monotonic_in_the_task_request() {
        let user = Limits::new(8, 0, 0, 0, 0);
        let default = Limits::default();
        let mut last = 0;
        for cpu in 1..=8 {
            let min = minimal_limits(Limits::new(cpu, 0, 0, 0, 0), user, default);
            assert!(min.cpu >= last);
            last = min.cpu;
        }
    }

    #[test]
    fn convert_memory_scales_suffixes() {
        assert_eq!(convert_memory("512"), Some(512));
        assert_eq!(convert_memory("2K"), Some(2048));
        assert_eq!(convert_memory("3M"), Some(3 * 1024 * 1024));
        assert_eq!(convert_memory("1G"), Some(1 << 30));
        assert_eq!(convert_memory("junk"), None);
    }
}
