//! Per-task control group. One group per task id, living under the cpu and
//! memory controllers. Everything here is best-effort from the caller's
//! point of view: an unprivileged daemon logs the failure and keeps going.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::models::limits::Limits;
use crate::utils::system::HostResources;

const CG_FS_PATH: &str = "/sys/fs/cgroup";
const CG_CPU_QUOTA: &str = "cpu.cfs_quota_us";
const CG_CPU_PERIOD: &str = "cpu.cfs_period_us";
const CG_MEMORY_LIMIT: &str = "memory.limit_in_bytes";
const CG_PROC_FILE: &str = "cgroup.procs";

/// CPU quota period. Quotas are written against this period and scaled by
/// the host CPU count when read back.
pub const CPU_PERIOD_US: i64 = 1000;

pub struct ControlGroup {
    name: String,
    base: PathBuf,
}

impl ControlGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_base(CG_FS_PATH, name)
    }

    /// Base-path override for tests.
    pub fn with_base(base: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        ControlGroup {
            name: name.into(),
            base: base.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn cpu_path(&self) -> PathBuf {
        self.base.join("cpu").join(&self.name)
    }

    fn memory_path(&self) -> PathBuf {
        self.base.join("memory").join(&self.name)
    }

    fn controller_paths(&self) -> [PathBuf; 2] {
        [self.cpu_path(), self.memory_path()]
    }

    /// Creates the group directories under both controllers.
    pub fn create(&self) -> io::Result<()> {
        for path in self.controller_paths() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Removes the (empty) group directories.
    pub fn remove(&self) -> io::Result<()> {
        for path in self.controller_paths() {
            fs::remove_dir(path)?;
        }
        Ok(())
    }

    /// Appends the PID to each controller's procs file.
    pub fn attach(&self, pid: u32) -> io::Result<()> {
        for path in self.controller_paths() {
            write_value(&path.join(CG_PROC_FILE), &pid.to_string())?;
        }
        Ok(())
    }

    /// Writes the raw CPU quota (against [`CPU_PERIOD_US`]).
    pub fn set_cpu_limit(&self, quota: i64) -> io::Result<()> {
        write_value(&self.cpu_path().join(CG_CPU_PERIOD), &CPU_PERIOD_US.to_string())?;
        write_value(&self.cpu_path().join(CG_CPU_QUOTA), &quota.to_string())
    }

    /// Reads the effective CPU limit back in host-CPU units.
    pub fn cpu_limit(&self, host: HostResources) -> io::Result<i64> {
        let raw = read_value(&self.cpu_path().join(CG_CPU_QUOTA))?;
        Ok(raw * host.cpu / CPU_PERIOD_US)
    }

    pub fn set_memory_limit(&self, bytes: i64) -> io::Result<()> {
        write_value(&self.memory_path().join(CG_MEMORY_LIMIT), &bytes.to_string())
    }

    pub fn memory_limit(&self) -> io::Result<i64> {
        read_value(&self.memory_path().join(CG_MEMORY_LIMIT))
    }

    /// Applies the parsed task limits: the CPU quota is the weighted share
    /// of the period, the memory cap the weighted share of host memory.
    /// Zero limits leave the axis at the host maximum.
    pub fn apply_limits(&self, limits: Limits, host: HostResources) {
        let quota = (host.cpu_weight(limits.cpu) * CPU_PERIOD_US as f64).round() as i64;
        if let Err(err) = self.set_cpu_limit(quota) {
            tracing::warn!(group = %self.name, %err, "could not set CPU limit");
        }
        let bytes = (host.memory_weight(limits.memory) * host.memory as f64).round() as i64;
        if let Err(err) = self.set_memory_limit(bytes) {
            tracing::warn!(group = %self.name, %err, "could not set memory limit");
        }
    }
}

fn write_value(path: &Path, value: &str) -> io::Result<()> {
    fs::write(path, value)
}

fn read_value(path: &Path) -> io::Result<i64> {
    let raw = fs::read_to_string(path)?;
    raw.trim()
        .parse()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(base: &Path) -> ControlGroup {
        ControlGroup::with_base(base, "queued-task-1")
    }

    #[test]
    fn create_and_remove_manage_both_controllers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let group = group(dir.path());
        group.create().expect("create");
        assert!(dir.path().join("cpu/queued-task-1").is_dir());
        assert!(dir.path().join("memory/queued-task-1").is_dir());
        group.remove().expect("remove");
        assert!(!dir.path().join("cpu/queued-task-1").exists());
    }

    #[test]
    fn cpu_quota_reads_back_in_host_units() {
        let dir = tempfile::tempdir().expect("tempdir");
        let host = HostResources {
            cpu: 4,
            memory: 8 << 30,
        };
        let group = group(dir.path());
        group.create().expect("create");

        // Half the host: weight 0.5 over a 1000us period.
        group.set_cpu_limit(500).expect("quota");
        assert_eq!(group.cpu_limit(host).expect("read"), 2);
    }

    #[test]
    fn memory_limit_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let group = group(dir.path());
        group.create().expect("create");
        group.set_memory_limit(1 << 30).expect("limit");
        assert_eq!(group.memory_limit().expect("read"), 1 << 30);
    }

    #[test]
    fn attach_appends_the_pid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let group = group(dir.path());
        group.create().expect("create");
        group.attach(4242).expect("attach");
        let procs =
            fs::read_to_string(dir.path().join("cpu/queued-task-1/cgroup.procs")).expect("read");
        assert_eq!(procs.trim(), "4242");
    }

    #[test]
    fn apply_limits_is_best_effort_on_missing_group() {
        let dir = tempfile::tempdir().expect("tempdir");
        let host = HostResources {
            cpu: 4,
            memory: 8 << 30,
        };
        // No create(): writes fail, apply_limits must not panic.
        group(dir.path()).apply_limits(Limits::new(2, 0, 0, 0, 0), host);
    }
}
