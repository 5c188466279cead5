//! Task-bound child-process wrapper: spawn with resource caps and dropped
//! privileges, log redirection, child discovery and the kill ladder.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};

use crate::models::limits::Limits;
use crate::services::cgroup::ControlGroup;
use crate::utils::system::HostResources;

/// What to do with children when they must go away: on forced stop, on
/// daemon shutdown (delivered as the parent-death signal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitAction {
    Terminate,
    Kill,
}

impl ExitAction {
    /// Persisted encoding: 1 = Terminate, anything else = Kill.
    pub fn from_setting(value: i64) -> Self {
        if value == 1 {
            ExitAction::Terminate
        } else {
            ExitAction::Kill
        }
    }

    pub fn signal(self) -> Signal {
        match self {
            ExitAction::Terminate => Signal::SIGTERM,
            ExitAction::Kill => Signal::SIGKILL,
        }
    }
}

/// Everything needed to launch a task's child process.
#[derive(Debug, Clone)]
pub struct ProcessDefinition {
    pub command: String,
    pub arguments: Vec<String>,
    pub work_directory: PathBuf,
    pub uid: u32,
    pub gid: u32,
    pub nice: i64,
    pub limits: Limits,
}

impl ProcessDefinition {
    /// Empty working directories fall back to the system temp location.
    pub fn resolve_work_directory(raw: Option<&str>) -> PathBuf {
        match raw {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => std::env::temp_dir(),
        }
    }
}

pub struct Process {
    id: i64,
    pub definition: ProcessDefinition,
    cgroup: ControlGroup,
}

impl Process {
    pub fn new(id: i64, definition: ProcessDefinition) -> Self {
        let name = format!("queued-task-{id}");
        Process {
            id,
            definition,
            cgroup: ControlGroup::new(name),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> String {
        format!("queued-task-{}", self.id)
    }

    pub fn log_output(&self) -> PathBuf {
        self.definition
            .work_directory
            .join(format!("{}-out.log", self.name()))
    }

    pub fn log_error(&self) -> PathBuf {
        self.definition
            .work_directory
            .join(format!("{}-err.log", self.name()))
    }

    pub fn native_limits(&self) -> Limits {
        self.definition.limits
    }

    /// Launches the child: resource group with caps, appended log
    /// redirection, and a pre-exec hook that installs the parent-death
    /// signal and drops to the task's gid/uid. The privilege drop is
    /// best-effort so an unprivileged daemon can still run jobs as itself.
    pub fn spawn(&self, exit_action: ExitAction, host: HostResources) -> io::Result<Child> {
        if let Err(err) = self.cgroup.create() {
            tracing::warn!(task = self.id, %err, "could not create resource group");
        } else {
            self.cgroup.apply_limits(self.definition.limits, host);
        }

        let stdout = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.log_output())?;
        let stderr = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.log_error())?;

        let mut command = Command::new(&self.definition.command);
        command
            .args(&self.definition.arguments)
            .current_dir(&self.definition.work_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        let uid = self.definition.uid;
        let gid = self.definition.gid;
        let death_signal = exit_action.signal() as i32;
        unsafe {
            command.pre_exec(move || {
                #[cfg(target_os = "linux")]
                {
                    libc::prctl(libc::PR_SET_PDEATHSIG, death_signal);
                }
                #[cfg(not(target_os = "linux"))]
                let _ = death_signal;
                let _ = libc::setgid(gid);
                let _ = libc::setuid(uid);
                Ok(())
            });
        }

        command.spawn()
    }

    /// Attaches the freshly spawned child to the resource group.
    pub fn attach(&self, pid: u32) {
        if let Err(err) = self.cgroup.attach(pid) {
            tracing::warn!(task = self.id, pid, %err, "could not attach pid to resource group");
        }
    }

    pub fn remove_group(&self) {
        if let Err(err) = self.cgroup.remove() {
            tracing::debug!(task = self.id, %err, "could not remove resource group");
        }
    }

    /// Hands the log files over to the task owner once the child exited.
    pub fn chown_logs(&self) {
        for path in [self.log_output(), self.log_error()] {
            let _ = nix::unistd::chown(
                &path,
                Some(nix::unistd::Uid::from_raw(self.definition.uid)),
                Some(nix::unistd::Gid::from_raw(self.definition.gid)),
            );
        }
    }
}

/// Direct children of the PID, found by scanning the OS process table.
pub fn children_pids(parent: i32) -> Vec<i32> {
    let Ok(entries) = fs::read_dir("/proc") else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| {
            let pid: i32 = entry.file_name().to_str()?.parse().ok()?;
            let stat = fs::read_to_string(Path::new("/proc").join(pid.to_string()).join("stat"))
                .ok()?;
            // Fields after the parenthesized command name: state, ppid, ...
            let tail = &stat[stat.rfind(')')? + 1..];
            let ppid: i32 = tail.split_whitespace().nth(1)?.parse().ok()?;
            (ppid == parent).then_some(pid)
        })
        .collect()
}

/// SIGTERM every child of the PID, escalating to SIGKILL per child when the
/// polite signal cannot be delivered.
pub fn kill_children(parent: i32) {
    let pids = children_pids(parent);
    if !pids.is_empty() {
        tracing::info!(parent, ?pids, "found children pids");
    }
    for pid in pids {
        let target = Pid::from_raw(pid);
        if kill(target, Signal::SIGTERM).is_err() {
            tracing::warn!(pid, "SIGTERM failed, trying to kill");
            let _ = kill(target, Signal::SIGKILL);
        }
    }
}

/// Signals the root child per the configured exit action.
pub fn signal_process(pid: i32, action: ExitAction) {
    let _ = kill(Pid::from_raw(pid), action.signal());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(dir: &Path) -> ProcessDefinition {
        ProcessDefinition {
            command: "/bin/sh".into(),
            arguments: vec!["-c".into(), "echo out; echo err >&2".into()],
            work_directory: dir.to_path_buf(),
            uid: 1,
            gid: 1,
            nice: 0,
            limits: Limits::default(),
        }
    }

    #[test]
    fn exit_action_decodes_the_setting_value() {
        assert_eq!(ExitAction::from_setting(1), ExitAction::Terminate);
        assert_eq!(ExitAction::from_setting(2), ExitAction::Kill);
        assert_eq!(ExitAction::from_setting(99), ExitAction::Kill);
    }

    #[test]
    fn log_paths_derive_from_name_and_work_directory() {
        let process = Process::new(7, definition(Path::new("/var/work")));
        assert_eq!(process.name(), "queued-task-7");
        assert_eq!(
            process.log_output(),
            PathBuf::from("/var/work/queued-task-7-out.log")
        );
        assert_eq!(
            process.log_error(),
            PathBuf::from("/var/work/queued-task-7-err.log")
        );
    }

    #[test]
    fn empty_work_directory_falls_back_to_temp() {
        assert_eq!(
            ProcessDefinition::resolve_work_directory(None),
            std::env::temp_dir()
        );
        assert_eq!(
            ProcessDefinition::resolve_work_directory(Some("")),
            std::env::temp_dir()
        );
        assert_eq!(
            ProcessDefinition::resolve_work_directory(Some("/work")),
            PathBuf::from("/work")
        );
    }

    #[tokio::test]
    async fn spawn_redirects_stdout_and_stderr_to_appended_logs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let host = HostResources {
            cpu: 4,
            memory: 8 << 30,
        };
        let process = Process::new(1, definition(dir.path()));

        let mut child = process.spawn(ExitAction::Kill, host).expect("spawn");
        child.wait().await.expect("wait");
        let mut second = process.spawn(ExitAction::Kill, host).expect("respawn");
        second.wait().await.expect("wait");

        let out = fs::read_to_string(process.log_output()).expect("out log");
        let err = fs::read_to_string(process.log_error()).expect("err log");
        assert_eq!(out, "out\nout\n");
        assert_eq!(err, "err\nerr\n");
    }

    #[tokio::test]
    async fn children_of_a_shell_are_discovered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let host = HostResources {
            cpu: 4,
            memory: 8 << 30,
        };
        let mut definition = definition(dir.path());
        definition.arguments = vec!["-c".into(), "sleep 5".into()];
        let process = Process::new(2, definition);

        let mut child = process.spawn(ExitAction::Kill, host).expect("spawn");
        let pid = child.id().expect("pid") as i32;
        // Give the shell a moment to fork its sleep.
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;

        kill_children(pid);
        signal_process(pid, ExitAction::Kill);
        child.wait().await.expect("wait");
    }
}
