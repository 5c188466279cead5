//! Admission and lifecycle engine. All state changes funnel through one
//! serializer task, so observers always see a consistent running/pending
//! view and a task id can never be started twice concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::models::limits::Limits;
use crate::models::task::{TaskPatch, TaskRow};
use crate::services::events::CoreEvent;
use crate::services::process::{
    self, ExitAction, Process, ProcessDefinition,
};
use crate::utils::system::HostResources;
use crate::utils::time;

#[derive(Debug)]
enum SchedulerCommand {
    /// Run one admission pass and start at most one task.
    Admit,
    /// Start the task regardless of admission.
    ForceStart(i64),
    /// Stop the task's child per the current exit action.
    ForceStop(i64),
    /// The task's child exited.
    Finished(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Pending,
    Running { pid: i32 },
}

struct Slot {
    process: Process,
    state: SlotState,
}

/// A pending task as seen by the admission policy.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub id: i64,
    pub nice: i64,
    pub limits: Limits,
}

/// Sums the raw limits of the running set. Unbounded (zero) limits
/// contribute nothing to the sums; an all-zero running set therefore
/// leaves the whole host available to admission.
pub fn used_resources(running: impl Iterator<Item = Limits>) -> (i64, i64) {
    running.fold((0, 0), |(cpu, memory), limits| {
        (cpu + limits.cpu, memory + limits.memory)
    })
}

/// Picks the next task to start: every candidate both of whose axes would
/// overcommit the remaining weight is rejected, then the smallest nice
/// wins and ties break towards the smallest id.
pub fn select_candidate(
    host: HostResources,
    used: (i64, i64),
    candidates: &[Candidate],
) -> Option<i64> {
    let used_cpu_weight = if used.0 == 0 {
        0.0
    } else {
        host.cpu_weight(used.0)
    };
    let used_memory_weight = if used.1 == 0 {
        0.0
    } else {
        host.memory_weight(used.1)
    };

    candidates
        .iter()
        .filter(|candidate| {
            let cpu_short = (1.0 - used_cpu_weight) < host.cpu_weight(candidate.limits.cpu);
            let memory_short =
                (1.0 - used_memory_weight) < host.memory_weight(candidate.limits.memory);
            !(cpu_short && memory_short)
        })
        .min_by_key(|candidate| (candidate.nice, candidate.id))
        .map(|candidate| candidate.id)
}

struct SchedulerInner {
    host: HostResources,
    slots: Mutex<HashMap<i64, Slot>>,
    exit_action: Mutex<ExitAction>,
    events: mpsc::UnboundedSender<CoreEvent>,
    commands: mpsc::UnboundedSender<SchedulerCommand>,
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(host: HostResources, events: mpsc::UnboundedSender<CoreEvent>) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(SchedulerInner {
            host,
            slots: Mutex::new(HashMap::new()),
            exit_action: Mutex::new(ExitAction::Kill),
            events,
            commands,
        });
        tokio::spawn(run(inner.clone(), rx));
        Scheduler { inner }
    }

    pub fn exit_action(&self) -> ExitAction {
        *self.inner.exit_action.lock().expect("exit action lock")
    }

    /// Also applies to the parent-death signal of children spawned later.
    pub fn set_exit_action(&self, action: ExitAction) {
        *self.inner.exit_action.lock().expect("exit action lock") = action;
    }

    /// Registers a task and triggers admission. Already-known ids are left
    /// untouched.
    pub fn add(&self, row: &TaskRow) {
        {
            let mut slots = self.inner.slots.lock().expect("slots lock");
            if slots.contains_key(&row.id) {
                return;
            }
            slots.insert(row.id, slot_from_row(row));
        }
        self.trigger();
    }

    /// Loads unfinished tasks at startup without triggering admission.
    pub fn load(&self, rows: &[TaskRow]) {
        let mut slots = self.inner.slots.lock().expect("slots lock");
        for row in rows {
            slots.entry(row.id).or_insert_with(|| slot_from_row(row));
        }
    }

    /// Queues one admission pass.
    pub fn trigger(&self) {
        let _ = self.inner.commands.send(SchedulerCommand::Admit);
    }

    pub fn force_start(&self, id: i64) {
        let _ = self.inner.commands.send(SchedulerCommand::ForceStart(id));
    }

    pub fn force_stop(&self, id: i64) {
        let _ = self.inner.commands.send(SchedulerCommand::ForceStop(id));
    }

    pub fn contains(&self, id: i64) -> bool {
        self.inner.slots.lock().expect("slots lock").contains_key(&id)
    }

    pub fn is_running(&self, id: i64) -> bool {
        matches!(
            self.inner.slots.lock().expect("slots lock").get(&id),
            Some(Slot {
                state: SlotState::Running { .. },
                ..
            })
        )
    }

    /// Mirrors an already-persisted edit into the live slot.
    pub fn apply_patch(&self, id: i64, patch: &TaskPatch) {
        let mut slots = self.inner.slots.lock().expect("slots lock");
        let Some(slot) = slots.get_mut(&id) else {
            return;
        };
        let definition = &mut slot.process.definition;
        if let Some(command) = &patch.command {
            definition.command = command.clone();
        }
        if let Some(arguments) = &patch.command_arguments {
            definition.arguments = arguments
                .split('\n')
                .filter(|arg| !arg.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(directory) = &patch.work_directory {
            definition.work_directory =
                ProcessDefinition::resolve_work_directory(Some(directory));
        }
        if let Some(nice) = patch.nice {
            definition.nice = nice;
        }
        if let Some(uid) = patch.uid {
            definition.uid = uid as u32;
        }
        if let Some(gid) = patch.gid {
            definition.gid = gid as u32;
        }
        if let Some(limits) = &patch.limits {
            definition.limits = Limits::parse(limits);
        }
    }
}

fn slot_from_row(row: &TaskRow) -> Slot {
    let definition = ProcessDefinition {
        command: row.command.clone().unwrap_or_default(),
        arguments: row.arguments(),
        work_directory: ProcessDefinition::resolve_work_directory(row.work_directory.as_deref()),
        uid: row.uid.unwrap_or(1) as u32,
        gid: row.gid.unwrap_or(1) as u32,
        nice: row.nice,
        limits: row.native_limits(),
    };
    Slot {
        process: Process::new(row.id, definition),
        state: SlotState::Pending,
    }
}

async fn run(inner: Arc<SchedulerInner>, mut rx: mpsc::UnboundedReceiver<SchedulerCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            SchedulerCommand::Admit => admit(&inner),
            SchedulerCommand::ForceStart(id) => start(&inner, id),
            SchedulerCommand::ForceStop(id) => stop(&inner, id),
            SchedulerCommand::Finished(id) => {
                finish(&inner, id);
                admit(&inner);
            }
        }
    }
}

fn admit(inner: &Arc<SchedulerInner>) {
    let chosen = {
        let slots = inner.slots.lock().expect("slots lock");
        let used = used_resources(slots.values().filter_map(|slot| match slot.state {
            SlotState::Running { .. } => Some(slot.process.native_limits()),
            SlotState::Pending => None,
        }));
        let candidates: Vec<Candidate> = slots
            .values()
            .filter(|slot| slot.state == SlotState::Pending)
            .map(|slot| Candidate {
                id: slot.process.id(),
                nice: slot.process.definition.nice,
                limits: slot.process.native_limits(),
            })
            .collect();
        select_candidate(inner.host, used, &candidates)
    };

    if let Some(id) = chosen {
        start(inner, id);
    }
}

fn start(inner: &Arc<SchedulerInner>, id: i64) {
    let action = *inner.exit_action.lock().expect("exit action lock");
    let mut slots = inner.slots.lock().expect("slots lock");
    let Some(slot) = slots.get_mut(&id) else {
        tracing::warn!(id, "no task found to start");
        return;
    };
    if matches!(slot.state, SlotState::Running { .. }) {
        tracing::warn!(id, "task is already running");
        return;
    }

    match slot.process.spawn(action, inner.host) {
        Ok(mut child) => {
            let pid = child.id().unwrap_or_default() as i32;
            slot.process.attach(pid as u32);
            slot.state = SlotState::Running { pid };

            let start = time::now_utc();
            tracing::info!(id, pid, "task started");
            let _ = inner.events.send(CoreEvent::TaskStarted { id, time: start });

            let commands = inner.commands.clone();
            tokio::spawn(async move {
                let status = child.wait().await;
                tracing::debug!(id, ?status, "task child exited");
                let _ = commands.send(SchedulerCommand::Finished(id));
            });
        }
        Err(err) => {
            tracing::warn!(id, %err, "could not start task");
        }
    }
}

fn stop(inner: &Arc<SchedulerInner>, id: i64) {
    let action = *inner.exit_action.lock().expect("exit action lock");
    let slots = inner.slots.lock().expect("slots lock");
    let Some(slot) = slots.get(&id) else {
        tracing::warn!(id, "no task found to stop");
        return;
    };
    match slot.state {
        SlotState::Running { pid } => {
            process::kill_children(pid);
            process::signal_process(pid, action);
        }
        SlotState::Pending => {
            tracing::warn!(id, "task is not running");
        }
    }
}

fn finish(inner: &Arc<SchedulerInner>, id: i64) {
    let mut slots = inner.slots.lock().expect("slots lock");
    let Some(slot) = slots.remove(&id) else {
        return;
    };
    slot.process.chown_logs();
    slot.process.remove_group();
    let end = time::now_utc();
    tracing::info!(id, "task finished");
    let _ = inner.events.send(CoreEvent::TaskFinished { id, time: end });
}
