// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-entry state machine and its serialized command queue.
//!
//! One supervisor task owns the registry. Everything that can change an
//! entry — control-plane commands, child exits, threshold trips, file
//! changes, timers — arrives as a [`Msg`] on a single queue and is applied
//! in FIFO order. Background activities hold an [`EventSender`] and never
//! touch the registry themselves.
//!
//! Commands that must wait on a child (stop, delete, restart of a live
//! entry) park their reply on the entry and keep the queue draining; the
//! reply resolves when the corresponding exit event commits the effect.

use crate::error::SupervisorError;
use crate::health::HealthProbe;
use crate::policy::{DenyReason, PolicyDecision, RestartPolicy};
use crate::registry::Registry;
use crate::sampler::{spawn_sampler, SamplerHandle};
use crate::spawn;
use crate::watcher::{spawn_watcher, IgnoreSet, WatcherHandle};
use nix::sys::signal::Signal;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use warden_core::{
    Clock, Entry, EntryId, EntryState, Event, IdGen, LimitKind, LogFormat, LogOutput,
    ProcessSpec, RestartReason, Tunables,
};
use warden_storage::{CrashJournal, CrashRecord, CrashStats, LogSink, LogStream, Snapshot,
    Snapshotter};

/// A child that stays up this long is considered healthy; its next crash
/// starts a fresh backoff schedule.
const STABLE_UPTIME_MS: u64 = 5_000;

/// Crash records included in a status detail reply.
const CRASH_TAIL_LEN: usize = 10;

/// Command target: one entry (by id or name) or every entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    One(String),
}

/// A control-plane command.
#[derive(Debug)]
pub enum Command {
    Start {
        name: Option<String>,
        spec: ProcessSpec,
    },
    Stop {
        target: Target,
    },
    Restart {
        target: Target,
    },
    Status {
        target: Option<String>,
    },
    Logs {
        target: String,
        lines: usize,
    },
    Save,
    Delete {
        target: Target,
    },
    /// Flush state and terminate children ahead of daemon exit.
    Shutdown,
}

/// An entry as observed at one instant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: Entry,
    pub uptime_ms: u64,
}

impl EntryView {
    fn observe(entry: &Entry, now_ms: u64) -> Self {
        Self {
            entry: entry.clone(),
            uptime_ms: entry.uptime_ms(now_ms),
        }
    }
}

/// Status detail: the entry plus its crash history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetail {
    #[serde(flatten)]
    pub view: EntryView,
    pub crashes: CrashStats,
}

/// What a committed command produced.
#[derive(Debug)]
pub enum CommandOutcome {
    Started(Box<EntryView>),
    Stopped { names: Vec<String> },
    Restarted { views: Vec<EntryView>, pending: Vec<String> },
    Deleted { names: Vec<String> },
    StatusList(Vec<EntryView>),
    StatusDetail(Box<StatusDetail>),
    Logs { name: String, lines: Vec<String> },
    Saved,
    ShuttingDown,
}

type Reply = oneshot::Sender<Result<CommandOutcome, SupervisorError>>;

/// A queued message: a command with its reply slot, or a background event.
pub enum Msg {
    Command { cmd: Command, reply: Reply },
    Event(Event),
}

/// Cloneable sender used by background tasks to feed events into the queue.
#[derive(Clone)]
pub struct EventSender(mpsc::UnboundedSender<Msg>);

impl EventSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Msg>) -> Self {
        Self(tx)
    }

    pub fn send(&self, event: Event) {
        let _ = self.0.send(Msg::Event(event));
    }
}

/// Handle used by the control plane to issue commands.
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::UnboundedSender<Msg>,
}

impl SupervisorHandle {
    /// Enqueue a command and wait for its committed outcome.
    pub async fn command(&self, cmd: Command) -> Result<CommandOutcome, SupervisorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Msg::Command { cmd, reply })
            .map_err(|_| SupervisorError::Unavailable)?;
        rx.await.map_err(|_| SupervisorError::Unavailable)?
    }

    pub fn event_sender(&self) -> EventSender {
        EventSender(self.tx.clone())
    }
}

/// Everything the supervisor needs from the daemon skeleton.
pub struct SupervisorDeps {
    /// Root data directory (ignored by watchers).
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub crashes_dir: PathBuf,
    pub snapshot_path: PathBuf,
    pub tunables: Tunables,
    pub clock: Arc<dyn Clock>,
    pub id_gen: Arc<dyn IdGen>,
}

struct ChildRuntime {
    epoch: u64,
    pid: u32,
    sampler: Option<SamplerHandle>,
}

struct PendingRespawn {
    reason: RestartReason,
    replies: Vec<Reply>,
}

enum GroupKind {
    Stop,
    Delete,
}

/// A stop/delete command waiting for its targets' children to exit.
struct Completion {
    waiting: HashSet<EntryId>,
    done: Vec<String>,
    kind: GroupKind,
    reply: Option<Reply>,
}

pub struct Supervisor {
    registry: Arc<Mutex<Registry>>,
    books: HashMap<EntryId, RestartPolicy>,
    children: HashMap<EntryId, ChildRuntime>,
    watchers: HashMap<EntryId, WatcherHandle>,
    epochs: HashMap<EntryId, u64>,
    pending_respawns: HashMap<EntryId, PendingRespawn>,
    completions: Vec<Completion>,
    journal: CrashJournal,
    snapshotter: Snapshotter,
    probe: HealthProbe,
    deps: SupervisorDeps,
    tx: mpsc::UnboundedSender<Msg>,
}

impl Supervisor {
    /// Build the supervisor and its queue. Must run inside a tokio runtime
    /// (the snapshot writer task starts immediately).
    pub fn new(deps: SupervisorDeps) -> (Self, SupervisorHandle, mpsc::UnboundedReceiver<Msg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Mutex::new(Registry::default()));

        let producer_registry = Arc::clone(&registry);
        let snapshotter = Snapshotter::spawn(
            deps.snapshot_path.clone(),
            deps.tunables.snapshot_quiesce,
            move || Snapshot::new(producer_registry.lock().snapshot_entries()),
        );

        let journal = CrashJournal::new(&deps.crashes_dir);

        let supervisor = Self {
            registry,
            books: HashMap::new(),
            children: HashMap::new(),
            watchers: HashMap::new(),
            epochs: HashMap::new(),
            pending_respawns: HashMap::new(),
            completions: Vec::new(),
            journal,
            snapshotter,
            probe: HealthProbe::new(),
            deps,
            tx: tx.clone(),
        };

        (supervisor, SupervisorHandle { tx }, rx)
    }

    fn event_sender(&self) -> EventSender {
        EventSender(self.tx.clone())
    }

    /// Re-adopt entries from the last snapshot.
    ///
    /// Entries that were alive (or mid-restart) when the snapshot was taken
    /// are respawned with their saved spec; a respawn failure drops the
    /// entry. Retained stopped/errored entries come back as-is.
    pub fn restore(&mut self, entries: Vec<Entry>) {
        for mut entry in entries {
            let id = entry.id.clone();
            let respawn = entry.state.has_live_child() || entry.state == EntryState::Restarting;

            entry.detach_child();
            if respawn {
                entry.state = EntryState::Starting;
            }
            self.books
                .insert(id.clone(), RestartPolicy::from_spec(&entry.spec));
            let watch = entry.spec.watch;
            self.registry.lock().add(entry);

            if respawn {
                match self.attach_child(&id) {
                    Ok(view) => {
                        info!(entry = %id, name = %view.entry.name, pid = view.entry.os_pid, "respawned from snapshot");
                        if watch {
                            self.start_watching(&id);
                        }
                    }
                    Err(e) => {
                        error!(entry = %id, error = %e, "respawn from snapshot failed, dropping entry");
                        self.books.remove(&id);
                        self.registry.lock().remove(&id);
                    }
                }
            }
        }
        self.snapshotter.mark_dirty();
    }

    /// Drain the queue until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Msg>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                Msg::Command { cmd, reply } => self.handle_command(cmd, reply).await,
                Msg::Event(event) => self.handle_event(event),
            }
        }
    }

    async fn handle_command(&mut self, cmd: Command, reply: Reply) {
        match cmd {
            Command::Start { name, spec } => {
                let _ = reply.send(self.handle_start(name, spec));
            }
            Command::Stop { target } => self.handle_stop(target, GroupKind::Stop, reply),
            Command::Delete { target } => self.handle_stop(target, GroupKind::Delete, reply),
            Command::Restart { target } => self.handle_restart(target, reply),
            Command::Status { target } => {
                let _ = reply.send(self.handle_status(target));
            }
            Command::Logs { target, lines } => {
                let _ = reply.send(self.handle_logs(&target, lines));
            }
            Command::Save => {
                let result = self
                    .snapshotter
                    .flush()
                    .await
                    .map(|()| CommandOutcome::Saved)
                    .map_err(|e| SupervisorError::Io(std::io::Error::other(e)));
                let _ = reply.send(result);
            }
            Command::Shutdown => {
                let _ = reply.send(self.handle_shutdown().await);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    fn handle_start(
        &mut self,
        name: Option<String>,
        spec: ProcessSpec,
    ) -> Result<CommandOutcome, SupervisorError> {
        let name = name.unwrap_or_else(|| default_name(&spec));

        let id = {
            let registry = self.registry.lock();
            if registry.name_in_use(&name) {
                return Err(SupervisorError::NameTaken(name));
            }
            registry.generate_id(self.deps.id_gen.as_ref())
        };

        let watch = spec.watch;
        let entry = Entry::new(id.clone(), name, spec);
        self.registry.lock().add(entry);

        match self.attach_child(&id) {
            Ok(view) => {
                info!(entry = %id, name = %view.entry.name, pid = view.entry.os_pid, "process started");
                if watch {
                    self.start_watching(&id);
                }
                self.snapshotter.mark_dirty();
                Ok(CommandOutcome::Started(Box::new(view)))
            }
            Err(e) => {
                // No zombie record: a spawn failure removes the entry.
                self.books.remove(&id);
                self.epochs.remove(&id);
                self.registry.lock().remove(&id);
                Err(e)
            }
        }
    }

    fn handle_stop(&mut self, target: Target, kind: GroupKind, reply: Reply) {
        let ids = match self.resolve_targets(&target) {
            Ok(ids) => ids,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        let mut group = Completion {
            waiting: HashSet::new(),
            done: Vec::new(),
            kind,
            reply: Some(reply),
        };

        for id in ids {
            if self.children.contains_key(&id) {
                self.signal_stop(&id);
                group.waiting.insert(id);
            } else {
                let delete = matches!(group.kind, GroupKind::Delete);
                if let Some(name) = self.finalize_removal(&id, delete) {
                    group.done.push(name);
                }
            }
        }

        if group.waiting.is_empty() {
            let outcome = group_outcome(&group.kind, group.done);
            if let Some(reply) = group.reply.take() {
                let _ = reply.send(Ok(outcome));
            }
        } else {
            self.completions.push(group);
        }
    }

    fn handle_restart(&mut self, target: Target, reply: Reply) {
        let ids = match self.resolve_targets(&target) {
            Ok(ids) => ids,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        // Single live target: park the reply, resolve after the respawn.
        if let [id] = ids.as_slice() {
            if self.children.contains_key(id) {
                if let Some(book) = self.books.get_mut(id) {
                    book.reset_attempts();
                }
                self.pending_respawns
                    .entry(id.clone())
                    .or_insert_with(|| PendingRespawn {
                        reason: RestartReason::Manual,
                        replies: Vec::new(),
                    })
                    .replies
                    .push(reply);
                self.signal_stop(id);
                return;
            }
        }

        let mut views = Vec::new();
        let mut pending = Vec::new();
        for id in ids {
            if self.children.contains_key(&id) {
                if let Some(book) = self.books.get_mut(&id) {
                    book.reset_attempts();
                }
                self.pending_respawns
                    .entry(id.clone())
                    .or_insert_with(|| PendingRespawn {
                        reason: RestartReason::Manual,
                        replies: Vec::new(),
                    });
                self.signal_stop(&id);
                if let Some(name) = self.entry_name(&id) {
                    pending.push(name);
                }
            } else {
                match self.respawn_now(&id, RestartReason::Manual) {
                    Ok(view) => views.push(view),
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        return;
                    }
                }
            }
        }

        let _ = reply.send(Ok(CommandOutcome::Restarted { views, pending }));
    }

    fn handle_status(&self, target: Option<String>) -> Result<CommandOutcome, SupervisorError> {
        let now = self.deps.clock.now_ms();
        match target {
            None => {
                let registry = self.registry.lock();
                let views = registry
                    .list()
                    .into_iter()
                    .map(|e| EntryView::observe(e, now))
                    .collect();
                Ok(CommandOutcome::StatusList(views))
            }
            Some(t) => {
                let view = {
                    let registry = self.registry.lock();
                    let entry = registry
                        .resolve(&t)
                        .ok_or_else(|| SupervisorError::NotFound(t.clone()))?;
                    EntryView::observe(entry, now)
                };
                let crashes = self
                    .journal
                    .stats(&view.entry.id, now, CRASH_TAIL_LEN)
                    .unwrap_or_else(|e| {
                        warn!(entry = %view.entry.id, error = %e, "crash journal unreadable");
                        CrashStats {
                            total: 0,
                            last_minute: 0,
                            modal_exit_code: None,
                            mean_uptime_ms: 0,
                            recent: Vec::new(),
                        }
                    });
                Ok(CommandOutcome::StatusDetail(Box::new(StatusDetail {
                    view,
                    crashes,
                })))
            }
        }
    }

    fn handle_logs(
        &self,
        target: &str,
        lines: usize,
    ) -> Result<CommandOutcome, SupervisorError> {
        let (id, name) = {
            let registry = self.registry.lock();
            let entry = registry
                .resolve(target)
                .ok_or_else(|| SupervisorError::NotFound(target.to_string()))?;
            (entry.id.clone(), entry.name.clone())
        };
        let lines = LogSink::tail(&self.deps.logs_dir, &id, lines)
            .map_err(|e| SupervisorError::Io(std::io::Error::other(e.to_string())))?;
        Ok(CommandOutcome::Logs { name, lines })
    }

    async fn handle_shutdown(&mut self) -> Result<CommandOutcome, SupervisorError> {
        // Snapshot first, with live states intact, so the next daemon
        // respawns everything that was running.
        if let Err(e) = self.snapshotter.flush().await {
            warn!(error = %e, "shutdown snapshot failed");
        }

        for (id, runtime) in &self.children {
            debug!(entry = %id, pid = runtime.pid, "terminating child for shutdown");
            if let Err(e) = spawn::send_signal(runtime.pid, Signal::SIGTERM) {
                warn!(entry = %id, error = %e, "failed to signal child during shutdown");
            }
        }

        Ok(CommandOutcome::ShuttingDown)
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::ChildExit {
                id,
                epoch,
                exit_code,
                signal,
            } => self.handle_child_exit(&id, epoch, exit_code, signal),
            Event::RestartDue { id, epoch } => self.handle_restart_due(&id, epoch),
            Event::StopTimeout { id, epoch } => self.handle_stop_timeout(&id, epoch),
            Event::ThresholdExceeded {
                id,
                epoch,
                kind,
                current,
                limit,
            } => self.handle_threshold(&id, epoch, kind, current, limit),
            Event::MemoryWarning {
                id,
                epoch,
                rss_bytes,
                limit_bytes,
            } => {
                if self.epoch_is_current(&id, epoch) {
                    warn!(
                        entry = %id,
                        rss_bytes,
                        limit_bytes,
                        "memory above 80% of limit"
                    );
                }
            }
            Event::Metrics {
                id,
                epoch,
                cpu_avg,
                rss_bytes,
            } => {
                if self.epoch_is_current(&id, epoch) {
                    let mut registry = self.registry.lock();
                    if let Some(entry) = registry.get_mut(&id) {
                        entry.cpu_percent = cpu_avg;
                        entry.rss_bytes = rss_bytes;
                    }
                }
            }
            Event::FileChange { id } => self.handle_file_change(&id),
            Event::ProbeResult { id, epoch, healthy } => {
                if self.epoch_is_current(&id, epoch) {
                    if healthy {
                        info!(entry = %id, "readiness probe passed");
                    } else {
                        // Advisory only; the entry stays running.
                        warn!(entry = %id, "readiness probe never passed within budget");
                    }
                }
            }
        }
    }

    fn handle_child_exit(
        &mut self,
        id: &EntryId,
        epoch: u64,
        exit_code: Option<i32>,
        signal: Option<i32>,
    ) {
        match self.children.get(id) {
            Some(runtime) if runtime.epoch == epoch => {}
            _ => return,
        }
        let Some(runtime) = self.children.remove(id) else {
            return;
        };
        if let Some(sampler) = &runtime.sampler {
            sampler.stop();
        }

        let now = self.deps.clock.now_ms();
        let (name, uptime_ms, cpu_percent, rss_bytes, restart_count) = {
            let registry = self.registry.lock();
            let Some(entry) = registry.get(id) else {
                return;
            };
            (
                entry.name.clone(),
                entry.uptime_ms(now),
                entry.cpu_percent,
                entry.rss_bytes,
                entry.restart_count,
            )
        };

        debug!(entry = %id, name = %name, ?exit_code, ?signal, uptime_ms, "child exited");

        // A stop or delete was waiting on this exit.
        if self.completions.iter().any(|c| c.waiting.contains(id)) {
            self.abort_pending_respawn(id, &name);
            self.resolve_completions(id, &name);
            return;
        }

        // An intentional restart (manual, threshold, file change).
        if let Some(pending) = self.pending_respawns.remove(id) {
            self.set_state(id, EntryState::Restarting);
            let result = self.respawn_now(id, pending.reason);
            match result {
                Ok(view) => {
                    for reply in pending.replies {
                        let _ = reply.send(Ok(CommandOutcome::Restarted {
                            views: vec![view.clone()],
                            pending: Vec::new(),
                        }));
                    }
                }
                Err(e) => {
                    error!(entry = %id, error = %e, "respawn failed");
                    self.set_state(id, EntryState::Errored);
                    let message = e.to_string();
                    for reply in pending.replies {
                        let _ = reply.send(Err(SupervisorError::SpawnFailed {
                            name: name.clone(),
                            message: message.clone(),
                        }));
                    }
                }
            }
            return;
        }

        // Unattended exit: crash accounting, then the policy.
        let failed = !(exit_code == Some(0) && signal.is_none());
        if failed {
            let record = CrashRecord {
                timestamp: now,
                id: id.clone(),
                name: name.clone(),
                exit_code,
                signal,
                cpu_percent,
                rss_bytes,
                uptime_ms,
                restart_count,
            };
            if let Err(e) = self.journal.append(record) {
                warn!(entry = %id, error = %e, "failed to append crash record");
            }
        }

        let book = self
            .books
            .entry(id.clone())
            .or_insert_with(|| RestartPolicy::new(1_000, 30_000, 10));
        if uptime_ms >= STABLE_UPTIME_MS {
            // The previous run was healthy; start backoff from scratch.
            book.reset_attempts();
        }
        let decision = book.on_exit(exit_code, signal, now);

        match decision {
            PolicyDecision::Deny(DenyReason::CleanExit) => {
                info!(entry = %id, name = %name, "process exited cleanly");
                self.detach_and_set(id, EntryState::Stopped);
            }
            PolicyDecision::Deny(DenyReason::CrashLoop) => {
                error!(entry = %id, name = %name, "crash loop detected, giving up");
                self.detach_and_set(id, EntryState::Errored);
            }
            PolicyDecision::Deny(DenyReason::MaxRestarts) => {
                error!(entry = %id, name = %name, "max restarts reached, giving up");
                self.detach_and_set(id, EntryState::Errored);
            }
            PolicyDecision::Restart { delay_ms } => {
                warn!(
                    entry = %id,
                    name = %name,
                    ?exit_code,
                    ?signal,
                    delay_ms,
                    "process crashed, restart scheduled"
                );
                self.detach_and_set(id, EntryState::Errored);
                self.schedule(
                    Duration::from_millis(delay_ms),
                    Event::RestartDue {
                        id: id.clone(),
                        epoch,
                    },
                );
            }
        }
        self.snapshotter.mark_dirty();
    }

    fn handle_restart_due(&mut self, id: &EntryId, epoch: u64) {
        if self.epochs.get(id) != Some(&epoch) {
            return;
        }
        let state = self.registry.lock().get(id).map(|e| e.state);
        if state != Some(EntryState::Errored) {
            return;
        }
        if let Err(e) = self.respawn_now(id, RestartReason::Crash) {
            error!(entry = %id, error = %e, "automatic restart failed");
            self.set_state(id, EntryState::Errored);
        }
    }

    fn handle_stop_timeout(&mut self, id: &EntryId, epoch: u64) {
        let Some(runtime) = self.children.get(id) else {
            return;
        };
        if runtime.epoch != epoch {
            return;
        }
        let state = self.registry.lock().get(id).map(|e| e.state);
        if state == Some(EntryState::Stopping) {
            warn!(entry = %id, pid = runtime.pid, "stop grace period elapsed, killing");
            if let Err(e) = spawn::send_signal(runtime.pid, Signal::SIGKILL) {
                warn!(entry = %id, error = %e, "SIGKILL failed");
            }
        }
    }

    fn handle_threshold(
        &mut self,
        id: &EntryId,
        epoch: u64,
        kind: LimitKind,
        current: f64,
        limit: f64,
    ) {
        if !self.epoch_is_current(id, epoch) {
            return;
        }
        let state = self.registry.lock().get(id).map(|e| e.state);
        if state != Some(EntryState::Running) {
            return;
        }

        warn!(entry = %id, %kind, current, limit, "resource threshold exceeded, restarting");
        let reason = match kind {
            LimitKind::Memory => RestartReason::Memory,
            LimitKind::Cpu => RestartReason::Cpu,
        };
        self.pending_respawns
            .entry(id.clone())
            .or_insert_with(|| PendingRespawn {
                reason,
                replies: Vec::new(),
            });
        self.signal_stop(id);
    }

    fn handle_file_change(&mut self, id: &EntryId) {
        let state = self.registry.lock().get(id).map(|e| e.state);
        if state != Some(EntryState::Running) {
            return;
        }
        info!(entry = %id, "watched files changed, restarting");
        self.pending_respawns
            .entry(id.clone())
            .or_insert_with(|| PendingRespawn {
                reason: RestartReason::FileChange,
                replies: Vec::new(),
            });
        self.signal_stop(id);
    }

    // ---------------------------------------------------------------------
    // Plumbing
    // ---------------------------------------------------------------------

    /// Spawn the entry's child and wire log capture, the exit waiter, the
    /// sampler, and the readiness probe. Leaves the entry in `running`.
    fn attach_child(&mut self, id: &EntryId) -> Result<EntryView, SupervisorError> {
        let (name, spec) = {
            let registry = self.registry.lock();
            let entry = registry
                .get(id)
                .ok_or_else(|| SupervisorError::NotFound(id.to_string()))?;
            (entry.name.clone(), entry.spec.clone())
        };

        let spawned = spawn::spawn_child(&spec).map_err(|e| SupervisorError::SpawnFailed {
            name: name.clone(),
            message: e.to_string(),
        })?;
        let pid = spawned.pid;
        let mut child = spawned.child;

        let epoch = {
            let counter = self.epochs.entry(id.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        let now = self.deps.clock.now_ms();

        // Log capture: both pipes feed one writer task that owns the sink,
        // so rotation is never concurrent.
        let (log_tx, log_rx) = mpsc::unbounded_channel::<(LogStream, String)>();
        tokio::spawn(log_writer(
            self.deps.logs_dir.clone(),
            id.clone(),
            name.clone(),
            spec.log_format,
            spec.log_output,
            log_rx,
        ));
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pipe_reader(stdout, LogStream::Stdout, log_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pipe_reader(stderr, LogStream::Stderr, log_tx));
        }

        // Exit waiter owns the child handle.
        let events = self.event_sender();
        let exit_id = id.clone();
        tokio::spawn(async move {
            let (exit_code, signal) = match child.wait().await {
                Ok(status) => (status.code(), status.signal()),
                Err(e) => {
                    warn!(entry = %exit_id, error = %e, "wait on child failed");
                    (None, None)
                }
            };
            events.send(Event::ChildExit {
                id: exit_id,
                epoch,
                exit_code,
                signal,
            });
        });

        let sampler = spec.is_monitored().then(|| {
            spawn_sampler(
                id.clone(),
                epoch,
                pid,
                spec.memory_limit_bytes,
                spec.cpu_limit_percent,
                self.deps.tunables.sample_interval,
                self.event_sender(),
            )
        });

        if let Some(url) = spec.health_check.clone() {
            let probe = self.probe.clone();
            let events = self.event_sender();
            let probe_id = id.clone();
            let budget = self.deps.tunables.ready_timeout;
            tokio::spawn(async move {
                let healthy = probe.wait_ready(&url, budget).await;
                events.send(Event::ProbeResult {
                    id: probe_id,
                    epoch,
                    healthy,
                });
            });
        }

        self.children.insert(
            id.clone(),
            ChildRuntime {
                epoch,
                pid,
                sampler,
            },
        );
        self.books
            .entry(id.clone())
            .or_insert_with(|| RestartPolicy::from_spec(&spec));

        let view = {
            let mut registry = self.registry.lock();
            let entry = registry
                .get_mut(id)
                .ok_or_else(|| SupervisorError::NotFound(id.to_string()))?;
            entry.state = EntryState::Running;
            entry.os_pid = pid;
            entry.start_time = now;
            EntryView::observe(entry, now)
        };
        Ok(view)
    }

    /// Respawn with restart accounting. The entry must have no live child.
    fn respawn_now(
        &mut self,
        id: &EntryId,
        reason: RestartReason,
    ) -> Result<EntryView, SupervisorError> {
        let now = self.deps.clock.now_ms();
        {
            let mut registry = self.registry.lock();
            let entry = registry
                .get_mut(id)
                .ok_or_else(|| SupervisorError::NotFound(id.to_string()))?;
            entry.restart_count += 1;
            entry.last_restart_time = Some(now);
            entry.last_restart_reason = Some(reason);
            entry.state = EntryState::Restarting;
        }
        if reason == RestartReason::Manual {
            if let Some(book) = self.books.get_mut(id) {
                book.reset_attempts();
            }
        }

        let result = self.attach_child(id);
        if result.is_err() {
            self.set_state(id, EntryState::Errored);
        }
        self.snapshotter.mark_dirty();
        result
    }

    /// SIGTERM the live child and arm the kill timer; mark `stopping`.
    fn signal_stop(&mut self, id: &EntryId) {
        let Some(runtime) = self.children.get(id) else {
            return;
        };
        if let Err(e) = spawn::send_signal(runtime.pid, Signal::SIGTERM) {
            // The child may already be gone; its exit event will follow.
            warn!(entry = %id, pid = runtime.pid, error = %e, "SIGTERM failed");
        }
        self.schedule(
            self.deps.tunables.stop_timeout,
            Event::StopTimeout {
                id: id.clone(),
                epoch: runtime.epoch,
            },
        );
        self.set_state(id, EntryState::Stopping);
        self.snapshotter.mark_dirty();
    }

    /// Tear down an entry completely: book, watcher, registry slot, and —
    /// for deletes — the crash journal.
    fn finalize_removal(&mut self, id: &EntryId, delete: bool) -> Option<String> {
        self.books.remove(id);
        self.epochs.remove(id);
        if let Some(watcher) = self.watchers.remove(id) {
            watcher.stop();
        }
        let entry = self.registry.lock().remove(id)?;
        self.abort_pending_respawn(id, &entry.name);
        if delete {
            if let Err(e) = self.journal.remove(id) {
                warn!(entry = %id, error = %e, "failed to remove crash journal");
            }
        }
        self.snapshotter.mark_dirty();
        Some(entry.name)
    }

    /// Resolve every stop/delete group waiting on this entry.
    fn resolve_completions(&mut self, id: &EntryId, name: &str) {
        let mut delete = false;
        let mut involved = false;
        for group in &self.completions {
            if group.waiting.contains(id) {
                involved = true;
                if matches!(group.kind, GroupKind::Delete) {
                    delete = true;
                }
            }
        }
        if !involved {
            return;
        }

        info!(entry = %id, name, "process stopped");
        self.finalize_removal(id, delete);

        let mut finished = Vec::new();
        for (index, group) in self.completions.iter_mut().enumerate() {
            if group.waiting.remove(id) {
                group.done.push(name.to_string());
                if group.waiting.is_empty() {
                    finished.push(index);
                }
            }
        }
        for index in finished.into_iter().rev() {
            let group = self.completions.remove(index);
            let outcome = group_outcome(&group.kind, group.done);
            if let Some(reply) = group.reply {
                let _ = reply.send(Ok(outcome));
            }
        }
    }

    /// A stop raced a pending restart; the stop wins.
    fn abort_pending_respawn(&mut self, id: &EntryId, name: &str) {
        if let Some(pending) = self.pending_respawns.remove(id) {
            for reply in pending.replies {
                let _ = reply.send(Err(SupervisorError::NotFound(name.to_string())));
            }
        }
    }

    fn start_watching(&mut self, id: &EntryId) {
        let spec = match self.registry.lock().get(id) {
            Some(entry) => entry.spec.clone(),
            None => return,
        };
        let dir = watch_dir(&spec);
        let ignores = match IgnoreSet::build(&spec.watch_ignore, &self.deps.data_dir) {
            Ok(set) => set,
            Err(e) => {
                warn!(entry = %id, error = %e, "watch disabled: bad ignore pattern");
                return;
            }
        };
        match spawn_watcher(
            id.clone(),
            dir.clone(),
            ignores,
            self.deps.tunables.watch_debounce,
            self.event_sender(),
        ) {
            Ok(handle) => {
                debug!(entry = %id, dir = %dir.display(), "watching for file changes");
                self.watchers.insert(id.clone(), handle);
            }
            Err(e) => warn!(entry = %id, error = %e, "watch disabled"),
        }
    }

    fn resolve_targets(&self, target: &Target) -> Result<Vec<EntryId>, SupervisorError> {
        let registry = self.registry.lock();
        match target {
            Target::All => Ok(registry.ids()),
            Target::One(t) => registry
                .resolve(t)
                .map(|e| vec![e.id.clone()])
                .ok_or_else(|| SupervisorError::NotFound(t.clone())),
        }
    }

    fn entry_name(&self, id: &EntryId) -> Option<String> {
        self.registry.lock().get(id).map(|e| e.name.clone())
    }

    fn epoch_is_current(&self, id: &EntryId, epoch: u64) -> bool {
        self.epochs.get(id) == Some(&epoch)
    }

    fn set_state(&self, id: &EntryId, state: EntryState) {
        let mut registry = self.registry.lock();
        if let Some(entry) = registry.get_mut(id) {
            entry.state = state;
        }
    }

    fn detach_and_set(&self, id: &EntryId, state: EntryState) {
        let mut registry = self.registry.lock();
        if let Some(entry) = registry.get_mut(id) {
            entry.state = state;
            entry.detach_child();
        }
    }

    fn schedule(&self, delay: Duration, event: Event) {
        let events = self.event_sender();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            events.send(event);
        });
    }
}

fn group_outcome(kind: &GroupKind, names: Vec<String>) -> CommandOutcome {
    match kind {
        GroupKind::Stop => CommandOutcome::Stopped { names },
        GroupKind::Delete => CommandOutcome::Deleted { names },
    }
}

fn default_name(spec: &ProcessSpec) -> String {
    spec.script
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app".to_string())
}

/// Directory watched for an entry: the script's parent, resolved against
/// the working directory.
fn watch_dir(spec: &ProcessSpec) -> PathBuf {
    let script = if spec.script.is_absolute() {
        spec.script.clone()
    } else if let Some(cwd) = &spec.cwd {
        cwd.join(&spec.script)
    } else {
        spec.script.clone()
    };
    script
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

async fn log_writer(
    logs_root: PathBuf,
    id: EntryId,
    name: String,
    format: LogFormat,
    output: LogOutput,
    mut rx: mpsc::UnboundedReceiver<(LogStream, String)>,
) {
    let mut sink = match LogSink::open(&logs_root, &id, &name, format, output) {
        Ok(sink) => sink,
        Err(e) => {
            warn!(entry = %id, error = %e, "log sink unavailable, discarding output");
            while rx.recv().await.is_some() {}
            return;
        }
    };
    while let Some((stream, line)) = rx.recv().await {
        if let Err(e) = sink.write(stream, &line) {
            warn!(entry = %id, error = %e, "log write failed");
        }
    }
}

async fn pipe_reader<R: AsyncRead + Unpin>(
    reader: R,
    stream: LogStream,
    tx: mpsc::UnboundedSender<(LogStream, String)>,
) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send((stream, line)).is_err() {
            return;
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
