// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic CPU/RSS sampling with threshold hysteresis.
//!
//! The hysteresis math lives in [`MonitorState`], which is pure and tested
//! without an OS; the task around it owns a `sysinfo` handle and feeds
//! samples in on a fixed tick. When the pid disappears the task ends
//! silently — the exit path is reported by the exit waiter, not by us.

use crate::supervisor::EventSender;
use std::collections::VecDeque;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use warden_core::{EntryId, Event, LimitKind};

/// Consecutive over-limit samples before a memory threshold fires.
pub const MEM_TRIP_SAMPLES: u32 = 3;

/// Consecutive over-limit samples before a CPU threshold fires.
pub const CPU_TRIP_SAMPLES: u32 = 5;

/// Samples retained in the ring buffer.
pub const SAMPLE_RING: usize = 60;

/// Rolling-mean window for CPU.
const CPU_MEAN_WINDOW: usize = 3;

/// Fraction of the memory limit that triggers an advisory warning.
const MEM_WARN_RATIO: f64 = 0.8;

/// What one observed sample produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    Metrics { cpu_avg: f32, rss_bytes: u64 },
    Threshold { kind: LimitKind, current: f64, limit: f64 },
    MemoryWarning { rss_bytes: u64, limit_bytes: u64 },
}

/// Hysteresis and rolling-window state for one monitored entry.
#[derive(Debug)]
pub struct MonitorState {
    mem_limit_bytes: Option<u64>,
    cpu_limit_percent: Option<f32>,
    ring: VecDeque<(f32, u64)>,
    cpu_window: VecDeque<f32>,
    mem_hits: u32,
    cpu_hits: u32,
}

impl MonitorState {
    pub fn new(mem_limit_bytes: Option<u64>, cpu_limit_percent: Option<f32>) -> Self {
        Self {
            mem_limit_bytes,
            cpu_limit_percent,
            ring: VecDeque::with_capacity(SAMPLE_RING),
            cpu_window: VecDeque::with_capacity(CPU_MEAN_WINDOW),
            mem_hits: 0,
            cpu_hits: 0,
        }
    }

    /// Fold in one sample and report what it produced.
    ///
    /// A counter increments on every sample that exceeds its limit, resets
    /// on any sample at or below it, and resets again after firing — so a
    /// threshold event always represents a fresh run of consecutive
    /// over-limit samples.
    pub fn observe(&mut self, cpu_percent: f32, rss_bytes: u64) -> Vec<SampleOutcome> {
        if self.ring.len() == SAMPLE_RING {
            self.ring.pop_front();
        }
        self.ring.push_back((cpu_percent, rss_bytes));

        if self.cpu_window.len() == CPU_MEAN_WINDOW {
            self.cpu_window.pop_front();
        }
        self.cpu_window.push_back(cpu_percent);
        let cpu_avg = self.cpu_window.iter().sum::<f32>() / self.cpu_window.len() as f32;

        let mut outcomes = vec![SampleOutcome::Metrics { cpu_avg, rss_bytes }];

        if let Some(limit) = self.mem_limit_bytes {
            if (rss_bytes as f64) > (limit as f64) * MEM_WARN_RATIO {
                outcomes.push(SampleOutcome::MemoryWarning {
                    rss_bytes,
                    limit_bytes: limit,
                });
            }

            if rss_bytes > limit {
                self.mem_hits += 1;
                if self.mem_hits >= MEM_TRIP_SAMPLES {
                    outcomes.push(SampleOutcome::Threshold {
                        kind: LimitKind::Memory,
                        current: rss_bytes as f64,
                        limit: limit as f64,
                    });
                    self.mem_hits = 0;
                }
            } else {
                self.mem_hits = 0;
            }
        }

        if let Some(limit) = self.cpu_limit_percent {
            if cpu_avg > limit {
                self.cpu_hits += 1;
                if self.cpu_hits >= CPU_TRIP_SAMPLES {
                    outcomes.push(SampleOutcome::Threshold {
                        kind: LimitKind::Cpu,
                        current: cpu_avg as f64,
                        limit: limit as f64,
                    });
                    self.cpu_hits = 0;
                }
            } else {
                self.cpu_hits = 0;
            }
        }

        outcomes
    }

    pub fn samples(&self) -> usize {
        self.ring.len()
    }
}

/// Handle to a running sampler task.
pub(crate) struct SamplerHandle {
    task: JoinHandle<()>,
}

impl SamplerHandle {
    pub fn stop(&self) {
        self.task.abort();
    }
}

/// Start sampling `pid` every `interval`.
pub(crate) fn spawn_sampler(
    id: EntryId,
    epoch: u64,
    pid: u32,
    mem_limit_bytes: Option<u64>,
    cpu_limit_percent: Option<f32>,
    interval: Duration,
    events: EventSender,
) -> SamplerHandle {
    let task = tokio::spawn(async move {
        let mut state = MonitorState::new(mem_limit_bytes, cpu_limit_percent);
        let mut sys = System::new();
        let target = Pid::from_u32(pid);
        let refresh = ProcessRefreshKind::nothing().with_cpu().with_memory();

        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Prime CPU accounting: the first refresh establishes the baseline
        // that the next one diffs against.
        tick.tick().await;
        sys.refresh_processes_specifics(ProcessesToUpdate::Some(&[target]), true, refresh);

        loop {
            tick.tick().await;
            sys.refresh_processes_specifics(ProcessesToUpdate::Some(&[target]), true, refresh);
            let Some(process) = sys.process(target) else {
                // Pid gone; the exit waiter owns that story.
                return;
            };

            let cpu = process.cpu_usage();
            let rss = process.memory();
            for outcome in state.observe(cpu, rss) {
                let event = match outcome {
                    SampleOutcome::Metrics { cpu_avg, rss_bytes } => Event::Metrics {
                        id: id.clone(),
                        epoch,
                        cpu_avg,
                        rss_bytes,
                    },
                    SampleOutcome::Threshold {
                        kind,
                        current,
                        limit,
                    } => Event::ThresholdExceeded {
                        id: id.clone(),
                        epoch,
                        kind,
                        current,
                        limit,
                    },
                    SampleOutcome::MemoryWarning {
                        rss_bytes,
                        limit_bytes,
                    } => Event::MemoryWarning {
                        id: id.clone(),
                        epoch,
                        rss_bytes,
                        limit_bytes,
                    },
                };
                events.send(event);
            }
        }
    });

    SamplerHandle { task }
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
