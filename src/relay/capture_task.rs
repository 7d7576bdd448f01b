use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use thread_priority::{set_current_thread_priority, ThreadPriority};
use tracing::{error, info, warn};

use super::tick::TickScheduler;
use crate::audio::AudioCapturePipeline;
use crate::transport::PeerConnection;

/// Dedicated stack for the capture thread: one Opus encode cycle plus margin
pub const DEFAULT_CAPTURE_STACK_BYTES: usize = 256 * 1024;

const CAPTURE_THREAD_NAME: &str = "audio_publisher";

#[derive(Debug, Clone)]
pub struct CaptureTaskConfig {
    /// Capture tick length
    pub tick: Duration,
    /// Stack size of the capture thread in bytes
    pub stack_size: usize,
    /// Run the capture thread at the highest priority the OS grants
    pub elevate_priority: bool,
}

impl Default for CaptureTaskConfig {
    fn default() -> Self {
        Self {
            tick: super::tick::DEFAULT_TICK,
            stack_size: DEFAULT_CAPTURE_STACK_BYTES,
            elevate_priority: true,
        }
    }
}

/// Best effort: an unprivileged process keeps capturing at normal priority.
fn raise_priority() {
    match set_current_thread_priority(ThreadPriority::Max) {
        Ok(()) => info!("Capture thread running at elevated priority"),
        Err(e) => warn!("Could not raise capture thread priority: {:?}", e),
    }
}

struct RunningTask {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Box<AudioCapturePipeline>>,
}

enum Slot {
    /// Pipeline parked, ready to be lent to a new task
    Idle(Box<AudioCapturePipeline>),
    Running(RunningTask),
    /// Pipeline lost to a panicked or failed-to-spawn thread
    Lost,
}

/// Owns the capture pipeline and at most one thread running it.
///
/// The pipeline is moved into the thread on `spawn` and handed back by the
/// join in `stop`, so buffers, encoder and input device are allocated once
/// and a second task can never run while the first is alive.
pub struct CaptureSupervisor {
    slot: Mutex<Slot>,
    config: CaptureTaskConfig,
    spawned: AtomicU64,
}

impl CaptureSupervisor {
    pub fn new(pipeline: AudioCapturePipeline, config: CaptureTaskConfig) -> Self {
        Self {
            slot: Mutex::new(Slot::Idle(Box::new(pipeline))),
            config,
            spawned: AtomicU64::new(0),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Start capturing into `transport`.
    ///
    /// Returns `Ok(false)` without spawning if a task is already running.
    pub fn spawn(&self, transport: Arc<dyn PeerConnection>) -> Result<bool> {
        let mut slot = self.slot();

        let mut pipeline = match std::mem::replace(&mut *slot, Slot::Lost) {
            Slot::Idle(pipeline) => pipeline,
            running @ Slot::Running(_) => {
                *slot = running;
                warn!("Capture task already running, not spawning another");
                return Ok(false);
            }
            Slot::Lost => bail!("Capture pipeline is unavailable"),
        };

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let tick = self.config.tick;
        let elevate = self.config.elevate_priority;

        let handle = thread::Builder::new()
            .name(CAPTURE_THREAD_NAME.to_string())
            .stack_size(self.config.stack_size)
            .spawn(move || {
                if elevate {
                    raise_priority();
                }
                info!("Capture task started ({:?} tick)", tick);
                let mut scheduler = TickScheduler::new(tick);

                while !stop_flag.load(Ordering::Acquire) {
                    let started = Instant::now();
                    pipeline.tick(transport.as_ref());
                    scheduler.finish_tick(started);
                }

                info!(
                    "Capture task stopped ({} frames sent, {} dropped, {} late ticks)",
                    pipeline.frames_sent(),
                    pipeline.frames_dropped(),
                    scheduler.overruns()
                );
                pipeline
            })
            .context("Failed to spawn capture thread")?;

        *slot = Slot::Running(RunningTask { stop, handle });
        self.spawned.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    /// Stop the running task and wait for its thread (and stack) to be released.
    ///
    /// Returns true if a task was running.
    pub fn stop(&self) -> bool {
        let mut slot = self.slot();

        match std::mem::replace(&mut *slot, Slot::Lost) {
            Slot::Running(task) => {
                task.stop.store(true, Ordering::Release);
                match task.handle.join() {
                    Ok(pipeline) => *slot = Slot::Idle(pipeline),
                    Err(_) => error!("Capture thread panicked, capture disabled"),
                }
                true
            }
            other => {
                *slot = other;
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.slot(), Slot::Running(_))
    }

    /// Tasks spawned over the process lifetime
    pub fn spawn_count(&self) -> u64 {
        self.spawned.load(Ordering::SeqCst)
    }
}

impl Drop for CaptureSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}
