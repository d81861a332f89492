//! Master timer
//!
//! One dedicated thread ticks at a fixed frequency, advancing every
//! running function against the leased universe buffers and committing
//! the result once per tick. Deadlines are computed relative to the
//! previous deadline, never to "now", so cadence cannot drift over long
//! runs.
//!
//! ## Thread Safety Design
//!
//! The running list is guarded by one mutex, taken for mutation and for
//! the per-index reads during the tick pass — start/stop of other
//! functions proceed while a function's `write` is in flight. The
//! universe lease is claimed once for the whole pass, so per-channel
//! access and blackout toggles can never interleave with function writes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use lux_core::{TickFrequency, Ticks};
use lux_output::OutputMap;

use crate::bus::Bus;
use crate::error::{EngineError, EngineResult};
use crate::function::{FunctionEvent, FunctionId, FunctionRegistry, TickContext};

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Deadline wait strategy
///
/// `Hybrid` sleeps for the bulk of each interval and busy-polls only the
/// final margin — light on CPU, sub-millisecond jitter. `Spin` busy-polls
/// the whole interval — jitter-free at the cost of a pinned core. Pick
/// per target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimingMode {
    Hybrid,
    Spin,
}

/// Scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    pub frequency: TickFrequency,
    pub timing: TimingMode,
    /// Busy-poll margin before each deadline in hybrid mode, microseconds
    pub spin_margin_us: u64,
    /// Poll interval while `stop_all` drains the running list, milliseconds
    pub drain_poll_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            frequency: TickFrequency::default(),
            timing: TimingMode::Hybrid,
            spin_margin_us: 500,
            drain_poll_ms: 10,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATS
// ═══════════════════════════════════════════════════════════════════════════════

/// Tick counters, updated by the scheduler thread
#[derive(Debug, Default)]
struct TimerStats {
    ticks: AtomicU64,
    late_ticks: AtomicU64,
}

/// Point-in-time copy of the tick counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerStatsSnapshot {
    /// Ticks processed since the last `start`
    pub ticks: u64,
    /// Ticks whose deadline had already passed when the wait began
    pub late_ticks: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// MASTER TIMER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
struct RunEntry {
    id: FunctionId,
    elapsed: Ticks,
}

/// State shared between the scheduler thread and caller threads
struct TimerShared {
    /// Tick thread liveness
    running: AtomicBool,
    /// Global stop request observed by the tick pass
    stop_all: AtomicBool,
    /// Running functions in stable insertion order
    list: Mutex<Vec<RunEntry>>,
    stats: TimerStats,
    /// Id of the live scheduler thread, for re-entrancy guards
    scheduler_thread: Mutex<Option<ThreadId>>,
    subscribers: Mutex<Vec<Sender<FunctionEvent>>>,
}

/// Fixed-frequency function scheduler
pub struct MasterTimer {
    config: TimerConfig,
    shared: Arc<TimerShared>,
    registry: Arc<FunctionRegistry>,
    output: Arc<OutputMap>,
    bus: Arc<Bus>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MasterTimer {
    pub fn new(
        config: TimerConfig,
        registry: Arc<FunctionRegistry>,
        output: Arc<OutputMap>,
        bus: Arc<Bus>,
    ) -> Self {
        Self {
            config,
            shared: Arc::new(TimerShared {
                running: AtomicBool::new(false),
                stop_all: AtomicBool::new(false),
                list: Mutex::new(Vec::new()),
                stats: TimerStats::default(),
                scheduler_thread: Mutex::new(None),
                subscribers: Mutex::new(Vec::new()),
            }),
            registry,
            output,
            bus,
            handle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> TimerConfig {
        self.config
    }

    pub fn frequency(&self) -> TickFrequency {
        self.config.frequency
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════

    /// Launch the tick thread; a second call while running is a no-op
    pub fn start(&self) -> EngineResult<()> {
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.shared.stats.ticks.store(0, Ordering::Relaxed);
        self.shared.stats.late_ticks.store(0, Ordering::Relaxed);

        let shared = Arc::clone(&self.shared);
        let registry = Arc::clone(&self.registry);
        let output = Arc::clone(&self.output);
        let bus = Arc::clone(&self.bus);
        let config = self.config;

        let handle = thread::Builder::new()
            .name("lux-master-timer".to_string())
            .spawn(move || {
                *shared.scheduler_thread.lock() = Some(thread::current().id());
                Self::run(&shared, &registry, &output, &bus, config);
                *shared.scheduler_thread.lock() = None;
                shared.running.store(false, Ordering::Release);
            })
            .map_err(|e| {
                self.shared.running.store(false, Ordering::Release);
                EngineError::ThreadSpawn(e.to_string())
            })?;

        *self.handle.lock() = Some(handle);
        log::info!(
            "master timer started: {} Hz, {:?} timing",
            self.config.frequency.as_u32(),
            self.config.timing
        );
        Ok(())
    }

    /// Whether the tick thread is alive
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Stop every running function, then terminate the tick thread
    pub fn stop(&self) {
        self.stop_all();
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
        log::info!("master timer stopped");
    }

    /// Request every running function to stop and block until none remain
    ///
    /// Cooperative: each function finishes its in-flight `write` and is
    /// stopped on its next visit. Must not be called from the scheduler
    /// thread; that would deadlock and is rejected with an error log.
    pub fn stop_all(&self) {
        if let Some(scheduler) = *self.shared.scheduler_thread.lock() {
            if scheduler == thread::current().id() {
                debug_assert!(false, "stop_all on the scheduler thread");
                log::error!("stop_all ignored: called from the scheduler thread");
                return;
            }
        }

        self.shared.stop_all.store(true, Ordering::Release);

        let poll = Duration::from_millis(self.config.drain_poll_ms.max(1));
        loop {
            if self.shared.list.lock().is_empty() {
                break;
            }
            if !self.is_running() {
                // no tick thread to drain the list; do it here
                let drained: Vec<FunctionId> =
                    self.shared.list.lock().drain(..).map(|e| e.id).collect();
                for id in drained {
                    Self::notify(&self.shared, FunctionEvent::Stopped(id));
                }
                break;
            }
            thread::sleep(poll);
        }

        self.shared.stop_all.store(false, Ordering::Release);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // RUNNING SET
    // ═══════════════════════════════════════════════════════════════════════

    /// Start a function: reset its elapsed counter and register it
    ///
    /// Idempotent; a function is in the running set at most once. Unknown
    /// ids are a logged no-op.
    pub fn start_function(&self, id: FunctionId) {
        if !self.registry.contains(id) {
            log::warn!("start ignored: unknown function {id}");
            return;
        }

        {
            let mut list = self.shared.list.lock();
            if list.iter().any(|entry| entry.id == id) {
                return;
            }
            list.push(RunEntry { id, elapsed: 0 });
        }

        log::debug!("function {id} running");
        Self::notify(&self.shared, FunctionEvent::Started(id));
    }

    /// Stop a function and remove it from the running set; idempotent
    pub fn stop_function(&self, id: FunctionId) {
        Self::remove_entry(&self.shared, id);
    }

    /// Whether a function is currently in the running set
    pub fn is_function_running(&self, id: FunctionId) -> bool {
        self.shared.list.lock().iter().any(|entry| entry.id == id)
    }

    /// Ids of running functions in visit order
    pub fn running_functions(&self) -> Vec<FunctionId> {
        self.shared.list.lock().iter().map(|entry| entry.id).collect()
    }

    /// Subscribe to started/stopped notifications
    pub fn subscribe(&self) -> Receiver<FunctionEvent> {
        let (tx, rx) = unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    // ═══════════════════════════════════════════════════════════════════════
    // STATS
    // ═══════════════════════════════════════════════════════════════════════

    /// Ticks processed since the last `start`
    pub fn tick_count(&self) -> u64 {
        self.shared.stats.ticks.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> TimerStatsSnapshot {
        TimerStatsSnapshot {
            ticks: self.shared.stats.ticks.load(Ordering::Relaxed),
            late_ticks: self.shared.stats.late_ticks.load(Ordering::Relaxed),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // TICK THREAD
    // ═══════════════════════════════════════════════════════════════════════

    fn run(
        shared: &Arc<TimerShared>,
        registry: &Arc<FunctionRegistry>,
        output: &Arc<OutputMap>,
        bus: &Arc<Bus>,
        config: TimerConfig,
    ) {
        let interval = config.frequency.interval();
        let spin_margin = Duration::from_micros(config.spin_margin_us);
        let mut deadline = Instant::now() + interval;

        while shared.running.load(Ordering::Acquire) {
            Self::tick(shared, registry, output, bus);
            shared.stats.ticks.fetch_add(1, Ordering::Relaxed);

            if Self::wait_until(deadline, spin_margin, config.timing) {
                shared.stats.late_ticks.fetch_add(1, Ordering::Relaxed);
            }

            // next deadline is relative to this one, never to "now"
            deadline = match deadline.checked_add(interval) {
                Some(next) => next,
                None => {
                    log::error!("monotonic clock arithmetic failed; scheduler stopping");
                    break;
                }
            };
        }
    }

    /// One scheduler cycle: function pass, then commit
    fn tick(
        shared: &Arc<TimerShared>,
        registry: &Arc<FunctionRegistry>,
        output: &Arc<OutputMap>,
        bus: &Arc<Bus>,
    ) {
        let stop_all = shared.stop_all.load(Ordering::Acquire);

        {
            let mut lease = output.claim_universes();
            let mut index = 0;

            loop {
                // hold the list lock only to read the entry; start/stop of
                // other functions proceed while this one writes
                let entry = {
                    let list = shared.list.lock();
                    match list.get(index) {
                        Some(entry) => *entry,
                        None => break,
                    }
                };

                let ctx = TickContext {
                    elapsed: entry.elapsed,
                    bus: bus.as_ref(),
                };
                let keep = match registry.with_function(entry.id, |f| f.write(&mut lease, &ctx))
                {
                    Some(keep) => keep,
                    None => {
                        log::warn!("running function {} missing from registry", entry.id);
                        false
                    }
                };

                // a stop-all request stops the function after its write
                if keep && !stop_all {
                    let mut list = shared.list.lock();
                    if let Some(entry) = list.iter_mut().find(|e| e.id == entry.id) {
                        entry.elapsed += 1;
                    }
                    index += 1;
                } else {
                    // the entry at this index shifts; revisit the same slot
                    Self::remove_entry(shared, entry.id);
                }
            }
        }

        // commit this tick, silent ticks included
        output.dump_universes();
    }

    fn remove_entry(shared: &Arc<TimerShared>, id: FunctionId) {
        let removed = {
            let mut list = shared.list.lock();
            let before = list.len();
            list.retain(|entry| entry.id != id);
            list.len() != before
        };

        if removed {
            log::debug!("function {id} stopped");
            Self::notify(shared, FunctionEvent::Stopped(id));
        }
    }

    fn notify(shared: &Arc<TimerShared>, event: FunctionEvent) {
        shared
            .subscribers
            .lock()
            .retain(|tx| tx.send(event).is_ok());
    }

    /// Wait out the remainder of the tick interval
    ///
    /// Returns true when the deadline had already passed on entry (a late
    /// tick).
    fn wait_until(deadline: Instant, spin_margin: Duration, mode: TimingMode) -> bool {
        let late = Instant::now() >= deadline;

        match mode {
            TimingMode::Hybrid => loop {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                let remaining = deadline - now;
                if remaining > spin_margin {
                    thread::sleep(remaining - spin_margin);
                } else {
                    std::hint::spin_loop();
                }
            },
            TimingMode::Spin => {
                while Instant::now() < deadline {
                    std::hint::spin_loop();
                }
            }
        }

        late
    }
}

impl Drop for MasterTimer {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer() -> MasterTimer {
        MasterTimer::new(
            TimerConfig::default(),
            Arc::new(FunctionRegistry::new()),
            Arc::new(OutputMap::new(1)),
            Arc::new(Bus::new()),
        )
    }

    #[test]
    fn test_wait_until_reaches_deadline() {
        let deadline = Instant::now() + Duration::from_millis(5);
        let late = MasterTimer::wait_until(deadline, Duration::from_micros(500), TimingMode::Hybrid);

        assert!(!late);
        assert!(Instant::now() >= deadline);
    }

    #[test]
    fn test_wait_until_flags_late_entry() {
        let deadline = Instant::now() - Duration::from_millis(1);
        let late = MasterTimer::wait_until(deadline, Duration::from_micros(500), TimingMode::Spin);

        assert!(late);
    }

    #[test]
    fn test_unknown_function_start_is_noop() {
        let timer = timer();
        timer.start_function(42);

        assert!(timer.running_functions().is_empty());
        assert!(!timer.is_function_running(42));
    }

    #[test]
    fn test_stop_all_without_thread_drains_list() {
        let timer = timer();
        struct Forever;
        impl crate::function::Function for Forever {
            fn name(&self) -> &str {
                "forever"
            }
            fn kind(&self) -> crate::function::FunctionKind {
                crate::function::FunctionKind::Scene
            }
            fn write(
                &mut self,
                _universes: &mut lux_output::UniverseLease<'_>,
                _ctx: &TickContext<'_>,
            ) -> bool {
                true
            }
        }

        let id = timer.registry.add(Box::new(Forever));
        timer.start_function(id);
        assert!(timer.is_function_running(id));

        timer.stop_all();
        assert!(!timer.is_function_running(id));
    }
}
