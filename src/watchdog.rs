//! Liveness supervisor for the fishing loop
//!
//! The watchdog thread wakes every `check_interval` and compares the loop's heartbeat
//! and state timer against their limits. A stuck loop gets a bounded number of
//! recoveries, each one releasing the button and asking the loop to start over.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::input::Controls;
use crate::utils::bot_state::{now_ms, RunCounters, SharedSignals};
use crate::utils::settings::Settings;
use crate::utils::webhook::Notifier;

const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    pub check_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub max_recoveries: u32,
    /// Minimum spacing between two recoveries
    pub debounce: Duration,
    /// Pause after a recovery before monitoring resumes
    pub settle_delay: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(10),
            heartbeat_timeout: Duration::from_secs(30),
            max_recoveries: 5,
            debounce: Duration::from_secs(5),
            settle_delay: Duration::from_secs(2),
        }
    }
}

/// Result of one liveness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Healthy,
    /// Loop was stuck and recovery number `n` was performed
    Recovered(u32),
    /// Loop was stuck but the last recovery was too recent
    Debounced,
    /// Out of recoveries, the macro was stopped
    Exhausted,
}

pub struct Watchdog {
    config: WatchdogConfig,
    signals: Arc<SharedSignals>,
    controls: Controls,
    settings: Arc<RwLock<Settings>>,
    counters: Arc<RunCounters>,
    notifier: Arc<dyn Notifier>,
    active: AtomicBool,
    /// Bumped on every start so a thread from an earlier start exits
    generation: AtomicU64,
    last_recovery_ms: Mutex<Option<u64>>,
}

impl Watchdog {
    pub fn new(
        config: WatchdogConfig,
        signals: Arc<SharedSignals>,
        controls: Controls,
        settings: Arc<RwLock<Settings>>,
        counters: Arc<RunCounters>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            signals,
            controls,
            settings,
            counters,
            notifier,
            active: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            last_recovery_ms: Mutex::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start monitoring. Does nothing when already active.
    pub fn start(self: &Arc<Self>) {
        if self.active.swap(true, Ordering::SeqCst) {
            return;
        }
        self.signals.touch_heartbeat();
        self.signals.reset_recovery_count();
        *self.last_recovery_ms.lock() = None;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let this = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("watchdog".into())
            .spawn(move || this.monitor(generation));
        match spawned {
            Ok(_) => tracing::info!("[WATCHDOG] Started, monitoring for stuck states"),
            Err(e) => {
                self.active.store(false, Ordering::SeqCst);
                tracing::error!("[WATCHDOG] Failed to spawn monitor thread: {}", e);
            }
        }
    }

    /// Stop monitoring without any recovery. The thread exits within one sleep slice.
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            tracing::info!("[WATCHDOG] Stopped");
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.is_active() && self.generation.load(Ordering::SeqCst) == generation
    }

    fn monitor(&self, generation: u64) {
        while self.is_current(generation) {
            if !self.signals.is_running() {
                tracing::debug!("[WATCHDOG] Macro no longer running");
                break;
            }
            if self.check_once(now_ms()) == Verdict::Exhausted {
                break;
            }

            let deadline = Instant::now() + self.config.check_interval;
            while self.is_current(generation) && Instant::now() < deadline {
                thread::sleep(SLEEP_SLICE.min(deadline.saturating_duration_since(Instant::now())));
            }
        }
        if self.generation.load(Ordering::SeqCst) == generation {
            self.active.store(false, Ordering::SeqCst);
        }
        tracing::info!("[WATCHDOG] Monitor loop ended");
    }

    /// Check liveness at `now_ms` and recover when stuck
    pub fn check_once(&self, now_ms: u64) -> Verdict {
        let heartbeat_age = now_ms.saturating_sub(self.signals.heartbeat_ms());
        let state = self.signals.current_state();
        let state_age = now_ms.saturating_sub(self.signals.state_start_ms());

        if heartbeat_age > self.config.heartbeat_timeout.as_millis() as u64 {
            tracing::warn!(
                "[WATCHDOG] No heartbeat for {}s, loop appears stuck",
                heartbeat_age / 1000
            );
        } else if state_age > state.max_duration().as_millis() as u64 {
            tracing::warn!(
                "[WATCHDOG] State '{}' stuck for {}s (max {}s)",
                state,
                state_age / 1000,
                state.max_duration().as_secs()
            );
        } else {
            return Verdict::Healthy;
        }

        self.recover(now_ms)
    }

    fn recover(&self, now_ms: u64) -> Verdict {
        let max = self.config.max_recoveries;
        if self.signals.recovery_count() >= max {
            tracing::error!(
                "[WATCHDOG] Too many restarts ({} attempts), stopping the macro",
                self.signals.recovery_count()
            );
            self.signals.set_running(false);
            self.controls.release_if_held();
            self.active.store(false, Ordering::SeqCst);
            return Verdict::Exhausted;
        }

        {
            let mut last = self.last_recovery_ms.lock();
            let debounce = self.config.debounce.as_millis() as u64;
            if last.is_some_and(|t| now_ms.saturating_sub(t) < debounce) {
                tracing::warn!("[WATCHDOG] Skipping recovery, too soon after the last one");
                return Verdict::Debounced;
            }
            *last = Some(now_ms);
        }

        let n = self.signals.increment_recovery_count();
        tracing::warn!("[WATCHDOG] Restarting loop #{}/{}", n, max);

        self.controls.release_if_held();
        self.signals.reset_state_timer_at(now_ms);
        self.signals.touch_heartbeat_at(now_ms);
        self.signals.request_restart();

        let (auto_buy, loops) = {
            let s = self.settings.read();
            (s.auto_buy_common_bait, s.loops_per_purchase)
        };
        if auto_buy {
            self.counters.set_bait_loops(loops);
            tracing::info!("[WATCHDOG] Bait purchase will trigger on next loop");
        }

        thread::sleep(self.config.settle_delay);
        self.notifier.notify_recovery(n, self.counters.fish_count());
        tracing::info!("[WATCHDOG] Recovery complete");
        Verdict::Recovered(n)
    }
}
