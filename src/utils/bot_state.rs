//! Shared state between the fishing loop, the watchdog and the controller
//!
//! Everything here is a plain atomic scalar. The loop writes the heartbeat and the
//! current state, the watchdog only reads them; the watchdog owns the recovery count
//! and the loop only ever resets it after a catch.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use serde::Serialize;

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Milliseconds on the process monotonic clock
pub fn now_ms() -> u64 {
    EPOCH.elapsed().as_millis() as u64
}

/// Phase the fishing loop is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    PreCast,
    Waiting,
    Fishing,
    Crafting,
}

impl CycleState {
    /// Longest time the loop may stay in this state before the watchdog steps in
    pub fn max_duration(&self) -> Duration {
        match self {
            CycleState::Idle => Duration::from_secs(45),
            CycleState::PreCast => Duration::from_secs(120),
            CycleState::Waiting => Duration::from_secs(35),
            CycleState::Fishing => Duration::from_secs(90),
            CycleState::Crafting => Duration::from_secs(300),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CycleState::Idle => "idle",
            CycleState::PreCast => "pre_cast",
            CycleState::Waiting => "waiting",
            CycleState::Fishing => "fishing",
            CycleState::Crafting => "crafting",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            CycleState::Idle => 0,
            CycleState::PreCast => 1,
            CycleState::Waiting => 2,
            CycleState::Fishing => 3,
            CycleState::Crafting => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => CycleState::PreCast,
            2 => CycleState::Waiting,
            3 => CycleState::Fishing,
            4 => CycleState::Crafting,
            _ => CycleState::Idle,
        }
    }
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Liveness and control flags shared across threads
pub struct SharedSignals {
    running: AtomicBool,
    restart_requested: AtomicBool,
    holding_button: AtomicBool,
    state: AtomicU8,
    state_start_ms: AtomicU64,
    heartbeat_ms: AtomicU64,
    recovery_count: AtomicU32,
}

impl SharedSignals {
    pub fn new() -> Self {
        let now = now_ms();
        Self {
            running: AtomicBool::new(false),
            restart_requested: AtomicBool::new(false),
            holding_button: AtomicBool::new(false),
            state: AtomicU8::new(CycleState::Idle.to_u8()),
            state_start_ms: AtomicU64::new(now),
            heartbeat_ms: AtomicU64::new(now),
            recovery_count: AtomicU32::new(0),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// True while the loop should keep going: running and no restart pending
    pub fn should_continue(&self) -> bool {
        self.is_running() && !self.restart_requested()
    }

    pub fn request_restart(&self) {
        self.restart_requested.store(true, Ordering::SeqCst);
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested.load(Ordering::SeqCst)
    }

    /// Clear a pending restart, returning whether one was pending
    pub fn take_restart(&self) -> bool {
        self.restart_requested.swap(false, Ordering::SeqCst)
    }

    pub fn is_holding(&self) -> bool {
        self.holding_button.load(Ordering::SeqCst)
    }

    pub fn set_holding(&self, holding: bool) {
        self.holding_button.store(holding, Ordering::SeqCst);
    }

    pub fn current_state(&self) -> CycleState {
        CycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Enter `state` now
    pub fn enter_state(&self, state: CycleState) {
        self.enter_state_at(state, now_ms());
    }

    pub fn enter_state_at(&self, state: CycleState, at_ms: u64) {
        self.state.store(state.to_u8(), Ordering::SeqCst);
        self.state_start_ms.store(at_ms, Ordering::SeqCst);
    }

    pub fn state_start_ms(&self) -> u64 {
        self.state_start_ms.load(Ordering::SeqCst)
    }

    pub fn reset_state_timer_at(&self, at_ms: u64) {
        self.state_start_ms.store(at_ms, Ordering::SeqCst);
    }

    pub fn touch_heartbeat(&self) {
        self.touch_heartbeat_at(now_ms());
    }

    pub fn touch_heartbeat_at(&self, at_ms: u64) {
        self.heartbeat_ms.store(at_ms, Ordering::Relaxed);
    }

    pub fn heartbeat_ms(&self) -> u64 {
        self.heartbeat_ms.load(Ordering::Relaxed)
    }

    pub fn recovery_count(&self) -> u32 {
        self.recovery_count.load(Ordering::SeqCst)
    }

    pub fn increment_recovery_count(&self) -> u32 {
        self.recovery_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn reset_recovery_count(&self) {
        self.recovery_count.store(0, Ordering::SeqCst);
    }
}

impl Default for SharedSignals {
    fn default() -> Self {
        Self::new()
    }
}

/// Catch statistics for a run
#[derive(Debug, Default)]
pub struct RunCounters {
    fish_count: AtomicU32,
    fruit_count: AtomicU32,
    consecutive_recast_failures: AtomicU32,
    bait_purchase_loop_counter: AtomicU32,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fish_count(&self) -> u32 {
        self.fish_count.load(Ordering::SeqCst)
    }

    pub fn record_fish(&self) -> u32 {
        self.bait_purchase_loop_counter.fetch_add(1, Ordering::SeqCst);
        self.fish_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn fruit_count(&self) -> u32 {
        self.fruit_count.load(Ordering::SeqCst)
    }

    pub fn record_fruit(&self) -> u32 {
        self.fruit_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn recast_failures(&self) -> u32 {
        self.consecutive_recast_failures.load(Ordering::SeqCst)
    }

    pub fn record_recast_failure(&self) -> u32 {
        self.consecutive_recast_failures.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn reset_recast_failures(&self) {
        self.consecutive_recast_failures.store(0, Ordering::SeqCst);
    }

    pub fn bait_loops(&self) -> u32 {
        self.bait_purchase_loop_counter.load(Ordering::SeqCst)
    }

    pub fn set_bait_loops(&self, loops: u32) {
        self.bait_purchase_loop_counter.store(loops, Ordering::SeqCst);
    }
}
