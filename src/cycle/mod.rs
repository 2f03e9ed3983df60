//! The fishing cycle state machine
//!
//! One iteration is `pre_cast -> waiting -> fishing -> post_catch`. Each phase polls
//! [`SharedSignals::should_continue`] at its loop head and after every sleep, so both
//! a stop and a watchdog restart request unwind the iteration promptly.

mod fishing;
mod post_catch;
mod pre_cast;
mod waiting;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::control::{HoldGate, PdController};
use crate::input::Controls;
use crate::screen_reader::fruit_ocr::DropScanner;
use crate::screen_reader::screen_service::FrameSource;
use crate::utils::bot_state::{CycleState, RunCounters, SharedSignals};
use crate::utils::settings::{secs, Point, Settings};
use crate::utils::webhook::{Notifier, NullNotifier};

pub use waiting::WaitOutcome;

/// Granularity of cancellable sleeps
const PAUSE_SLICE: Duration = Duration::from_millis(50);

/// Delay before the next iteration after a transient error
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FishOutcome {
    /// Marker gone for longer than the grace period
    Caught,
    Cancelled,
}

/// How one full iteration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iteration {
    Caught,
    /// Start over at pre_cast
    Retry,
    /// Terminal stop requested by the cycle itself
    Halt,
}

/// Releases the mouse button when the loop unwinds, panics included
struct ReleaseOnDrop(Controls);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.release_if_held();
    }
}

pub struct FishingCycle<S: FrameSource> {
    sampler: S,
    controls: Controls,
    signals: Arc<SharedSignals>,
    settings: Arc<RwLock<Settings>>,
    counters: Arc<RunCounters>,
    notifier: Arc<dyn Notifier>,
    scanner: Option<Box<dyn DropScanner>>,
    pd: PdController,
    hold: HoldGate,
}

impl<S: FrameSource> FishingCycle<S> {
    pub fn new(
        sampler: S,
        controls: Controls,
        signals: Arc<SharedSignals>,
        settings: Arc<RwLock<Settings>>,
        counters: Arc<RunCounters>,
    ) -> Self {
        let gains = settings.read().pd_gains();
        Self {
            sampler,
            controls,
            signals,
            settings,
            counters,
            notifier: Arc::new(NullNotifier),
            scanner: None,
            pd: PdController::new(gains),
            hold: HoldGate::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_scanner(mut self, scanner: Box<dyn DropScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Run iterations until the macro stops. A pending restart request is consumed at
    /// the top of each iteration.
    pub fn run(&mut self) {
        let _release = ReleaseOnDrop(self.controls.clone());
        tracing::info!("[CYCLE] Fishing loop started");

        while self.signals.is_running() {
            if self.signals.take_restart() {
                tracing::info!("[CYCLE] Restart requested, starting over at pre_cast");
            }

            let settings = self.settings.read().clone();
            match self.run_once(&settings) {
                Ok(Iteration::Halt) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("[CYCLE] Error in fishing loop: {:#}", e);
                    self.controls.release_if_held();
                    self.pause(ERROR_BACKOFF);
                }
            }
        }

        self.signals.enter_state(CycleState::Idle);
        tracing::info!("[CYCLE] Fishing loop stopped");
    }

    /// One pass through all four phases
    pub fn run_once(&mut self, settings: &Settings) -> anyhow::Result<Iteration> {
        self.signals.touch_heartbeat();

        self.signals.enter_state(CycleState::PreCast);
        if !self.pre_cast(settings)? {
            return Ok(Iteration::Retry);
        }

        self.signals.enter_state(CycleState::Waiting);
        match self.waiting(settings)? {
            WaitOutcome::Bite => {}
            WaitOutcome::Halt => return Ok(Iteration::Halt),
            WaitOutcome::Recast | WaitOutcome::Cancelled => return Ok(Iteration::Retry),
        }

        self.signals.enter_state(CycleState::Fishing);
        if self.fishing(settings)? == FishOutcome::Cancelled {
            return Ok(Iteration::Retry);
        }

        self.post_catch(settings)?;
        Ok(Iteration::Caught)
    }

    /// Sleep for `duration` in slices. Returns false as soon as the loop should stop.
    fn pause(&self, duration: Duration) -> bool {
        // No deadline means the delay outlasts the clock, only a stop ends it
        let deadline = Instant::now().checked_add(duration);
        loop {
            if !self.signals.should_continue() {
                return false;
            }
            let now = Instant::now();
            let slice = match deadline {
                Some(deadline) if now >= deadline => return true,
                Some(deadline) => deadline.saturating_duration_since(now).min(PAUSE_SLICE),
                None => PAUSE_SLICE,
            };
            thread::sleep(slice);
        }
    }

    /// Reliable click at `point`, then wait `after` seconds
    fn click_then_wait(&self, point: Point, settle: f64, after: f64) -> anyhow::Result<bool> {
        self.controls.reliable_click(point, secs(settle))?;
        Ok(self.pause(secs(after)))
    }
}
